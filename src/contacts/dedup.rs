use crate::contacts::Contact;
use std::collections::HashSet;

/// Result of removing repeated contacts
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    /// Contacts kept, in first-seen order
    pub contacts: Vec<Contact>,
    /// Later entries whose email had already been seen
    pub duplicates: Vec<Contact>,
}

impl DedupReport {
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

/// Keep the first contact for each case-insensitive email address
pub fn dedup_contacts(contacts: Vec<Contact>) -> DedupReport {
    let mut seen = HashSet::with_capacity(contacts.len());
    let mut report = DedupReport::default();

    for contact in contacts {
        if seen.insert(contact.normalized_email()) {
            report.contacts.push(contact);
        } else {
            tracing::warn!("Skipping duplicate email: {}", contact.email_address);
            report.duplicates.push(contact);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_duplicates_removed() {
        let report = dedup_contacts(vec![
            Contact::new("A", "x@y.com"),
            Contact::new("B", "X@Y.com"),
            Contact::new("C", "z@y.com"),
        ]);

        assert_eq!(
            report.contacts,
            vec![Contact::new("A", "x@y.com"), Contact::new("C", "z@y.com")]
        );
        assert_eq!(report.duplicate_count(), 1);
        assert_eq!(report.duplicates[0].display_name, "B");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let first = dedup_contacts(vec![
            Contact::new("A", "a@y.com"),
            Contact::new("B", "b@y.com"),
            Contact::new("A again", "A@y.com"),
        ]);
        let second = dedup_contacts(first.contacts.clone());

        assert_eq!(second.contacts, first.contacts);
        assert_eq!(second.duplicate_count(), 0);
    }

    #[test]
    fn test_empty_input() {
        let report = dedup_contacts(Vec::new());
        assert!(report.contacts.is_empty());
        assert_eq!(report.duplicate_count(), 0);
    }
}
