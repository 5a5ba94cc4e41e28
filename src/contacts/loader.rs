use crate::contacts::{Contact, ContactError, ContactResult, NameFallback};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Header cells that mark the first row as column titles rather than data
const HEADER_TOKENS: [&str; 2] = ["name", "email"];

/// Load `name,email` rows from a contact list on disk
pub fn load_contacts(path: &Path, fallback: NameFallback) -> ContactResult<Vec<Contact>> {
    if !path.exists() {
        return Err(ContactError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let contacts = parse_contacts(file, fallback)?;

    tracing::debug!("Loaded {} contacts from {}", contacts.len(), path.display());
    Ok(contacts)
}

/// Parse `name,email` rows from any reader.
///
/// The first row is dropped when one of its cells reads `name` or `email`.
/// Rows with fewer than two cells or a blank email are skipped, and a blank
/// name is derived from the email with `fallback`.
pub fn parse_contacts<R: Read>(reader: R, fallback: NameFallback) -> ContactResult<Vec<Contact>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let skip = usize::from(is_header(first));

    let mut contacts = Vec::with_capacity(rows.len() - skip);
    for row in rows.iter().skip(skip) {
        if row.len() < 2 {
            continue;
        }

        let name = row[0].trim();
        let email = row[1].trim();
        if email.is_empty() {
            continue;
        }

        let display_name = if name.is_empty() {
            fallback.derive(email)
        } else {
            name.to_string()
        };

        contacts.push(Contact::new(display_name, email));
    }

    Ok(contacts)
}

fn is_header(row: &csv::StringRecord) -> bool {
    row.iter()
        .map(|cell| cell.trim().to_lowercase())
        .any(|cell| HEADER_TOKENS.contains(&cell.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(input: &str) -> Vec<Contact> {
        parse_contacts(input.as_bytes(), NameFallback::TitleCase).unwrap()
    }

    #[test]
    fn test_header_row_is_dropped() {
        let contacts = parse("Name,Email\nAlice,alice@example.com\nBob,bob@example.com\n");

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0], Contact::new("Alice", "alice@example.com"));
        assert_eq!(contacts[1], Contact::new("Bob", "bob@example.com"));
    }

    #[test]
    fn test_header_detected_in_any_cell() {
        let contacts = parse("recruiter, EMAIL \nAlice,alice@example.com\n");
        assert_eq!(contacts, vec![Contact::new("Alice", "alice@example.com")]);
    }

    #[test]
    fn test_headerless_file_keeps_first_row() {
        let contacts = parse("Alice,alice@example.com\nBob,bob@example.com\n");
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].display_name, "Alice");
    }

    #[test]
    fn test_short_rows_and_blank_emails_are_skipped() {
        let contacts = parse("Alice,alice@example.com\nlonely\nCarol,  \nDave,dave@example.com,extra\n");

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].email_address, "alice@example.com");
        assert_eq!(contacts[1].email_address, "dave@example.com");
    }

    #[test]
    fn test_cells_are_trimmed() {
        let contacts = parse("  Alice  ,  alice@example.com  \n");
        assert_eq!(contacts, vec![Contact::new("Alice", "alice@example.com")]);
    }

    #[test]
    fn test_blank_name_falls_back_to_email() {
        let contacts = parse(",jane.doe@x.com\n");
        assert_eq!(contacts[0].display_name, "Jane Doe");

        let contacts = parse_contacts(",jane.doe@x.com\n".as_bytes(), NameFallback::FirstToken).unwrap();
        assert_eq!(contacts[0].display_name, "Jane");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = load_contacts(Path::new("/nonexistent/recruiters.csv"), NameFallback::TitleCase);
        assert!(matches!(result, Err(ContactError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,email").unwrap();
        writeln!(file, "Alice,alice@example.com").unwrap();
        writeln!(file, ",bob_jones@example.com").unwrap();

        let contacts = load_contacts(file.path(), NameFallback::TitleCase).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[1].display_name, "Bob Jones");
    }
}
