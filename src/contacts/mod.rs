pub mod dedup;
pub mod loader;

pub use dedup::{dedup_contacts, DedupReport};
pub use loader::{load_contacts, parse_contacts};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Contact list errors
#[derive(Error, Debug)]
pub enum ContactError {
    #[error("Contact list not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read contact list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed contact list: {0}")]
    Parse(#[from] csv::Error),
}

pub type ContactResult<T> = Result<T, ContactError>;

/// A single recipient loaded from the contact list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub display_name: String,
    pub email_address: String,
}

impl Contact {
    pub fn new(display_name: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email_address: email_address.into(),
        }
    }

    /// Lower-cased address used for duplicate detection
    pub fn normalized_email(&self) -> String {
        self.email_address.to_lowercase()
    }
}

/// How a display name is derived when the contact list leaves it blank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameFallback {
    /// `jane.doe_smith@x.com` becomes `Jane Doe Smith`
    #[default]
    TitleCase,
    /// `jane.doe@x.com` becomes `Jane`
    FirstToken,
}

impl NameFallback {
    /// Derive a display name from the local part of an email address
    pub fn derive(&self, email: &str) -> String {
        let local = email.split('@').next().unwrap_or_default();

        match self {
            NameFallback::TitleCase => title_case(&local.replace(['.', '_'], " ")),
            NameFallback::FirstToken => {
                capitalize(local.split('.').next().unwrap_or_default())
            }
        }
    }
}

impl std::str::FromStr for NameFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title-case" | "title" => Ok(NameFallback::TitleCase),
            "first-token" | "first" => Ok(NameFallback::FirstToken),
            other => Err(format!("unknown name fallback: {}", other)),
        }
    }
}

/// Upper-case every letter that follows a non-letter and lower-case the rest,
/// so `mary-jane o'neil` becomes `Mary-Jane O'Neil`
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_letter = false;

    for c in text.chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }

    out
}

/// Upper-case the first character and lower-case the rest
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
