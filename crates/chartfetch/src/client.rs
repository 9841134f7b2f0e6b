use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::PortalError;

/// A client's "First Last" identity, as tracked in the roster files.
///
/// This is the unique key for dedup and outcome tracking, so parsing is
/// strict: exactly two space-separated tokens. Entries with extra internal
/// spacing or a single word are rejected rather than guessed at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientName {
    first: String,
    last: String,
}

impl ClientName {
    pub fn parse(raw: &str) -> Result<Self, PortalError> {
        let parts: Vec<&str> = raw.split(' ').collect();
        match parts.as_slice() {
            [first, last] if !first.is_empty() && !last.is_empty() => Ok(Self {
                first: (*first).to_string(),
                last: (*last).to_string(),
            }),
            _ => Err(PortalError::MalformedName(raw.to_string())),
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn last(&self) -> &str {
        &self.last
    }

    /// The "First Last" form written to the roster files.
    pub fn full(&self) -> String {
        format!("{} {}", self.first, self.last)
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first, self.last)
    }
}

/// Data scraped from a client's profile page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub first_name: String,
    pub last_name: String,
    pub account_number: String,
    pub birthdate: NaiveDate,
    pub gender: String,
}

impl ClientProfile {
    /// Age in whole years as of `today`.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        let mut age = today.year() - self.birthdate.year();
        if (today.month(), today.day()) < (self.birthdate.month(), self.birthdate.day()) {
            age -= 1;
        }
        age
    }
}

/// The two consent documents exported for every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDoc {
    Receiving,
    Sending,
}

impl ConsentDoc {
    pub const ALL: [ConsentDoc; 2] = [ConsentDoc::Receiving, ConsentDoc::Sending];

    pub fn tag(&self) -> &'static str {
        match self {
            ConsentDoc::Receiving => "Receiving",
            ConsentDoc::Sending => "Sending",
        }
    }

    /// Link text of the document inside the portal's "Docs & Forms" tab.
    pub fn link_text(&self) -> String {
        format!("{} Consent to Release of Information", self.tag())
    }

    /// Output file name: sanitized name, birthdate digits, document tag.
    pub fn file_name(&self, profile: &ClientProfile) -> String {
        format!(
            "{} {} {} {}.pdf",
            sanitize(&profile.first_name),
            sanitize(&profile.last_name),
            profile.birthdate.format("%m%d%Y"),
            self.tag()
        )
    }
}

/// Strip characters that would break a file path.
fn sanitize(part: &str) -> String {
    part.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':') && !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ClientProfile {
        ClientProfile {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            account_number: "10234".to_string(),
            birthdate: NaiveDate::from_ymd_opt(2014, 3, 7).unwrap(),
            gender: "Female".to_string(),
        }
    }

    #[test]
    fn parses_two_token_names() {
        let name = ClientName::parse("Jane Doe").unwrap();
        assert_eq!(name.first(), "Jane");
        assert_eq!(name.last(), "Doe");
        assert_eq!(name.full(), "Jane Doe");
    }

    #[test]
    fn rejects_single_token() {
        assert!(matches!(
            ClientName::parse("Al"),
            Err(PortalError::MalformedName(_))
        ));
    }

    #[test]
    fn rejects_three_tokens() {
        assert!(matches!(
            ClientName::parse("Jane van Doe"),
            Err(PortalError::MalformedName(_))
        ));
    }

    #[test]
    fn rejects_extra_internal_spacing() {
        assert!(ClientName::parse("Jane  Doe").is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(ClientName::parse("").is_err());
        assert!(ClientName::parse(" ").is_err());
    }

    #[test]
    fn consent_doc_file_names() {
        let profile = profile();
        assert_eq!(
            ConsentDoc::Receiving.file_name(&profile),
            "Jane Doe 03072014 Receiving.pdf"
        );
        assert_eq!(
            ConsentDoc::Sending.file_name(&profile),
            "Jane Doe 03072014 Sending.pdf"
        );
    }

    #[test]
    fn file_names_are_sanitized() {
        let mut profile = profile();
        profile.last_name = "O/Doe\\:".to_string();
        assert_eq!(
            ConsentDoc::Receiving.file_name(&profile),
            "Jane ODoe 03072014 Receiving.pdf"
        );
    }

    #[test]
    fn age_counts_whole_years() {
        let profile = profile();
        let before_birthday = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let on_birthday = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(profile.age_on(before_birthday), 9);
        assert_eq!(profile.age_on(on_birthday), 10);
    }
}
