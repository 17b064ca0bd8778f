use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::AppError;

/// Prefix that marks a raw account id instead of a player name, e.g. `#52441321`.
pub const BY_ID_PREFIX: char = '#';

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercased player name with every whitespace character removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StandardName(String);

impl StandardName {
    /// # Errors
    ///
    /// Will return `Err` if nothing is left after stripping whitespace
    pub fn new(raw: &str) -> Result<Self, AppError> {
        let name: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        if name.is_empty() {
            return Err(AppError::InvalidInput("invalid summoner name".to_string()));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StandardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller asked for: a name to resolve, or an id that skips resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerQuery {
    Name(StandardName),
    ById(AccountId),
}

impl PlayerQuery {
    /// # Errors
    ///
    /// Will return `Err` if the input is missing, blank, or a malformed by-id escape
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let raw = raw.ok_or_else(|| AppError::InvalidInput("invalid summoner name".to_string()))?;
        let trimmed = raw.trim();

        if trimmed.starts_with(BY_ID_PREFIX) {
            static BY_ID: OnceLock<Option<Regex>> = OnceLock::new();
            let id = BY_ID
                .get_or_init(|| Regex::new(r"^#\s*([0-9]{1,19})$").ok())
                .as_ref()
                .and_then(|re| re.captures(trimmed))
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .ok_or_else(|| AppError::InvalidInput("invalid account id".to_string()))?;
            return Ok(Self::ById(AccountId(id)));
        }

        Ok(Self::Name(StandardName::new(trimmed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_case_and_whitespace() {
        let name = StandardName::new("  Hide On\tBush ").unwrap();
        assert_eq!(name.as_str(), "hideonbush");
    }

    #[test]
    fn blank_name_rejected() {
        assert!(StandardName::new(" \t ").is_err());
        assert!(PlayerQuery::parse(None).is_err());
        assert!(PlayerQuery::parse(Some("")).is_err());
    }

    #[test]
    fn by_id_escape_skips_name() {
        assert_eq!(
            PlayerQuery::parse(Some("#52441321")).unwrap(),
            PlayerQuery::ById(AccountId(52_441_321))
        );
        assert_eq!(
            PlayerQuery::parse(Some(" # 7 ")).unwrap(),
            PlayerQuery::ById(AccountId(7))
        );
    }

    #[test]
    fn malformed_by_id_is_invalid() {
        let err = PlayerQuery::parse(Some("#abc")).unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(PlayerQuery::parse(Some("#")).is_err());
    }
}
