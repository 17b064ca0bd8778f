use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Upstream shard a player account lives on.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Na,
    Br,
    Eune,
    Euw,
    Kr,
    Lan,
    Las,
    Oce,
    Ru,
    Tr,
}

impl Region {
    /// Display order used by the landing page.
    pub const ALL: [Region; 10] = [
        Region::Na,
        Region::Br,
        Region::Eune,
        Region::Euw,
        Region::Kr,
        Region::Lan,
        Region::Las,
        Region::Oce,
        Region::Ru,
        Region::Tr,
    ];

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Region::Na => "na",
            Region::Br => "br",
            Region::Eune => "eune",
            Region::Euw => "euw",
            Region::Kr => "kr",
            Region::Lan => "lan",
            Region::Las => "las",
            Region::Oce => "oce",
            Region::Ru => "ru",
            Region::Tr => "tr",
        }
    }

    /// Parses an optional query value, failing with `InvalidInput` when absent or unknown.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the value is missing or not a known region code
    pub fn from_query(value: Option<&str>) -> Result<Self, AppError> {
        value
            .ok_or_else(|| AppError::InvalidInput("invalid region".to_string()))?
            .parse()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::InvalidInput("invalid region".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips() {
        for region in Region::ALL {
            assert_eq!(region.code().parse::<Region>().unwrap(), region);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("EUW".parse::<Region>().unwrap(), Region::Euw);
        assert_eq!(" na ".parse::<Region>().unwrap(), Region::Na);
    }

    #[test]
    fn unknown_region_is_invalid_input() {
        let err = "pbe".parse::<Region>().unwrap_err();
        assert_eq!(err.code(), 400);
        assert_eq!(err.to_string(), "invalid region");
        assert!(Region::from_query(None).is_err());
    }
}
