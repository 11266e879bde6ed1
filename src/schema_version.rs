use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A declared schema version such as `1.1`, `1.1.1` or `2.0.1`.
///
/// Two-component versions stay two-component when displayed; for ordering
/// a missing update component counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub update: Option<u32>,
}

impl SchemaVersion {
    pub fn new(major: u32, minor: u32, update: Option<u32>) -> Self {
        Self { major, minor, update }
    }

    /// Build from the `cybox_major_version` / `cybox_minor_version` /
    /// `cybox_update_version` attribute values. An update of `0` is dropped.
    pub fn from_triplet(
        major: &str,
        minor: &str,
        update: Option<&str>,
    ) -> Result<Self, SchemaVersionError> {
        let invalid = || SchemaVersionError::InvalidFormat(format!("{}.{}.{}", major, minor, update.unwrap_or("")));
        let major = major.trim().parse().map_err(|_| invalid())?;
        let minor = minor.trim().parse().map_err(|_| invalid())?;
        let update = match update.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) => Some(u.parse::<u32>().map_err(|_| invalid())?).filter(|&u| u != 0),
            None => None,
        };
        Ok(Self::new(major, minor, update))
    }

    /// Attribute values for the triplet form; the update component is always written
    pub fn to_triplet(&self) -> (String, String, String) {
        (
            self.major.to_string(),
            self.minor.to_string(),
            self.update.unwrap_or(0).to_string(),
        )
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.update {
            Some(update) => write!(f, "{}.{}.{}", self.major, self.minor, update),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(SchemaVersionError::InvalidFormat(s.to_string()));
        }

        let major = parts[0].parse().map_err(|_| SchemaVersionError::InvalidFormat(s.to_string()))?;
        let minor = parts[1].parse().map_err(|_| SchemaVersionError::InvalidFormat(s.to_string()))?;
        let update = match parts.get(2) {
            Some(part) => Some(part.parse().map_err(|_| SchemaVersionError::InvalidFormat(s.to_string()))?),
            None => None,
        };

        Ok(SchemaVersion::new(major, minor, update))
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major.cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.update.unwrap_or(0).cmp(&other.update.unwrap_or(0)))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaVersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_display() {
        assert_eq!(SchemaVersion::new(1, 1, None).to_string(), "1.1");
        assert_eq!(SchemaVersion::new(1, 1, Some(1)).to_string(), "1.1.1");
    }

    #[test]
    fn test_schema_version_from_str() {
        let version: SchemaVersion = "2.0.1".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(2, 0, Some(1)));
        let version: SchemaVersion = "1.1".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(1, 1, None));
    }

    #[test]
    fn test_schema_version_ordering() {
        let v1: SchemaVersion = "2.0".parse().unwrap();
        let v2: SchemaVersion = "2.0.1".parse().unwrap();
        let v3: SchemaVersion = "2.1".parse().unwrap();

        assert!(v1 < v2);
        assert!(v2 < v3);
        assert_eq!(v1.cmp(&"2.0.0".parse().unwrap()), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_triplet_conversion() {
        let version = SchemaVersion::from_triplet("2", "0", Some("1")).unwrap();
        assert_eq!(version.to_string(), "2.0.1");

        let version = SchemaVersion::from_triplet("2", "1", Some("0")).unwrap();
        assert_eq!(version.to_string(), "2.1");
        assert_eq!(version.to_triplet(), ("2".to_string(), "1".to_string(), "0".to_string()));

        let version = SchemaVersion::from_triplet("2", "0", None).unwrap();
        assert_eq!(version.to_string(), "2.0");
    }

    #[test]
    fn test_invalid_version_format() {
        assert!("invalid".parse::<SchemaVersion>().is_err());
        assert!("1".parse::<SchemaVersion>().is_err());
        assert!("1.2.3.4".parse::<SchemaVersion>().is_err());
        assert!(SchemaVersion::from_triplet("two", "0", None).is_err());
    }
}
