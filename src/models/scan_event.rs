use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Facet value used whenever a dimension could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// One recorded redirect hit. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub id: i64,
    pub qr_code_id: i64,
    /// Unix timestamp (seconds, UTC)
    pub timestamp: i64,
    pub is_unique: bool,
    pub location: Location,
    pub device: DeviceInfo,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A scan event that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanEvent {
    pub qr_code_id: i64,
    pub timestamp: i64,
    pub is_unique: bool,
    pub location: Location,
    pub device: DeviceInfo,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewScanEvent {
    pub fn with_id(self, id: i64) -> ScanEvent {
        ScanEvent {
            id,
            qr_code_id: self.qr_code_id,
            timestamp: self.timestamp,
            is_unique: self.is_unique,
            location: self.location,
            device: self.device,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

/// Best-effort visitor location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
}

impl Location {
    /// Build a location, substituting `Unknown` for missing or blank parts.
    pub fn new(country: Option<&str>, city: Option<&str>) -> Self {
        Self {
            country: or_unknown(country),
            city: or_unknown(city),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub os: String,
    pub browser: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Desktop,
            os: UNKNOWN.to_string(),
            browser: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Desktop => "desktop",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mobile" => Ok(DeviceType::Mobile),
            "desktop" => Ok(DeviceType::Desktop),
            "tablet" => Ok(DeviceType::Tablet),
            other => Err(format!("unknown device type '{other}'")),
        }
    }
}

pub(crate) fn or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_defaults_to_unknown() {
        let loc = Location::new(Some(""), Some("Paris"));
        assert_eq!(loc.country, "Unknown");
        assert_eq!(loc.city, "Paris");
        assert_eq!(Location::default(), Location::new(None, None));
    }

    #[test]
    fn test_device_type_round_trips_through_str() {
        for t in [DeviceType::Mobile, DeviceType::Desktop, DeviceType::Tablet] {
            assert_eq!(t.as_str().parse::<DeviceType>().unwrap(), t);
        }
        assert!("watch".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_device_serializes_type_field() {
        let json = serde_json::to_value(DeviceInfo::default()).unwrap();
        assert_eq!(json["type"], "desktop");
        assert_eq!(json["os"], "Unknown");
    }
}
