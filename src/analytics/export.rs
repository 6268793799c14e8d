//! CSV export of raw scan events
//!
//! Fields are comma-joined without quoting; values that themselves contain
//! commas will shift columns.

use chrono::{DateTime, SecondsFormat, Utc};

use super::models::to_datetime;
use crate::models::{ScanEvent, UNKNOWN};

const HEADERS: [&str; 9] = [
    "Date",
    "Time",
    "Country",
    "City",
    "Device Type",
    "Operating System",
    "Browser",
    "Is Unique",
    "IP Address",
];

pub fn to_csv(events: &[ScanEvent], title: &str) -> String {
    to_csv_at(events, title, Utc::now())
}

pub fn to_csv_at(events: &[ScanEvent], title: &str, generated_at: DateTime<Utc>) -> String {
    let mut lines = Vec::with_capacity(events.len() + 4);
    lines.push(format!("# Analytics Export for: {title}"));
    lines.push(format!(
        "# Generated on: {}",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    lines.push(String::new());
    lines.push(HEADERS.join(","));
    lines.extend(events.iter().map(row));
    lines.join("\n")
}

fn row(event: &ScanEvent) -> String {
    let at = to_datetime(event.timestamp);
    [
        at.format("%Y-%m-%d").to_string(),
        at.format("%H:%M:%S").to_string(),
        event.location.country.clone(),
        event.location.city.clone(),
        event.device.device_type.as_str().to_string(),
        event.device.os.clone(),
        event.device.browser.clone(),
        if event.is_unique { "Yes" } else { "No" }.to_string(),
        event
            .ip_address
            .clone()
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    ]
    .join(",")
}

/// Download name for a code's export.
pub fn csv_filename(short_code: &str) -> String {
    format!("qr-analytics-{short_code}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceInfo, DeviceType, Location};
    use chrono::TimeZone;

    #[test]
    fn test_csv_layout() {
        let generated = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();
        let events = vec![
            ScanEvent {
                id: 1,
                qr_code_id: 1,
                timestamp: Utc
                    .with_ymd_and_hms(2026, 10, 17, 14, 5, 9)
                    .unwrap()
                    .timestamp(),
                is_unique: true,
                location: Location::new(Some("US"), Some("Austin")),
                device: DeviceInfo {
                    device_type: DeviceType::Mobile,
                    os: "iOS".to_string(),
                    browser: "Safari".to_string(),
                },
                ip_address: Some("203.0.113.9".to_string()),
                user_agent: None,
            },
            ScanEvent {
                id: 2,
                qr_code_id: 1,
                timestamp: 0,
                is_unique: false,
                location: Location::default(),
                device: DeviceInfo::default(),
                ip_address: None,
                user_agent: None,
            },
        ];

        let csv = to_csv_at(&events, "Spring menu", generated);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "# Analytics Export for: Spring menu");
        assert_eq!(lines[1], "# Generated on: 2026-10-18T08:00:00.000Z");
        assert_eq!(lines[2], "");
        assert_eq!(
            lines[3],
            "Date,Time,Country,City,Device Type,Operating System,Browser,Is Unique,IP Address"
        );
        assert_eq!(
            lines[4],
            "2026-10-17,14:05:09,US,Austin,mobile,iOS,Safari,Yes,203.0.113.9"
        );
        assert_eq!(
            lines[5],
            "1970-01-01,00:00:00,Unknown,Unknown,desktop,Unknown,Unknown,No,Unknown"
        );
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = to_csv(&[], "x");
        assert_eq!(csv.lines().count(), 4);
        assert_eq!(csv_filename("abc1234"), "qr-analytics-abc1234.csv");
    }
}
