//! Time-bucketed and faceted analytics over raw scan events
//!
//! Pure functions: the caller supplies the events and the reference time.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::models::{to_datetime, DAY_KEY_FORMAT, HOUR_KEY_FORMAT};
use crate::models::ScanEvent;

/// Maximum entries in the country and city rankings.
pub const TOP_LOCATIONS: usize = 10;

/// Lookback window ending at "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateRange {
    OneDay,
    #[default]
    SevenDays,
    ThirtyDays,
    NinetyDays,
}

impl DateRange {
    /// Parse a query value; anything unrecognized means seven days.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("1d") => DateRange::OneDay,
            Some("7d") => DateRange::SevenDays,
            Some("30d") => DateRange::ThirtyDays,
            Some("90d") => DateRange::NinetyDays,
            _ => DateRange::default(),
        }
    }

    pub fn window(&self) -> TimeDelta {
        match self {
            DateRange::OneDay => TimeDelta::days(1),
            DateRange::SevenDays => TimeDelta::days(7),
            DateRange::ThirtyDays => TimeDelta::days(30),
            DateRange::NinetyDays => TimeDelta::days(90),
        }
    }

    /// First instant included in the window.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window()
    }
}

/// Chart bucket width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupBy {
    Hour,
    #[default]
    Day,
}

impl GroupBy {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("hour") => GroupBy::Hour,
            _ => GroupBy::Day,
        }
    }

    /// Zero-padded ISO prefix, so lexicographic order is chronological.
    pub fn bucket_key(&self, at: DateTime<Utc>) -> String {
        let format = match self {
            GroupBy::Hour => HOUR_KEY_FORMAT,
            GroupBy::Day => DAY_KEY_FORMAT,
        };
        at.format(format).to_string()
    }

    fn step(&self) -> TimeDelta {
        match self {
            GroupBy::Hour => TimeDelta::hours(1),
            GroupBy::Day => TimeDelta::days(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: String,
    pub unique: i64,
    pub non_unique: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryShare {
    pub country: String,
    pub scans: i64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityShare {
    pub city: String,
    pub scans: i64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceShare {
    pub device: String,
    pub scans: i64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsShare {
    pub os: String,
    pub scans: i64,
    pub percentage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAnalytics {
    pub chart_data: Vec<ChartPoint>,
    pub top_countries: Vec<CountryShare>,
    pub top_cities: Vec<CityShare>,
    pub device_breakdown: Vec<DeviceShare>,
    pub os_breakdown: Vec<OsShare>,
}

/// Process events against the current wall clock.
pub fn process(events: &[ScanEvent], range: DateRange, group_by: GroupBy) -> ProcessedAnalytics {
    process_at(events, range, group_by, Utc::now())
}

/// Process events against an explicit reference time.
pub fn process_at(
    events: &[ScanEvent],
    range: DateRange,
    group_by: GroupBy,
    now: DateTime<Utc>,
) -> ProcessedAnalytics {
    let start = range.start(now);
    let start_ts = start.timestamp();
    let filtered: Vec<&ScanEvent> = events.iter().filter(|e| e.timestamp >= start_ts).collect();

    let total = filtered.len() as i64;
    let by_country = breakdown(filtered.iter().map(|e| e.location.country.as_str()), total);
    let by_city = breakdown(filtered.iter().map(|e| e.location.city.as_str()), total);
    let by_device = breakdown(filtered.iter().map(|e| e.device.device_type.as_str()), total);
    let by_os = breakdown(filtered.iter().map(|e| e.device.os.as_str()), total);

    ProcessedAnalytics {
        chart_data: chart_data(&filtered, group_by, start, now),
        top_countries: by_country
            .into_iter()
            .take(TOP_LOCATIONS)
            .map(|(country, scans, percentage)| CountryShare {
                country,
                scans,
                percentage,
            })
            .collect(),
        top_cities: by_city
            .into_iter()
            .take(TOP_LOCATIONS)
            .map(|(city, scans, percentage)| CityShare {
                city,
                scans,
                percentage,
            })
            .collect(),
        device_breakdown: by_device
            .into_iter()
            .map(|(device, scans, percentage)| DeviceShare {
                device,
                scans,
                percentage,
            })
            .collect(),
        os_breakdown: by_os
            .into_iter()
            .map(|(os, scans, percentage)| OsShare {
                os,
                scans,
                percentage,
            })
            .collect(),
    }
}

fn chart_data(
    events: &[&ScanEvent],
    group_by: GroupBy,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<ChartPoint> {
    let mut buckets: BTreeMap<String, ChartPoint> = BTreeMap::new();

    // Every bucket in the window appears, even when empty
    let mut cursor = start;
    while cursor <= now {
        let key = group_by.bucket_key(cursor);
        buckets.entry(key.clone()).or_insert_with(|| ChartPoint {
            date: key,
            ..Default::default()
        });
        cursor += group_by.step();
    }

    for event in events {
        let key = group_by.bucket_key(to_datetime(event.timestamp));
        let point = buckets.entry(key.clone()).or_insert_with(|| ChartPoint {
            date: key,
            ..Default::default()
        });
        point.total += 1;
        if event.is_unique {
            point.unique += 1;
        } else {
            point.non_unique += 1;
        }
    }

    buckets.into_values().collect()
}

/// Group facet values into `(value, scans, percentage)`, busiest first.
/// Ties are ordered by value so output is deterministic.
fn breakdown<'a>(values: impl Iterator<Item = &'a str>, total: i64) -> Vec<(String, i64, u32)> {
    if total == 0 {
        return Vec::new();
    }

    let mut counts: HashMap<&str, i64> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut rows: Vec<(String, i64, u32)> = counts
        .into_iter()
        .map(|(value, scans)| (value.to_string(), scans, percentage(scans, total)))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

fn percentage(part: i64, total: i64) -> u32 {
    ((part as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceInfo, DeviceType, Location};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 30, 0).unwrap()
    }

    fn event(at: DateTime<Utc>, country: &str, city: &str, unique: bool) -> ScanEvent {
        ScanEvent {
            id: 0,
            qr_code_id: 1,
            timestamp: at.timestamp(),
            is_unique: unique,
            location: Location::new(Some(country), Some(city)),
            device: DeviceInfo {
                device_type: DeviceType::Mobile,
                os: "Android".to_string(),
                browser: "Chrome".to_string(),
            },
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(DateRange::parse(Some("30d")), DateRange::ThirtyDays);
        assert_eq!(DateRange::parse(Some("1y")), DateRange::SevenDays);
        assert_eq!(DateRange::parse(None), DateRange::SevenDays);
        assert_eq!(GroupBy::parse(Some("hour")), GroupBy::Hour);
        assert_eq!(GroupBy::parse(Some("week")), GroupBy::Day);
    }

    #[test]
    fn test_top_countries_scenario() {
        let events = vec![
            event(now(), "US", "Austin", true),
            event(now(), "US", "Boston", true),
            event(now(), "FR", "Paris", true),
        ];
        let result = process_at(&events, DateRange::SevenDays, GroupBy::Day, now());

        assert_eq!(
            result.top_countries,
            vec![
                CountryShare {
                    country: "US".to_string(),
                    scans: 2,
                    percentage: 67
                },
                CountryShare {
                    country: "FR".to_string(),
                    scans: 1,
                    percentage: 33
                },
            ]
        );
    }

    #[test]
    fn test_empty_window_has_zero_buckets_and_no_rankings() {
        let result = process_at(&[], DateRange::SevenDays, GroupBy::Day, now());

        // 2026-10-11 through 2026-10-18 inclusive
        assert_eq!(result.chart_data.len(), 8);
        assert_eq!(result.chart_data[0].date, "2026-10-11");
        assert_eq!(result.chart_data[7].date, "2026-10-18");
        assert!(result.chart_data.iter().all(|p| p.total == 0));
        assert!(result.top_countries.is_empty());
        assert!(result.top_cities.is_empty());
        assert!(result.device_breakdown.is_empty());
        assert!(result.os_breakdown.is_empty());
    }

    #[test]
    fn test_hourly_buckets_cover_window() {
        let result = process_at(&[], DateRange::OneDay, GroupBy::Hour, now());
        assert_eq!(result.chart_data.len(), 25);
        assert_eq!(result.chart_data[0].date, "2026-10-17T12");
        assert_eq!(result.chart_data[24].date, "2026-10-18T12");
    }

    #[test]
    fn test_events_before_window_are_excluded() {
        let events = vec![
            event(now() - TimeDelta::days(8), "US", "Austin", true),
            event(now() - TimeDelta::days(7), "DE", "Berlin", false),
            event(now() - TimeDelta::hours(2), "DE", "Berlin", true),
        ];
        let result = process_at(&events, DateRange::SevenDays, GroupBy::Day, now());

        let total: i64 = result.chart_data.iter().map(|p| p.total).sum();
        assert_eq!(total, 2);
        assert_eq!(result.top_countries.len(), 1);
        assert_eq!(result.top_countries[0].country, "DE");
        assert_eq!(result.top_countries[0].percentage, 100);
    }

    #[test]
    fn test_bucket_sums_match_filtered_count() {
        let events: Vec<ScanEvent> = (0..40)
            .map(|i| {
                event(
                    now() - TimeDelta::hours(i * 5),
                    if i % 3 == 0 { "US" } else { "GB" },
                    "X",
                    i % 2 == 0,
                )
            })
            .collect();
        let start_ts = DateRange::SevenDays.start(now()).timestamp();
        let expected = events.iter().filter(|e| e.timestamp >= start_ts).count() as i64;

        let result = process_at(&events, DateRange::SevenDays, GroupBy::Hour, now());
        let total: i64 = result.chart_data.iter().map(|p| p.total).sum();
        assert_eq!(total, expected);
        for point in &result.chart_data {
            assert_eq!(point.unique + point.non_unique, point.total);
        }
        assert!(result
            .chart_data
            .windows(2)
            .all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_top_locations_are_truncated_and_sorted() {
        let events: Vec<ScanEvent> = (0..15)
            .flat_map(|i| {
                (0..=i).map(move |_| event(now(), &format!("C{i:02}"), &format!("City{i:02}"), true))
            })
            .collect();
        let result = process_at(&events, DateRange::OneDay, GroupBy::Day, now());

        assert_eq!(result.top_countries.len(), 10);
        assert_eq!(result.top_cities.len(), 10);
        assert_eq!(result.top_countries[0].country, "C14");
        assert!(result
            .top_countries
            .windows(2)
            .all(|w| w[0].scans >= w[1].scans));
    }

    #[test]
    fn test_percentages_sum_close_to_hundred() {
        let events = vec![
            event(now(), "US", "A", true),
            event(now(), "FR", "B", true),
            event(now(), "DE", "C", true),
        ];
        let result = process_at(&events, DateRange::SevenDays, GroupBy::Day, now());
        let sum: u32 = result.top_countries.iter().map(|c| c.percentage).sum();
        let distinct = result.top_countries.len() as i64;
        assert!((sum as i64 - 100).abs() <= distinct);
    }

    #[test]
    fn test_device_and_os_breakdowns_are_untruncated() {
        let mut events = vec![event(now(), "US", "A", true)];
        events[0].device.device_type = DeviceType::Tablet;
        events[0].device.os = "iOS".to_string();
        events.push(event(now(), "US", "A", false));
        events.push(event(now(), "US", "A", false));

        let result = process_at(&events, DateRange::SevenDays, GroupBy::Day, now());
        assert_eq!(
            result.device_breakdown,
            vec![
                DeviceShare {
                    device: "mobile".to_string(),
                    scans: 2,
                    percentage: 67
                },
                DeviceShare {
                    device: "tablet".to_string(),
                    scans: 1,
                    percentage: 33
                },
            ]
        );
        assert_eq!(result.os_breakdown[0].os, "Android");
        assert_eq!(result.os_breakdown[1].os, "iOS");
    }

    #[test]
    fn test_unique_split_in_bucket() {
        let events = vec![
            event(now(), "US", "A", true),
            event(now(), "US", "A", false),
            event(now(), "US", "A", false),
        ];
        let result = process_at(&events, DateRange::OneDay, GroupBy::Day, now());
        let today = result
            .chart_data
            .iter()
            .find(|p| p.date == "2026-10-18")
            .unwrap();
        assert_eq!((today.unique, today.non_unique, today.total), (1, 2, 3));
    }
}
