//! Scan analytics
//!
//! Classification and recording of individual scans, the per-code rollup,
//! and the read-side views built from rollups and raw events: the time
//! windowed dashboard, the cross-code overview and the CSV export.

pub mod device;
pub mod export;
pub mod ip_extractor;
pub mod location;
pub mod models;
pub mod overview;
pub mod processor;
pub mod recorder;

pub use device::classify;
pub use ip_extractor::extract_client_ip;
pub use location::{LocationResolver, UnknownLocation};
pub use models::{AnalyticsRollup, Facet, FacetCounts};
pub use overview::{overview, Overview, TopQrCode};
pub use processor::{process, DateRange, GroupBy, ProcessedAnalytics};
pub use recorder::{ScanContext, ScanRecorder};
