pub mod qr_code;
pub mod scan_event;

pub use qr_code::{
    normalize_short_code, Campaign, CreateQrCodeRequest, Customization, NewQrCode, QrCode,
    UpdateQrCodeRequest,
};
pub use scan_event::{DeviceInfo, DeviceType, Location, NewScanEvent, ScanEvent, UNKNOWN};
