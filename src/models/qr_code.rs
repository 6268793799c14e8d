use serde::{Deserialize, Serialize};

pub const DEFAULT_QR_SIZE: u32 = 256;
pub const DEFAULT_FOREGROUND: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
pub const MIN_QR_SIZE: u32 = 64;
pub const MAX_QR_SIZE: u32 = 4096;
const UNTITLED: &str = "Untitled";

/// A generated QR code and the short link it encodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: i64,
    pub original_url: String,
    /// Always stored lowercase
    pub short_code: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub customization: Customization,
    pub campaign: Option<Campaign>,
    pub is_active: bool,
    /// Running scan counter, only ever changed by atomic increments
    pub scans: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl QrCode {
    /// Human readable label: title, then destination URL, then a placeholder.
    pub fn display_title(&self) -> &str {
        display_title(self.title.as_deref(), Some(&self.original_url))
    }

    pub fn short_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.short_code)
    }
}

pub(crate) fn display_title<'a>(title: Option<&'a str>, url: Option<&'a str>) -> &'a str {
    title
        .filter(|t| !t.is_empty())
        .or(url.filter(|u| !u.is_empty()))
        .unwrap_or(UNTITLED)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customization {
    pub size: u32,
    pub foreground_color: String,
    pub background_color: String,
}

impl Customization {
    /// Size must fall in `MIN_QR_SIZE..=MAX_QR_SIZE` and colors must be
    /// `#rgb` or `#rrggbb`; they are written verbatim into the SVG.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_QR_SIZE..=MAX_QR_SIZE).contains(&self.size) {
            return Err(format!(
                "Size must be between {MIN_QR_SIZE} and {MAX_QR_SIZE}"
            ));
        }
        for (field, color) in [
            ("foregroundColor", &self.foreground_color),
            ("backgroundColor", &self.background_color),
        ] {
            if !is_hex_color(color) {
                return Err(format!("{field} must be a hex color like #1a2b3c"));
            }
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            size: DEFAULT_QR_SIZE,
            foreground_color: DEFAULT_FOREGROUND.to_string(),
            background_color: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub start_date: Option<i64>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub end_date: Option<i64>,
}

impl Campaign {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.medium.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

/// Fields needed to insert a QR code; the short code is already generated.
#[derive(Debug, Clone)]
pub struct NewQrCode {
    pub original_url: String,
    pub short_code: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub customization: Customization,
    pub campaign: Option<Campaign>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQrCodeRequest {
    pub original_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub customization: Option<Customization>,
    pub campaign: Option<Campaign>,
}

impl CreateQrCodeRequest {
    /// Returns the trimmed destination URL, or `None` when it is missing or blank.
    pub fn destination(&self) -> Option<&str> {
        self.original_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Check every provided field before a short code is allocated.
    pub fn validate(&self) -> Result<(), String> {
        if self.destination().is_none() {
            return Err("Original URL is required".to_string());
        }
        if let Some(customization) = &self.customization {
            customization.validate()?;
        }
        Ok(())
    }

    pub fn into_new(self, short_code: String) -> Option<NewQrCode> {
        let original_url = self.destination()?.to_string();
        Some(NewQrCode {
            original_url,
            short_code,
            title: self.title,
            description: self.description,
            customization: self.customization.unwrap_or_default(),
            campaign: self.campaign.filter(|c| !c.is_empty()),
        })
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQrCodeRequest {
    pub original_url: Option<String>,
    pub short_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub customization: Option<Customization>,
    pub campaign: Option<Campaign>,
}

impl UpdateQrCodeRequest {
    /// Apply the patch onto an existing record. Returns an error message when
    /// a provided field is invalid.
    pub fn apply_to(self, qr: &mut QrCode) -> Result<(), String> {
        if let Some(url) = self.original_url {
            let url = url.trim();
            if url.is_empty() {
                return Err("Original URL cannot be empty".to_string());
            }
            qr.original_url = url.to_string();
        }
        if let Some(code) = self.short_code {
            qr.short_code = normalize_short_code(&code)?;
        }
        if let Some(title) = self.title {
            qr.title = Some(title);
        }
        if let Some(description) = self.description {
            qr.description = Some(description);
        }
        if let Some(active) = self.is_active {
            qr.is_active = active;
        }
        if let Some(customization) = self.customization {
            customization.validate()?;
            qr.customization = customization;
        }
        if let Some(campaign) = self.campaign {
            qr.campaign = Some(campaign).filter(|c| !c.is_empty());
        }
        Ok(())
    }
}

/// Lowercase and validate a user supplied short code.
pub fn normalize_short_code(code: &str) -> Result<String, String> {
    let code = code.trim().to_lowercase();
    if code.is_empty() || code.len() > crate::config::MAX_SHORT_CODE_LENGTH {
        return Err(format!(
            "Short code must be 1-{} characters",
            crate::config::MAX_SHORT_CODE_LENGTH
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Short code may only contain letters, digits, '-' and '_'".to_string());
    }
    Ok(code)
}
