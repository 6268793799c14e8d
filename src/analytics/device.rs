//! Rule-based user-agent classification
//!
//! Maps a raw `User-Agent` header to a device type, operating system and
//! browser. Rules are ordered and first match wins. Every input, including
//! the empty string, yields a result.

use crate::models::{DeviceInfo, DeviceType, UNKNOWN};

// Tablets frequently also match the generic mobile markers, so they go first.
const TABLET_MARKERS: &[&str] = &["tablet", "ipad", "playbook", "silk"];

const MOBILE_MARKERS: &[&str] = &[
    "mobile",
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "opera",
    "mini",
    "windows ce",
    "palm",
    "smartphone",
    "iemobile",
];

// Android UAs carry "Linux" and iOS UAs carry "like Mac OS X", so the mobile
// platforms are tested before their desktop relatives.
const OS_RULES: &[(&[&str], &str)] = &[
    (&["windows"], "Windows"),
    (&["android"], "Android"),
    (&["iphone", "ipad", "ipod"], "iOS"),
    (&["macintosh", "mac os x"], "macOS"),
    (&["linux"], "Linux"),
];

// Edge and Opera embed "Chrome", and Chrome embeds "Safari".
const BROWSER_RULES: &[(&[&str], &str)] = &[
    (&["edg/", "edge", "edga/", "edgios/"], "Edge"),
    (&["opr/", "opera"], "Opera"),
    (&["chrome", "crios"], "Chrome"),
    (&["firefox", "fxios"], "Firefox"),
    (&["safari"], "Safari"),
];

/// Classify a raw user-agent string.
pub fn classify(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_lowercase();

    let device_type = if contains_any(&ua, TABLET_MARKERS) {
        DeviceType::Tablet
    } else if contains_any(&ua, MOBILE_MARKERS) {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    };

    DeviceInfo {
        device_type,
        os: first_match(&ua, OS_RULES).to_string(),
        browser: first_match(&ua, BROWSER_RULES).to_string(),
    }
}

fn contains_any(ua: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| ua.contains(m))
}

fn first_match(ua: &str, rules: &[(&[&str], &'static str)]) -> &'static str {
    rules
        .iter()
        .find(|(markers, _)| contains_any(ua, markers))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";
    const WINDOWS_EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.51";
    const MAC_FIREFOX: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0";
    const LINUX_CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

    #[test]
    fn test_empty_user_agent_defaults() {
        let info = classify("");
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.os, "Unknown");
        assert_eq!(info.browser, "Unknown");
    }

    #[test]
    fn test_iphone() {
        let info = classify(IPHONE);
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.os, "iOS");
        assert_eq!(info.browser, "Safari");
    }

    #[test]
    fn test_ipad_is_tablet_even_with_mobile_marker() {
        let info = classify(IPAD);
        assert_eq!(info.device_type, DeviceType::Tablet);
        assert_eq!(info.os, "iOS");
    }

    #[test]
    fn test_android_is_not_linux() {
        let info = classify(ANDROID);
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.os, "Android");
        assert_eq!(info.browser, "Chrome");
    }

    #[test]
    fn test_desktop_browsers() {
        let edge = classify(WINDOWS_EDGE);
        assert_eq!(edge.device_type, DeviceType::Desktop);
        assert_eq!(edge.os, "Windows");
        assert_eq!(edge.browser, "Edge");

        let firefox = classify(MAC_FIREFOX);
        assert_eq!(firefox.os, "macOS");
        assert_eq!(firefox.browser, "Firefox");

        let chrome = classify(LINUX_CHROME);
        assert_eq!(chrome.os, "Linux");
        assert_eq!(chrome.browser, "Chrome");
    }

    #[test]
    fn test_classification_is_deterministic() {
        for ua in [IPHONE, IPAD, ANDROID, WINDOWS_EDGE, MAC_FIREFOX, LINUX_CHROME, "curl/8.5.0"] {
            assert_eq!(classify(ua), classify(ua));
        }
    }
}
