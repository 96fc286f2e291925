//! User-agent fingerprinting for session records.
//!
//! Classification is an ordered list of (token, label) rules evaluated in
//! priority order. Ordering is load-bearing: tablet markers run before phone
//! markers, phone markers before generic OS tokens, and derived browsers
//! before the engine token they embed. Keeping the rules as data keeps that
//! precedence auditable and lets each entry be tested on its own.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const UNKNOWN_LABEL: &str = "Unknown";

/// Device class derived from a user-agent string.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
            Self::Unknown => "unknown",
        }
    }

    /// Icon name consumed by the sessions UI.
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::Mobile => "smartphone",
            Self::Tablet => "tablet",
            Self::Desktop => "monitor",
            Self::Unknown => "help-circle",
        }
    }
}

/// Parsed user-agent labels, embedded into a session at creation time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceFingerprint {
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub raw: Option<String>,
}

/// Tablet markers run first: every tablet user agent also carries tokens a
/// phone or desktop rule would match.
const TABLET_MARKERS: &[&str] = &["ipad", "tablet", "kindle", "silk", "playbook"];

/// Phone markers, checked before any OS token. "mobile" sits last because it
/// is the generic hint Android phones carry next to their OS token.
const MOBILE_MARKERS: &[&str] = &[
    "iphone",
    "ipod",
    "windows phone",
    "blackberry",
    "opera mini",
    "mobile",
];

/// Browser rules in priority order. Derived browsers ship the token of the
/// engine they are built on: Edge, Opera, and Samsung Internet all contain
/// "chrome", and Chrome itself contains "safari".
const BROWSER_RULES: &[(&str, &str)] = &[
    ("edg", "Edge"),
    ("opr/", "Opera"),
    ("opera", "Opera"),
    ("samsungbrowser", "Samsung Internet"),
    ("firefox", "Firefox"),
    ("fxios", "Firefox"),
    ("crios", "Chrome"),
    ("chrome", "Chrome"),
    ("safari", "Safari"),
    ("msie", "Internet Explorer"),
    ("trident", "Internet Explorer"),
];

/// OS rules in priority order: "windows phone" before "windows", iOS device
/// tokens before the "Mac OS X" token they embed, Android before the Linux
/// token it is built on.
const OS_RULES: &[(&str, &str)] = &[
    ("windows phone", "Windows Phone"),
    ("iphone", "iOS"),
    ("ipad", "iOS"),
    ("ipod", "iOS"),
    ("android", "Android"),
    ("cros", "Chrome OS"),
    ("windows", "Windows"),
    ("mac os x", "macOS"),
    ("macintosh", "macOS"),
    ("linux", "Linux"),
];

/// Classify a raw user-agent header value. `None` or empty input yields the
/// unknown fingerprint.
#[must_use]
pub fn parse(user_agent: Option<&str>) -> DeviceFingerprint {
    let raw = user_agent.map(str::trim).filter(|ua| !ua.is_empty());
    let Some(raw) = raw else {
        return DeviceFingerprint {
            device_type: DeviceType::Unknown,
            browser: UNKNOWN_LABEL.to_string(),
            os: UNKNOWN_LABEL.to_string(),
            raw: None,
        };
    };

    let lower = raw.to_lowercase();
    DeviceFingerprint {
        device_type: classify_device(&lower),
        browser: match_rules(&lower, BROWSER_RULES),
        os: match_rules(&lower, OS_RULES),
        raw: Some(raw.to_string()),
    }
}

fn classify_device(ua: &str) -> DeviceType {
    if TABLET_MARKERS.iter().any(|marker| ua.contains(marker)) {
        return DeviceType::Tablet;
    }
    // Android builds without the "mobile" hint are tablets.
    if ua.contains("android") && !ua.contains("mobile") {
        return DeviceType::Tablet;
    }
    if ua.contains("android") || MOBILE_MARKERS.iter().any(|marker| ua.contains(marker)) {
        return DeviceType::Mobile;
    }
    DeviceType::Desktop
}

fn match_rules(ua: &str, rules: &[(&str, &str)]) -> String {
    rules
        .iter()
        .find(|(token, _)| ua.contains(token))
        .map_or(UNKNOWN_LABEL, |(_, label)| *label)
        .to_string()
}

/// Human-readable device line for the sessions UI, e.g. "Chrome on Windows"
/// or "Safari on iOS (mobile)".
#[must_use]
pub fn description(fingerprint: &DeviceFingerprint) -> String {
    let browser_known = fingerprint.browser != UNKNOWN_LABEL;
    let os_known = fingerprint.os != UNKNOWN_LABEL;

    let base = match (browser_known, os_known) {
        (true, true) => format!("{} on {}", fingerprint.browser, fingerprint.os),
        (true, false) => fingerprint.browser.clone(),
        (false, true) => fingerprint.os.clone(),
        (false, false) => return "Unknown device".to_string(),
    };

    match fingerprint.device_type {
        DeviceType::Desktop | DeviceType::Unknown => base,
        device => format!("{base} ({})", device.as_str()),
    }
}
