//! Heuristic device-type classification from vendor and hostname.

use lanwatch_core::{Device, DeviceType};

use crate::vendor::UNKNOWN_VENDOR;

/// Assigns a [`DeviceType`] to a device that has none yet.
pub trait DeviceClassifier: Send + Sync {
    fn classify(&self, device: &Device) -> DeviceType;
}

/// Vendor name prefix → likely type. Checked first.
const VENDOR_RULES: &[(&str, DeviceType)] = &[
    ("cisco", DeviceType::Router),
    ("netgear", DeviceType::Router),
    ("tp-link", DeviceType::Router),
    ("linksys", DeviceType::Router),
    ("asus", DeviceType::Router),
    ("nintendo", DeviceType::GamingConsole),
    ("sony", DeviceType::GamingConsole),
    ("microsoft", DeviceType::GamingConsole),
    ("amazon", DeviceType::SmartHome),
    ("google", DeviceType::SmartHome),
    ("dell", DeviceType::Computer),
    ("hp", DeviceType::Computer),
    ("intel", DeviceType::Computer),
    ("apple", DeviceType::Smartphone),
    ("samsung", DeviceType::Smartphone),
    ("raspberry pi", DeviceType::Server),
];

/// Hostname substring → type, first match wins. Order matters: `tablet`
/// names beat `laptop` ones, `server` beats `gateway`.
const HOSTNAME_RULES: &[(&[&str], DeviceType)] = &[
    (&["iphone", "android", "galaxy", "pixel"], DeviceType::Smartphone),
    (&["ipad", "tablet"], DeviceType::Tablet),
    (&["macbook", "laptop", "notebook"], DeviceType::Laptop),
    (&["desktop", "pc", "imac", "mac-mini"], DeviceType::Computer),
    (&["printer", "epson", "canon", "hp-", "brother"], DeviceType::Printer),
    (&["-tv", "smarttv", "roku", "firetv", "chromecast", "appletv"], DeviceType::SmartTv),
    (&["playstation", "xbox", "nintendo", "switch"], DeviceType::GamingConsole),
    (&["nas", "synology", "qnap", "drobo"], DeviceType::Nas),
    (&["camera", "cam-", "ipcam", "nest"], DeviceType::Camera),
    (&["echo", "alexa", "home-mini", "homepod", "hue", "smartthings"], DeviceType::SmartHome),
    (&["server", "srv", "pi", "raspberry"], DeviceType::Server),
    (&["router", "gateway", "ap-", "accesspoint"], DeviceType::Router),
];

/// Needles too short to match as substrings. They must form a whole
/// hostname token, optionally followed by digits (`pi`, `pi4`).
const WORD_NEEDLES: &[&str] = &["pi"];

fn has_word(hostname: &str, word: &str) -> bool {
    hostname
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter_map(|token| token.strip_prefix(word))
        .any(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

/// Table-driven classifier: vendor rules, then hostname rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleClassifier;

impl RuleClassifier {
    fn by_vendor(vendor: &str) -> Option<DeviceType> {
        let vendor = vendor.trim().to_lowercase();
        if vendor.is_empty() || vendor.starts_with(&UNKNOWN_VENDOR.to_lowercase()) {
            return None;
        }
        VENDOR_RULES
            .iter()
            .find(|(prefix, _)| vendor.starts_with(prefix))
            .map(|(_, ty)| *ty)
    }

    fn by_hostname(hostname: &str) -> Option<DeviceType> {
        let hostname = hostname.to_lowercase();
        HOSTNAME_RULES
            .iter()
            .find(|(needles, _)| {
                needles.iter().any(|n| {
                    if WORD_NEEDLES.contains(n) {
                        has_word(&hostname, n)
                    } else {
                        hostname.contains(n)
                    }
                })
            })
            .map(|(_, ty)| *ty)
    }
}

impl DeviceClassifier for RuleClassifier {
    fn classify(&self, device: &Device) -> DeviceType {
        device
            .vendor
            .as_deref()
            .and_then(Self::by_vendor)
            .or_else(|| device.hostname.as_deref().and_then(Self::by_hostname))
            .unwrap_or(DeviceType::Unknown)
    }
}
