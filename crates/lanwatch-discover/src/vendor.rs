//! MAC-prefix vendor lookup.

use std::collections::HashMap;
use std::sync::OnceLock;

use lanwatch_core::mac;

/// Vendor name returned when the prefix is not recognized.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Resolves a MAC address to a manufacturer name.
pub trait VendorLookup: Send + Sync {
    /// Returns [`UNKNOWN_VENDOR`] when nothing matches.
    fn lookup(&self, mac: &str) -> String;
}

/// Built-in table of common consumer and networking OUIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct OuiVendorLookup;

#[rustfmt::skip]
const OUI_TABLE: &[(&str, &[&str])] = &[
    (
        "Apple",
        &[
            "00:03:93", "00:0A:27", "00:0A:95", "00:0D:93", "00:11:24", "00:14:51", "00:16:CB", "00:17:F2",
            "00:19:E3", "00:1B:63", "00:1C:B3", "00:1D:4F", "00:1E:52", "00:1E:C2", "00:1F:5B", "00:1F:F3",
            "00:21:E9", "00:22:41", "00:23:12", "00:23:32", "00:23:6C", "00:23:DF", "00:24:36", "00:25:00",
            "00:25:4B", "00:25:BC", "00:26:08", "00:26:4A", "00:26:B0", "00:26:BB",
        ],
    ),
    (
        "Samsung",
        &[
            "00:00:F0", "00:02:78", "00:07:AB", "00:09:18", "00:0D:AE", "00:0D:E5", "00:12:47", "00:12:FB",
            "00:13:77", "00:15:99", "00:15:B9", "00:16:32", "00:16:6B", "00:16:6C", "00:16:DB", "00:17:C9",
            "00:17:D5", "00:18:AF",
        ],
    ),
    (
        "Intel",
        &[
            "00:02:B3", "00:03:47", "00:04:23", "00:07:E9", "00:0C:F1", "00:0E:0C", "00:0E:35", "00:11:11",
            "00:12:F0", "00:13:02", "00:13:20", "00:13:CE", "00:13:E8", "00:15:00", "00:15:17", "00:16:6F",
            "00:16:76", "00:16:EA", "00:16:EB", "00:17:35",
        ],
    ),
    (
        "Cisco",
        &[
            "00:00:0C", "00:01:42", "00:01:43", "00:01:63", "00:01:64", "00:01:96", "00:01:97", "00:01:C7",
            "00:01:C9", "00:02:16", "00:02:17", "00:02:3D", "00:02:4A", "00:02:4B", "00:02:7D", "00:02:7E",
            "00:02:B9", "00:02:BA", "00:02:FC", "00:02:FD",
        ],
    ),
    (
        "TP-Link",
        &[
            "00:27:19", "10:FE:ED", "14:CC:20", "14:CF:92", "18:A6:F7", "1C:3B:F3", "20:DC:E6", "24:69:68",
            "30:B5:C2", "50:3E:AA", "54:C8:0F", "5C:89:9A", "60:E3:27",
        ],
    ),
    (
        "Netgear",
        &[
            "00:09:5B", "00:0F:B5", "00:14:6C", "00:18:4D", "00:1B:2F", "00:1E:2A", "00:1F:33", "00:22:3F",
            "00:24:B2", "00:26:F2", "08:BD:43", "10:0D:7F", "10:DA:43",
        ],
    ),
    (
        "Dell",
        &[
            "00:06:5B", "00:08:74", "00:0B:DB", "00:0D:56", "00:0F:1F", "00:11:43", "00:12:3F", "00:13:72",
            "00:14:22", "00:15:C5", "00:18:8B", "00:19:B9", "00:1A:A0", "00:1C:23", "00:1D:09", "00:1E:4F",
            "00:1E:C9", "00:21:70", "00:21:9B", "00:22:19", "00:23:AE", "00:24:E8", "00:25:64", "00:26:B9",
        ],
    ),
    (
        "HP",
        &[
            "00:01:E6", "00:01:E7", "00:02:A5", "00:04:EA", "00:08:02", "00:08:83", "00:0A:57", "00:0B:CD",
            "00:0D:9D", "00:0E:7F", "00:0F:20", "00:0F:61", "00:10:83", "00:10:E3", "00:11:0A", "00:11:85",
            "00:12:79", "00:13:21", "00:14:38", "00:14:C2", "00:15:60", "00:16:35", "00:17:08", "00:17:A4",
            "00:18:71", "00:18:FE", "00:19:BB",
        ],
    ),
    (
        "Amazon",
        &[
            "00:FC:8B", "0C:47:C9", "10:AE:60", "18:74:2E", "1C:12:B0", "34:D2:70", "38:F7:3D", "40:B4:CD",
            "44:65:0D", "4C:EF:C0", "50:DC:E7", "50:F5:DA", "58:38:79", "68:37:E9", "68:54:FD", "74:C2:46",
            "78:E1:03", "84:D6:D0", "A0:02:DC", "AC:63:BE", "B0:FC:0D", "F0:27:2D", "F0:D2:F1", "FC:65:DE",
            "FE:FC:FE",
        ],
    ),
    (
        "Google",
        &[
            "00:1A:11", "08:9E:08", "18:D6:C7", "1C:F2:9A", "20:DF:B9", "3C:5A:B4", "44:07:0B", "48:D6:D5",
            "54:60:09", "58:CB:52", "5C:E8:31", "94:EB:2C", "98:D2:93", "A4:77:33", "D8:6C:63", "F4:F5:D8",
            "F4:F5:E8", "F8:0F:F9",
        ],
    ),
    (
        "Sony",
        &[
            "00:01:4A", "00:04:1F", "00:0A:D9", "00:0E:07", "00:12:EE", "00:13:A9", "00:15:C1", "00:16:20",
            "00:18:13", "00:19:63", "00:19:C5", "00:1A:80", "00:1B:59", "00:1C:A4", "00:1D:0D", "00:1D:BA",
            "00:1E:A4", "00:1F:E4", "00:21:4F", "00:22:98", "00:23:45", "00:24:8D", "00:24:BE", "00:25:E7",
            "00:26:43",
        ],
    ),
    (
        "Microsoft",
        &[
            "00:03:FF", "00:0D:3A", "00:12:5A", "00:15:5D", "00:17:FA", "00:1D:D8", "00:22:48", "00:25:AE",
            "00:50:F2", "28:18:78", "30:59:B7", "50:1A:C5", "58:82:A8", "60:45:BD", "7C:1E:52", "7C:ED:8D",
            "98:5F:D3", "B4:0E:DE", "C8:3F:26", "D4:3D:7E",
        ],
    ),
    (
        "Raspberry Pi",
        &[
            "B8:27:EB", "DC:A6:32", "E4:5F:01",
        ],
    ),
    (
        "ASUS",
        &[
            "00:0C:6E", "00:0E:A6", "00:11:2F", "00:11:D8", "00:13:D4", "00:15:F2", "00:17:31", "00:18:F3",
            "00:1A:92", "00:1B:FC", "00:1D:60", "00:1E:8C", "00:1F:C6", "00:22:15", "00:23:54", "00:24:8C",
            "00:25:22", "00:26:18",
        ],
    ),
    (
        "Linksys",
        &[
            "00:04:5A", "00:06:25", "00:0C:41", "00:0F:66", "00:12:17", "00:13:10", "00:14:BF", "00:16:B6",
            "00:18:39", "00:18:F8", "00:1A:70", "00:1C:10", "00:1D:7E", "00:1E:E5", "00:21:29", "00:22:6B",
            "00:23:69", "00:25:9C",
        ],
    ),
    (
        "Nintendo",
        &[
            "00:09:BF", "00:16:56", "00:17:AB", "00:19:1D", "00:19:FD", "00:1A:E9", "00:1B:7A", "00:1B:EA",
            "00:1C:BE", "00:1D:BC", "00:1E:35", "00:1E:A9", "00:1F:32", "00:1F:C5", "00:21:47", "00:21:BD",
            "00:22:4C", "00:22:AA", "00:23:31", "00:23:CC", "00:24:1E", "00:24:44", "00:24:F3", "00:25:A0",
            "00:26:59", "2C:10:C1", "34:AF:2C", "40:D2:8A", "58:BD:A3", "7C:BB:8A", "8C:CD:E8", "98:41:5C",
            "E0:0C:7F", "E8:4E:CE",
        ],
    ),
];

fn oui_index() -> &'static HashMap<&'static str, &'static str> {
    static INDEX: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    INDEX.get_or_init(|| {
        OUI_TABLE
            .iter()
            .flat_map(|(vendor, prefixes)| prefixes.iter().map(move |p| (*p, *vendor)))
            .collect()
    })
}

impl VendorLookup for OuiVendorLookup {
    fn lookup(&self, raw: &str) -> String {
        if mac::is_placeholder(raw) {
            return UNKNOWN_VENDOR.to_string();
        }
        mac::normalize_mac(raw)
            .as_deref()
            .and_then(mac::oui)
            .and_then(|prefix| oui_index().get(prefix).copied())
            .unwrap_or(UNKNOWN_VENDOR)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_prefixes() {
        let vendors = OuiVendorLookup;
        assert_eq!(vendors.lookup("B8:27:EB:12:34:56"), "Raspberry Pi");
        assert_eq!(vendors.lookup("00:14:6c:aa:bb:cc"), "Netgear");
        assert_eq!(vendors.lookup("00-1b-63-01-02-03"), "Apple");
    }

    #[test]
    fn test_unknown_and_placeholder() {
        let vendors = OuiVendorLookup;
        assert_eq!(vendors.lookup("AA:BB:CC:DD:EE:FF"), UNKNOWN_VENDOR);
        assert_eq!(vendors.lookup(""), UNKNOWN_VENDOR);
        assert_eq!(vendors.lookup(&mac::placeholder_mac("10.0.0.1")), UNKNOWN_VENDOR);
    }

    #[test]
    fn test_table_has_no_duplicate_prefixes() {
        let total: usize = OUI_TABLE.iter().map(|(_, p)| p.len()).sum();
        assert_eq!(oui_index().len(), total);
    }
}
