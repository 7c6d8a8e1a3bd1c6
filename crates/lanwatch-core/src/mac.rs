//! MAC address helpers.
//!
//! Observed MACs are stored in uppercase colon-separated form
//! (`AA:BB:CC:DD:EE:FF`). Hosts seen without a MAC (answering across a
//! subnet boundary) get a synthetic placeholder in the locally-administered
//! `fe:00:` range, derived from a BLAKE3 hash of the IP string.

/// Prefix of every synthetic MAC. Lowercase on purpose: normalized real
/// MACs are uppercase, so the two spaces never overlap.
pub const PLACEHOLDER_PREFIX: &str = "fe:00:";

/// Normalize a MAC address to uppercase colon-separated form.
///
/// Accepts `:` or `-` separators and single-digit octets (as printed by BSD
/// `arp`). Returns `None` for anything that is not six hex octets.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.trim().split([':', '-']).collect();
    if parts.len() != 6 {
        return None;
    }

    let mut octets = Vec::with_capacity(6);
    for part in parts {
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        octets.push(format!("{:0>2}", part.to_ascii_uppercase()));
    }

    Some(octets.join(":"))
}

/// Deterministic placeholder MAC for a host whose real MAC is not observable.
pub fn placeholder_mac(ip: &str) -> String {
    let hash = blake3::hash(ip.as_bytes());
    let b = hash.as_bytes();
    format!(
        "{PLACEHOLDER_PREFIX}{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3]
    )
}

/// True if the MAC was produced by [`placeholder_mac`].
pub fn is_placeholder(mac: &str) -> bool {
    mac.starts_with(PLACEHOLDER_PREFIX)
}

/// First three octets of a normalized MAC (`AA:BB:CC`).
pub fn oui(mac: &str) -> Option<&str> {
    if mac.len() >= 8 {
        mac.get(..8)
    } else {
        None
    }
}
