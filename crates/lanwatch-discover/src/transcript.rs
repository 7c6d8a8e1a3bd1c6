//! Builder for the human-readable scan and deep-scan logs.
//!
//! Adapters and the deep scanner record what they ran and what came back:
//!
//! ```
//! # use lanwatch_discover::transcript::Transcript;
//! let mut log = Transcript::new();
//! log.command("arp-scan 192.168.1.0/24");
//! log.line("192.168.1.1\t00:14:6c:aa:bb:cc\tNETGEAR");
//! log.warn("scan timed out after 120 seconds");
//! let text = log.into_string();
//! assert!(text.starts_with("Command: arp-scan"));
//! ```

use std::fmt::Write as _;

/// Heading that introduces hosts dropped because their IP belonged to
/// another device.
pub const SKIPPED_SECTION: &str = "--- Skipped Devices (Duplicate IPs) ---";

/// Append-only log text.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the command line about to run.
    pub fn command(&mut self, command: &str) {
        self.line(&format!("Command: {command}"));
    }

    /// Append one line verbatim.
    pub fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn lines<S: AsRef<str>>(&mut self, lines: &[S]) {
        for line in lines {
            self.line(line.as_ref());
        }
    }

    /// `key: value` header line.
    pub fn field(&mut self, key: &str, value: impl std::fmt::Display) {
        let _ = writeln!(self.text, "{key}: {value}");
    }

    pub fn separator(&mut self) {
        self.line("---");
    }

    pub fn warn(&mut self, message: &str) {
        self.line(&format!("WARNING: {message}"));
    }

    pub fn error(&mut self, message: &str) {
        self.line(&format!("ERROR: {message}"));
    }

    /// Append the skipped-host section. Does nothing when `skipped` is empty.
    pub fn append_skipped(&mut self, skipped: &[String]) {
        if skipped.is_empty() {
            return;
        }
        self.text.push('\n');
        self.line(SKIPPED_SECTION);
        self.lines(skipped);
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_section_only_when_needed() {
        let mut log = Transcript::new();
        log.line("Found: 192.168.1.5 - AA:BB:CC:DD:EE:FF");
        log.append_skipped(&[]);
        assert!(!log.as_str().contains(SKIPPED_SECTION));

        log.append_skipped(&["Skipped: IP 192.168.1.5 (MAC: 11:22:33:44:55:66)".to_string()]);
        let text = log.into_string();
        assert!(text.contains("\n\n--- Skipped Devices (Duplicate IPs) ---\nSkipped: IP"));
    }

    #[test]
    fn test_header_lines() {
        let mut log = Transcript::new();
        log.field("Target IP", "192.168.1.50");
        log.separator();
        log.error("nmap not found");
        assert_eq!(
            log.as_str(),
            "Target IP: 192.168.1.50\n---\nERROR: nmap not found\n"
        );
    }
}
