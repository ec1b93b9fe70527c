//! Login output scanner.
//!
//! The gateway login process prints its progress to stdout and stderr:
//! pairing codes, terminal-rendered QR artwork, and eventually a connection
//! confirmation. `LoginScanner` consumes that output one line at a time and
//! turns the interesting lines into [`LinkEvent`]s.
//!
//! Rules are evaluated in strict priority order per line, first match
//! wins:
//!
//! 1. Connection confirmation (fires at most once per run)
//! 2. Pairing code (`2@...`, longer than 50 chars, deduplicated)
//! 3. QR artwork block start
//! 4. QR artwork block accumulation
//! 5. QR artwork block close (more than 10 lines + bottom edge)
//!
//! Lines matching none of the rules leave the scanner untouched.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases that indicate the channel finished linking. Checked
/// case-insensitively as substrings.
const CONNECTED_PHRASES: [&str; 5] = [
    "connected",
    "linked after restart",
    "web session ready",
    "session authenticated",
    "logged in",
];

/// A pairing code is only treated as such past this length; shorter `2@`
/// fragments show up in QR artwork captions and debug output.
const PAIRING_CODE_MIN_LEN: usize = 50;

/// Leading glyph runs of the two terminal QR renderings: half-block
/// inverted and full-block bordered.
const QR_TOP_EDGES: [&str; 2] = ["▄▄▄▄▄▄▄", "█▀▀▀▀▀"];

/// Bottom edge glyph run closing a QR artwork block.
const QR_BOTTOM_EDGE: &str = "▀▀▀▀▀▀▀";

/// A QR artwork block is only closed once it has grown past this many
/// lines; real renderings are at least twice that.
const QR_MIN_LINES: usize = 10;

static PAIRING_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"2@[A-Za-z0-9+/=,]+").expect("pairing code regex is valid"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+\d{8,15}").expect("phone regex is valid"));

/// An event worth relaying to the remote listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The channel reported a successful link; the gateway is configuring.
    /// Carries the phone number when the confirmation line included one.
    Configuring { phone: Option<String> },
    /// A scannable artifact is ready: either a raw pairing code or the
    /// base64 of a captured QR artwork block.
    QrReady { payload: String },
}

/// Stateful per-line scanner over the login process output.
///
/// Both output streams of the subprocess feed the same scanner; callers
/// must serialize access (see `flow`).
#[derive(Debug, Default)]
pub struct LoginScanner {
    /// Inside a QR artwork block.
    capturing: bool,
    /// Lines of the block being captured; valid only while `capturing`.
    buffer: Vec<String>,
    /// Payload of the last event actually emitted. Single slot: suppresses
    /// consecutive re-emission of an identical payload only.
    last_sent_key: String,
    /// Connection confirmation already seen this run.
    connected: bool,
}

impl LoginScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a connection confirmation line has been observed.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Feed one line (newline already stripped) and get back at most one
    /// event.
    pub fn observe(&mut self, line: &str) -> Option<LinkEvent> {
        // Rule 1: connection confirmation, at most once per run.
        if !self.connected && is_connected_line(line) {
            self.connected = true;
            return Some(LinkEvent::Configuring {
                phone: extract_phone(line),
            });
        }

        // Rule 2: pairing code. A long match consumes the line whether or
        // not the dedup slot suppresses it.
        if let Some(m) = PAIRING_CODE_RE.find(line) {
            if m.as_str().len() > PAIRING_CODE_MIN_LEN {
                let code = m.as_str();
                if code != self.last_sent_key {
                    self.last_sent_key = code.to_string();
                    return Some(LinkEvent::QrReady {
                        payload: code.to_string(),
                    });
                }
                return None;
            }
        }

        // Rule 3: QR block start. No early return: the start line is also
        // the first accumulated line.
        if !self.capturing && QR_TOP_EDGES.iter().any(|edge| line.contains(edge)) {
            self.capturing = true;
            self.buffer.clear();
        }

        // Rules 4 and 5: accumulate, then close on the bottom edge.
        if self.capturing {
            self.buffer.push(line.to_string());

            if self.buffer.len() > QR_MIN_LINES && line.contains(QR_BOTTOM_EDGE) {
                self.capturing = false;
                let artwork = self.buffer.join("\n");
                self.buffer.clear();

                let encoded = BASE64.encode(artwork.as_bytes());
                if encoded != self.last_sent_key {
                    self.last_sent_key = encoded.clone();
                    return Some(LinkEvent::QrReady { payload: encoded });
                }
            }
        }

        None
    }
}

fn is_connected_line(line: &str) -> bool {
    let lowered = line.to_lowercase();
    CONNECTED_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Pull a phone number (`+` followed by 8-15 digits) out of a confirmation
/// line, when present.
fn extract_phone(line: &str) -> Option<String> {
    PHONE_RE.find(line).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A plausible half-block QR rendering: top edge, body, bottom edge.
    fn qr_block_lines() -> Vec<String> {
        let mut lines = vec!["▄▄▄▄▄▄▄▄▄▄".to_string()];
        for i in 0..10 {
            lines.push(format!("█ ▄▀▄ {} █", i));
        }
        lines.push("▀▀▀▀▀▀▀▀▀▀".to_string());
        lines
    }

    fn long_pairing_line() -> String {
        format!("pairing code: 2@{}", "A".repeat(60))
    }

    #[test]
    fn test_unrelated_lines_are_a_no_op() {
        let mut scanner = LoginScanner::new();
        assert_eq!(scanner.observe("starting gateway v1.2.3"), None);
        assert_eq!(scanner.observe(""), None);
        assert_eq!(scanner.observe("retrying in 5s"), None);
        assert!(!scanner.connected());
        assert!(!scanner.capturing);
        assert!(scanner.buffer.is_empty());
        assert!(scanner.last_sent_key.is_empty());
    }

    #[test]
    fn test_connected_line_emits_configuring_once() {
        let mut scanner = LoginScanner::new();
        assert_eq!(
            scanner.observe("Session authenticated"),
            Some(LinkEvent::Configuring { phone: None })
        );
        assert!(scanner.connected());
        // Later confirmations never fire again.
        assert_eq!(scanner.observe("connected"), None);
        assert_eq!(scanner.observe("Logged in"), None);
    }

    #[test]
    fn test_connected_match_is_case_insensitive() {
        let mut scanner = LoginScanner::new();
        assert!(scanner.observe("WEB SESSION READY").is_some());
    }

    #[test]
    fn test_configuring_carries_phone_when_present() {
        let mut scanner = LoginScanner::new();
        assert_eq!(
            scanner.observe("logged in as +15551234567"),
            Some(LinkEvent::Configuring {
                phone: Some("+15551234567".to_string())
            })
        );
    }

    #[test]
    fn test_long_pairing_code_emits_qr_ready() {
        let mut scanner = LoginScanner::new();
        let line = long_pairing_line();
        let expected = format!("2@{}", "A".repeat(60));
        assert_eq!(
            scanner.observe(&line),
            Some(LinkEvent::QrReady {
                payload: expected.clone()
            })
        );
        assert_eq!(expected.len(), 62);
    }

    #[test]
    fn test_repeated_pairing_code_is_deduplicated() {
        let mut scanner = LoginScanner::new();
        let line = long_pairing_line();
        assert!(scanner.observe(&line).is_some());
        assert_eq!(scanner.observe(&line), None);
    }

    #[test]
    fn test_new_pairing_code_replaces_dedup_slot() {
        let mut scanner = LoginScanner::new();
        let first = format!("2@{}", "A".repeat(60));
        let second = format!("2@{}", "B".repeat(60));
        assert!(scanner.observe(&first).is_some());
        assert!(scanner.observe(&second).is_some());
        // The slot holds only the most recent payload, so the first code
        // goes through again.
        assert!(scanner.observe(&first).is_some());
    }

    #[test]
    fn test_short_pairing_match_is_ignored() {
        let mut scanner = LoginScanner::new();
        assert_eq!(scanner.observe("ref 2@abc123"), None);
    }

    #[test]
    fn test_qr_block_capture_emits_encoded_artwork() {
        let mut scanner = LoginScanner::new();
        let lines = qr_block_lines();
        let mut events = Vec::new();
        for line in &lines {
            if let Some(event) = scanner.observe(line) {
                events.push(event);
            }
        }
        let expected = BASE64.encode(lines.join("\n").as_bytes());
        assert_eq!(events, vec![LinkEvent::QrReady { payload: expected }]);
        assert!(!scanner.capturing);
        assert!(scanner.buffer.is_empty());
    }

    #[test]
    fn test_identical_qr_block_is_deduplicated() {
        let mut scanner = LoginScanner::new();
        let lines = qr_block_lines();
        let first: Vec<_> = lines.iter().filter_map(|l| scanner.observe(l)).collect();
        let second: Vec<_> = lines.iter().filter_map(|l| scanner.observe(l)).collect();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_short_pairing_match_inside_block_is_block_content() {
        let mut scanner = LoginScanner::new();
        let mut lines = qr_block_lines();
        // Splice a short 2@ fragment into the middle of the block.
        lines.insert(5, "2@short".to_string());
        let events: Vec<_> = lines.iter().filter_map(|l| scanner.observe(l)).collect();
        // Only the block close emits, and the fragment is part of the
        // encoded artwork.
        assert_eq!(events.len(), 1);
        let LinkEvent::QrReady { payload } = &events[0] else {
            panic!("expected QrReady");
        };
        assert_eq!(payload, &BASE64.encode(lines.join("\n").as_bytes()));
    }

    #[test]
    fn test_block_does_not_close_before_minimum_lines() {
        let mut scanner = LoginScanner::new();
        assert_eq!(scanner.observe(&"▄".repeat(10)), None);
        // Immediate bottom edge: block is only 2 lines deep, stays open.
        assert_eq!(scanner.observe(&"▀".repeat(10)), None);
        assert!(scanner.capturing);
    }

    #[test]
    fn test_scenario_confirmation_then_pairing_code() {
        let mut scanner = LoginScanner::new();
        assert_eq!(
            scanner.observe("Session authenticated"),
            Some(LinkEvent::Configuring { phone: None })
        );
        let code_line = format!("2@{}", "A".repeat(60));
        let Some(LinkEvent::QrReady { payload }) = scanner.observe(&code_line) else {
            panic!("expected QrReady");
        };
        assert_eq!(payload.len(), 62);
        assert_eq!(payload, code_line);
    }
}
