//! Transient status line with a fixed display lifetime.

use crate::config::STATUS_MESSAGE_MS;
use heapless::String;

/// Holds the current status text and reports, once, when it has expired so
/// the main loop knows to clear the line.
pub struct StatusBanner {
    text: String<20>,
    expires_at: Option<u64>,
}

impl StatusBanner {
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            expires_at: None,
        }
    }

    /// Replace the banner text, truncating to capacity; restarts the
    /// lifetime.
    pub fn set(&mut self, text: &str, now_ms: u64) {
        self.text.clear();
        for ch in text.chars() {
            if self.text.push(ch).is_err() {
                break;
            }
        }
        self.expires_at = Some(now_ms + STATUS_MESSAGE_MS);
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Returns true exactly once when the lifetime has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(at) if now_ms >= at => {
                self.expires_at = None;
                self.text.clear();
                true
            }
            _ => false,
        }
    }
}

impl Default for StatusBanner {
    fn default() -> Self {
        Self::new()
    }
}
