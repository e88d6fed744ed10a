//! User interface subsystem - OLED main screen, menu overlay, status line.
//!
//! Geometry (`layout`) and the transient status banner (`status`) are pure
//! modules so their behavior is testable on the host. The SSD1306 rendering
//! itself lives in `display` and only builds for the embedded target.

pub mod layout;
pub mod status;

#[cfg(feature = "embedded")]
pub mod display;
