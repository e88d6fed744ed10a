//! Main-screen geometry for the 128x64 OLED.
//!
//! Four button boxes in a centered row, a bank label above them and one
//! status line at the bottom. All coordinates are computed here so the
//! renderer contains no magic numbers.

use crate::config::NUM_BUTTONS;

pub const SCREEN_WIDTH: i32 = 128;
pub const SCREEN_HEIGHT: i32 = 64;

pub const BUTTON_BOX_WIDTH: i32 = 26;
pub const BUTTON_BOX_HEIGHT: i32 = 20;
pub const BUTTON_BOX_GAP: i32 = 6;
pub const BUTTON_ROW_Y: i32 = 26;

/// Baseline of the bank label text.
pub const BANK_LABEL_Y: i32 = 12;

/// Baseline of the transient status line.
pub const STATUS_LINE_Y: i32 = 60;

const ROW_WIDTH: i32 = NUM_BUTTONS as i32 * BUTTON_BOX_WIDTH + (NUM_BUTTONS as i32 - 1) * BUTTON_BOX_GAP;

/// Left edge of one button box, row centered horizontally.
pub fn button_box_x(index: usize) -> i32 {
    let start = (SCREEN_WIDTH - ROW_WIDTH) / 2;
    start + index as i32 * (BUTTON_BOX_WIDTH + BUTTON_BOX_GAP)
}
