//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Banks & buttons

/// Number of configuration banks. Firmware variants shipped with 3 or 4;
/// this build uses 4.
pub const NUM_BANKS: usize = 4;

/// Logical footswitches per bank.
pub const NUM_BUTTONS: usize = 4;

/// Physical id the ladder reports when no button is pressed. Dropped by the
/// dispatch engine before any other handling.
pub const IDLE_BUTTON_ID: u8 = 0;

/// Physical-to-logical remap, indexed by `physical_id - 1`.
///
/// The footswitch PCB is wired mirror-imaged relative to the ladder taps, so
/// physical 1 is the rightmost switch. This table encodes that orientation;
/// do not replace it with arithmetic.
pub const BUTTON_REMAP: [usize; NUM_BUTTONS] = [3, 2, 1, 0];

/// Long-press on this logical button steps to the previous bank.
pub const PREV_BANK_BUTTON: usize = 0;
/// Long-press on this logical button steps to the next bank.
pub const NEXT_BANK_BUTTON: usize = 3;
/// Long-press on this logical button opens the settings menu.
pub const MENU_BUTTON: usize = 1;

// Menu navigation (logical button roles while the menu is active)

pub const MENU_NAV_UP: usize = 0;
pub const MENU_NAV_DOWN: usize = 1;
pub const MENU_NAV_SELECT: usize = 2;
pub const MENU_NAV_BACK: usize = 3;

/// Step applied to the brightness menu item per select.
pub const BRIGHTNESS_STEP: u8 = 32;

// Ladder input

/// SAADC thresholds (12-bit counts) separating the ladder taps. A sample maps
/// to the first level it does not exceed; the last entry is the open-circuit
/// rest level.
pub const LADDER_LEVELS: [u16; NUM_BUTTONS + 1] = [
    800,  /* short to ground */
    1800, /* 4.7 kohm */
    2800, /* 10 kohm */
    3800, /* 47 kohm */
    4095, /* open circuit */
];

/// Ladder sampling period (ms).
pub const LADDER_POLL_MS: u64 = 5;

/// Debounce time before a ladder level change is accepted (ms).
pub const DEBOUNCE_MS: u64 = 20;

/// Hold time that turns a press into a long-press (ms).
pub const LONG_PRESS_MS: u64 = 1000;

/// Maximum press duration still reported as a click (ms).
pub const CLICK_MAX_MS: u64 = 300;

/// Maximum gap between two clicks reported as a double-click (ms).
pub const DOUBLE_CLICK_GAP_MS: u64 = 400;

// MIDI

/// Default Note-On velocity for factory configs.
pub const DEFAULT_VELOCITY: u8 = 127;

/// Release velocity used for momentary Note-Off.
pub const RELEASE_VELOCITY: u8 = 0x40;

/// Factory default channel.
pub const DEFAULT_CHANNEL: u8 = 1;

/// Factory default note for bank 0 button 0 (middle C); banks step by 4.
pub const DEFAULT_NOTE_BASE: u8 = 60;

// Display

/// Lifetime of a transient status message (ms), checked once per loop.
pub const STATUS_MESSAGE_MS: u64 = 2000;

/// Main-loop housekeeping tick (ms); bounds how late a status message can
/// be cleared.
pub const STATUS_TICK_MS: u64 = 50;

/// Default OLED brightness (contrast) value.
pub const DEFAULT_BRIGHTNESS: u8 = 255;

// USB

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0002;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "pedalboard";
pub const USB_PRODUCT: &str = "MIDI Pedalboard";
pub const USB_SERIAL_NUMBER: &str = "000001";

// BLE

/// GAP device name advertised by the configuration service.
pub const BLE_DEVICE_NAME: &str = "MIDI Pedalboard Config";

// Configuration storage

/// Persisted record layout version. Bump whenever the encoded `ButtonConfig`
/// shape changes; the version is baked into the init-marker key so an
/// old-layout image can never be misread as the current one.
pub const SCHEMA_VERSION: u8 = 3;

/// Flash page index where the config store starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for the config store.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
