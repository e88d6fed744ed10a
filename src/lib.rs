//! MIDI pedalboard firmware library.
//!
//! All control logic (ladder input classification, dispatch, bank store,
//! menu, remote protocol) is pure and lives here so it can be tested on the
//! host with `cargo test --lib`. The hardware glue (SAADC, USB, SoftDevice
//! BLE, OLED, flash) only builds with the `embedded` feature, which the
//! binary enables.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod menu;
pub mod midi;
pub mod remote;
pub mod store;
pub mod ui;

#[cfg(feature = "embedded")]
pub mod ble;
#[cfg(feature = "embedded")]
pub mod storage;
#[cfg(feature = "embedded")]
pub mod usb;
