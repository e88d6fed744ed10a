//! USB subsystem: class-compliant MIDI device.

pub mod midi_device;
