//! Outbound MIDI messages and their USB-MIDI event packet encoding.
//!
//! Channels are carried in their human form (1-16) and converted to the
//! zero-based wire nibble only at encode time. Data bytes are expected to be
//! clamped to 0-127 by the configuration store before they get here.

/// Highest legal value for MIDI data bytes (notes, controllers, velocities).
pub const MIDI_VALUE_MAX: u8 = 127;

/// MIDI channel range (human numbering).
pub const CHANNEL_MIN: u8 = 1;
pub const CHANNEL_MAX: u8 = 16;

/// Size of a USB-MIDI event packet.
pub const USB_MIDI_PACKET_SIZE: usize = 4;

/// Clamp a data byte to the 7-bit MIDI range.
pub fn clamp_data(value: u8) -> u8 {
    value.min(MIDI_VALUE_MAX)
}

/// Clamp a channel to 1-16.
pub fn clamp_channel(channel: u8) -> u8 {
    channel.clamp(CHANNEL_MIN, CHANNEL_MAX)
}

/// An outbound MIDI message produced by the dispatch engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiMessage {
    /// Encode as a 4-byte USB-MIDI event packet on cable 0.
    ///
    /// Byte 0 is the cable number (high nibble) plus the Code Index Number,
    /// which for the channel voice messages we emit equals the status high
    /// nibble. Program Change is a 2-byte message; its unused data byte is 0.
    pub fn to_usb_packet(&self) -> [u8; USB_MIDI_PACKET_SIZE] {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => [0x09, 0x90 | wire_channel(channel), note, velocity],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => [0x08, 0x80 | wire_channel(channel), note, velocity],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => [0x0B, 0xB0 | wire_channel(channel), controller, value],
            MidiMessage::ProgramChange { channel, program } => {
                [0x0C, 0xC0 | wire_channel(channel), program, 0]
            }
        }
    }
}

fn wire_channel(channel: u8) -> u8 {
    clamp_channel(channel) - 1
}
