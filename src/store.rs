//! Bank/configuration store.
//!
//! Holds `NUM_BANKS` banks of four `ButtonConfig` records plus the active
//! bank pointer. This is the in-memory half; write-through flash persistence
//! lives in `storage.rs` (embedded builds) and works on the fixed 6-byte
//! record encoding defined here, which doubles as the per-button block of the
//! remote snapshot payload.
//!
//! Every accessor is total: out-of-range coordinates yield a safe disabled
//! default or are silently ignored, never a panic. A stray byte from a remote
//! client must not be able to corrupt live state.

use crate::config::{
    DEFAULT_CHANNEL, DEFAULT_NOTE_BASE, DEFAULT_VELOCITY, NUM_BANKS, NUM_BUTTONS,
};
use crate::midi::{clamp_channel, clamp_data};

/// Press behavior of a footswitch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonMode {
    Momentary = 0,
    Toggle = 1,
}

impl ButtonMode {
    /// Decode from a stored/wire byte. Unknown values fall back to Momentary.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ButtonMode::Toggle,
            _ => ButtonMode::Momentary,
        }
    }
}

/// Kind of MIDI message a button emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiKind {
    Note = 0,
    ControlChange = 1,
    ProgramChange = 2,
}

impl MidiKind {
    /// Decode from a stored/wire byte. Unknown values fall back to Note.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => MidiKind::ControlChange,
            2 => MidiKind::ProgramChange,
            _ => MidiKind::Note,
        }
    }
}

/// Configuration of one logical button in one bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    pub mode: ButtonMode,
    pub kind: MidiKind,
    /// Note number or controller number (0-127).
    pub value: u8,
    /// MIDI channel (1-16).
    pub channel: u8,
    /// Note-On velocity (0-127). Ignored for CC/PC.
    pub velocity: u8,
    /// Disabled buttons produce UI feedback only, no MIDI output.
    pub enabled: bool,
}

impl ButtonConfig {
    /// Length of the encoded record:
    /// `[mode, kind, value, channel, velocity, enabled]`.
    pub const ENCODED_LEN: usize = 6;

    /// The safe record returned for out-of-range lookups.
    pub const fn disabled_default() -> Self {
        Self {
            mode: ButtonMode::Momentary,
            kind: MidiKind::Note,
            value: 0,
            channel: DEFAULT_CHANNEL,
            velocity: DEFAULT_VELOCITY,
            enabled: false,
        }
    }

    /// Copy with all fields clamped to valid MIDI ranges.
    pub fn clamped(self) -> Self {
        Self {
            value: clamp_data(self.value),
            channel: clamp_channel(self.channel),
            velocity: clamp_data(self.velocity),
            ..self
        }
    }

    /// Serialise into a byte slice. Returns the number of bytes written
    /// (0 when the buffer is too small).
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        if buf.len() < Self::ENCODED_LEN {
            return 0;
        }
        buf[0] = self.mode as u8;
        buf[1] = self.kind as u8;
        buf[2] = self.value;
        buf[3] = self.channel;
        buf[4] = self.velocity;
        buf[5] = self.enabled as u8;
        Self::ENCODED_LEN
    }

    /// Deserialise from a stored record, clamping on the way in.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::ENCODED_LEN {
            return None;
        }
        Some(
            Self {
                mode: ButtonMode::from_u8(data[0]),
                kind: MidiKind::from_u8(data[1]),
                value: data[2],
                channel: data[3],
                velocity: data[4],
                enabled: data[5] != 0,
            }
            .clamped(),
        )
    }
}

/// In-memory bank table plus the active bank pointer.
pub struct ConfigStore {
    banks: [[ButtonConfig; NUM_BUTTONS]; NUM_BANKS],
    current_bank: u8,
}

impl ConfigStore {
    /// Factory defaults: momentary notes stepping up from middle C, four per
    /// bank, channel 1, full velocity, enabled.
    pub fn with_defaults() -> Self {
        let mut banks = [[ButtonConfig::disabled_default(); NUM_BUTTONS]; NUM_BANKS];
        for (b, bank) in banks.iter_mut().enumerate() {
            for (i, slot) in bank.iter_mut().enumerate() {
                *slot = Self::default_for(b, i);
            }
        }
        Self {
            banks,
            current_bank: 0,
        }
    }

    /// Factory default for a single slot (also the fallback for a slot that
    /// fails to load from flash).
    pub fn default_for(bank: usize, index: usize) -> ButtonConfig {
        ButtonConfig {
            mode: ButtonMode::Momentary,
            kind: MidiKind::Note,
            value: clamp_data(DEFAULT_NOTE_BASE + (bank * NUM_BUTTONS + index) as u8),
            channel: DEFAULT_CHANNEL,
            velocity: DEFAULT_VELOCITY,
            enabled: true,
        }
    }

    /// Defensive copy of one slot. Out-of-range coordinates return the
    /// disabled default.
    pub fn get(&self, bank: usize, index: usize) -> ButtonConfig {
        if bank >= NUM_BANKS || index >= NUM_BUTTONS {
            return ButtonConfig::disabled_default();
        }
        self.banks[bank][index]
    }

    /// Clamp and write one slot. Returns the clamped record so the caller can
    /// persist exactly what was stored, or `None` when the coordinates are
    /// out of range (the write is ignored).
    pub fn set(&mut self, bank: usize, index: usize, config: ButtonConfig) -> Option<ButtonConfig> {
        if bank >= NUM_BANKS || index >= NUM_BUTTONS {
            return None;
        }
        let clamped = config.clamped();
        self.banks[bank][index] = clamped;
        Some(clamped)
    }

    pub fn current_bank(&self) -> u8 {
        self.current_bank
    }

    /// Select a bank. Out-of-range values are silently ignored so a stray
    /// remote byte cannot corrupt the active bank. Returns whether the bank
    /// actually changed.
    pub fn set_current_bank(&mut self, bank: u8) -> bool {
        if (bank as usize) < NUM_BANKS && bank != self.current_bank {
            self.current_bank = bank;
            true
        } else {
            false
        }
    }

    /// Advance to the next bank, wrapping.
    pub fn next_bank(&mut self) -> u8 {
        self.current_bank = (self.current_bank + 1) % NUM_BANKS as u8;
        self.current_bank
    }

    /// Step to the previous bank, wrapping.
    pub fn prev_bank(&mut self) -> u8 {
        self.current_bank = (self.current_bank + NUM_BANKS as u8 - 1) % NUM_BANKS as u8;
        self.current_bank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NUM_BANKS;

    #[test]
    fn defaults_step_up_from_middle_c() {
        let store = ConfigStore::with_defaults();
        assert_eq!(store.get(0, 0).value, 60);
        assert_eq!(store.get(0, 3).value, 63);
        assert_eq!(store.get(1, 0).value, 64);
        assert_eq!(store.get(3, 3).value, 75);
        assert!(store.get(0, 0).enabled);
        assert_eq!(store.get(0, 0).mode, ButtonMode::Momentary);
    }

    #[test]
    fn out_of_range_get_returns_disabled_default() {
        let store = ConfigStore::with_defaults();
        let cfg = store.get(0, 7);
        assert!(!cfg.enabled);
        let cfg = store.get(NUM_BANKS, 0);
        assert!(!cfg.enabled);
    }

    #[test]
    fn set_clamps_all_fields() {
        let mut store = ConfigStore::with_defaults();
        let written = store
            .set(
                1,
                2,
                ButtonConfig {
                    mode: ButtonMode::Toggle,
                    kind: MidiKind::ControlChange,
                    value: 200,
                    channel: 0,
                    velocity: 255,
                    enabled: true,
                },
            )
            .unwrap();
        assert_eq!(written.value, 127);
        assert_eq!(written.channel, 1);
        assert_eq!(written.velocity, 127);
        assert_eq!(store.get(1, 2), written);
    }

    #[test]
    fn set_out_of_range_is_ignored() {
        let mut store = ConfigStore::with_defaults();
        let before = store.get(0, 0);
        assert!(store.set(0, 9, before).is_none());
        assert!(store.set(9, 0, before).is_none());
        assert_eq!(store.get(0, 0), before);
    }

    #[test]
    fn set_current_bank_is_bounds_idempotent() {
        let mut store = ConfigStore::with_defaults();
        for n in 0..=255u8 {
            let before = store.current_bank();
            let changed = store.set_current_bank(n);
            if (n as usize) < NUM_BANKS {
                assert_eq!(store.current_bank(), n);
                assert_eq!(changed, n != before);
            } else {
                assert_eq!(store.current_bank(), before);
                assert!(!changed);
            }
        }
    }

    #[test]
    fn bank_stepping_wraps() {
        let mut store = ConfigStore::with_defaults();
        assert_eq!(store.prev_bank(), NUM_BANKS as u8 - 1);
        assert_eq!(store.next_bank(), 0);
        for _ in 0..NUM_BANKS {
            store.next_bank();
        }
        assert_eq!(store.current_bank(), 0);
    }

    #[test]
    fn record_roundtrip() {
        let cfg = ButtonConfig {
            mode: ButtonMode::Toggle,
            kind: MidiKind::ProgramChange,
            value: 12,
            channel: 16,
            velocity: 100,
            enabled: true,
        };
        let mut buf = [0u8; ButtonConfig::ENCODED_LEN];
        assert_eq!(cfg.encode(&mut buf), ButtonConfig::ENCODED_LEN);
        assert_eq!(buf, [1, 2, 12, 16, 100, 1]);
        assert_eq!(ButtonConfig::decode(&buf), Some(cfg));
    }

    #[test]
    fn decode_rejects_short_records() {
        assert!(ButtonConfig::decode(&[]).is_none());
        assert!(ButtonConfig::decode(&[1, 0, 60, 1, 127]).is_none());
    }

    #[test]
    fn decode_clamps_and_defaults_unknown_discriminants() {
        let cfg = ButtonConfig::decode(&[9, 9, 200, 99, 200, 1]).unwrap();
        assert_eq!(cfg.mode, ButtonMode::Momentary);
        assert_eq!(cfg.kind, MidiKind::Note);
        assert_eq!(cfg.value, 127);
        assert_eq!(cfg.channel, 16);
        assert_eq!(cfg.velocity, 127);
    }

    #[test]
    fn encode_fails_gracefully_on_small_buffer() {
        let cfg = ButtonConfig::disabled_default();
        let mut buf = [0u8; 3];
        assert_eq!(cfg.encode(&mut buf), 0);
    }

    #[test]
    fn roundtrip_survives_simulated_persistence_reload() {
        let mut store = ConfigStore::with_defaults();
        let cfg = ButtonConfig {
            mode: ButtonMode::Toggle,
            kind: MidiKind::ControlChange,
            value: 20,
            channel: 5,
            velocity: 90,
            enabled: true,
        };
        store.set(2, 1, cfg);
        store.set_current_bank(2);

        // Simulate a power cycle: encode every slot, rebuild from records.
        let mut reloaded = ConfigStore::with_defaults();
        for bank in 0..NUM_BANKS {
            for index in 0..crate::config::NUM_BUTTONS {
                let mut buf = [0u8; ButtonConfig::ENCODED_LEN];
                store.get(bank, index).encode(&mut buf);
                reloaded.set(bank, index, ButtonConfig::decode(&buf).unwrap());
            }
        }
        reloaded.set_current_bank(store.current_bank());

        assert_eq!(reloaded.get(2, 1), cfg);
        assert_eq!(reloaded.current_bank(), 2);
    }
}
