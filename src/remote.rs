//! Remote configuration protocol.
//!
//! A BLE client writes small binary commands to the command characteristic
//! and reads back a snapshot of the active bank. Parsing is strict: anything
//! malformed or out of range is dropped without touching state, since the
//! radio link is the one untrusted input path into the device.
//!
//! Commands:
//!   `[0x01, index, mode, kind, value, channel, velocity]`
//!       write one button of the active bank (the record is stored enabled);
//!   `[0x02, bank]`
//!       select the active bank.
//!
//! Snapshot: `[bank]` followed by the four 6-byte button records of that
//! bank, 25 bytes total.

use crate::config::NUM_BUTTONS;
use crate::store::{ButtonConfig, ButtonMode, ConfigStore, MidiKind};

/// Command opcodes.
pub const CMD_WRITE_BUTTON: u8 = 0x01;
pub const CMD_SET_BANK: u8 = 0x02;

/// A button write carries the opcode, the index and a 5-byte payload.
pub const WRITE_CMD_LEN: usize = 7;

/// Active-bank snapshot: bank byte plus four encoded button records.
pub const SNAPSHOT_LEN: usize = 1 + NUM_BUTTONS * ButtonConfig::ENCODED_LEN;

/// A validated remote command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    WriteButton { index: usize, config: ButtonConfig },
    SetBank(u8),
}

/// The state change a command produced, so the caller knows what to persist
/// and which display refresh to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// One button of the active bank was written.
    Button(usize),
    /// A bank select was applied; `true` when the bank actually moved.
    Bank(bool),
}

/// Parse one raw characteristic write. Returns `None` for anything that is
/// not a complete, in-range command.
pub fn parse_command(data: &[u8]) -> Option<Command> {
    match data.first()? {
        &CMD_WRITE_BUTTON => {
            if data.len() < WRITE_CMD_LEN {
                return None;
            }
            let index = data[1] as usize;
            if index >= NUM_BUTTONS {
                return None;
            }
            let config = ButtonConfig {
                mode: ButtonMode::from_u8(data[2]),
                kind: MidiKind::from_u8(data[3]),
                value: data[4],
                channel: data[5],
                velocity: data[6],
                enabled: true,
            }
            .clamped();
            Some(Command::WriteButton { index, config })
        }
        &CMD_SET_BANK => {
            let bank = *data.get(1)?;
            Some(Command::SetBank(bank))
        }
        _ => None,
    }
}

/// Apply a parsed command to the store.
pub fn apply_command(command: Command, store: &mut ConfigStore) -> Applied {
    match command {
        Command::WriteButton { index, config } => {
            // The index was validated at parse time.
            store.set(store.current_bank() as usize, index, config);
            Applied::Button(index)
        }
        Command::SetBank(bank) => Applied::Bank(store.set_current_bank(bank)),
    }
}

/// Encode the active bank for the snapshot characteristic.
pub fn encode_snapshot(store: &ConfigStore) -> [u8; SNAPSHOT_LEN] {
    let mut out = [0u8; SNAPSHOT_LEN];
    let bank = store.current_bank();
    out[0] = bank;
    for index in 0..NUM_BUTTONS {
        let offset = 1 + index * ButtonConfig::ENCODED_LEN;
        store
            .get(bank as usize, index)
            .encode(&mut out[offset..offset + ButtonConfig::ENCODED_LEN]);
    }
    out
}
