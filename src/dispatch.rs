//! Dispatch engine: button events in, MIDI/display effects out.
//!
//! One event stream, three mutually exclusive handling modes evaluated in a
//! fixed precedence order per incoming (physical id, event):
//!
//! 1. the ladder idle sentinel is dropped;
//! 2. an active menu owns the event exclusively;
//! 3. a long-press on the menu button opens the menu;
//! 4. long-presses on the outer buttons step the bank (wrapping);
//! 5. otherwise the event is resolved against the button's configuration in
//!    the current bank (toggle or momentary handling).
//!
//! The engine never touches hardware: it returns a bounded list of `Effect`s
//! which the main loop drains into the MIDI transport and the display. That
//! keeps the whole state machine host-testable.

use crate::config::{
    BUTTON_REMAP, IDLE_BUTTON_ID, MENU_BUTTON, NEXT_BANK_BUTTON, NUM_BUTTONS, PREV_BANK_BUTTON,
    RELEASE_VELOCITY,
};
use crate::input::ButtonEvent;
use crate::menu::{Menu, MenuOutcome, Settings};
use crate::midi::MidiMessage;
use crate::store::{ButtonConfig, ButtonMode, ConfigStore, MidiKind};
use core::fmt::Write;
use heapless::{String, Vec};

/// Transient status line content.
pub type StatusText = String<20>;

/// Side effects requested by the engine, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Send a MIDI message.
    Midi(MidiMessage),
    /// Draw one button box in the given state.
    ButtonVisual {
        index: usize,
        lit: bool,
        mode: ButtonMode,
    },
    /// Update the bank label line.
    BankLabel(u8),
    /// Show a transient status message.
    Status(StatusText),
    /// Redraw the menu overlay from current menu state.
    MenuRender,
    /// Restore the full main screen from the store.
    MainRedraw,
}

/// A bank change emits 4 visuals + label + status; leave headroom.
pub type Effects = Vec<Effect, 8>;

/// Message recorded on a momentary press so the matching Note-Off goes out on
/// release even if the configuration is edited in between.
#[derive(Clone, Copy, Debug)]
struct ActiveNote {
    value: u8,
    channel: u8,
    kind: MidiKind,
}

pub struct Engine {
    toggles: [bool; NUM_BUTTONS],
    active_notes: [Option<ActiveNote>; NUM_BUTTONS],
    pub menu: Menu,
    pub settings: Settings,
}

impl Engine {
    pub const fn new() -> Self {
        Self {
            toggles: [false; NUM_BUTTONS],
            active_notes: [None; NUM_BUTTONS],
            menu: Menu::new(),
            settings: Settings::new(),
        }
    }

    /// Current toggle state of a logical button (off for bad indices).
    pub fn toggle_state(&self, index: usize) -> bool {
        self.toggles.get(index).copied().unwrap_or(false)
    }

    /// Feed one debounced input event through the precedence chain.
    pub fn handle_event(
        &mut self,
        physical_id: u8,
        event: ButtonEvent,
        store: &mut ConfigStore,
    ) -> Effects {
        let mut effects = Effects::new();

        // Ladder rest level and anything outside the wired range.
        if physical_id == IDLE_BUTTON_ID {
            return effects;
        }
        let slot = (physical_id - 1) as usize;
        if slot >= NUM_BUTTONS {
            return effects;
        }
        let logical_id = BUTTON_REMAP[slot];

        // While the menu owns input, nothing else runs.
        if self.menu.is_active() {
            self.handle_menu_event(logical_id, event, store, &mut effects);
            return effects;
        }

        if event == ButtonEvent::LongPressed {
            if logical_id == MENU_BUTTON {
                // Every release that arrives while the menu is active is
                // consumed by it, including the one ending this hold. Close
                // out any sounding momentary notes now or they stick.
                self.flush_active_notes(&mut effects);
                self.menu.open();
                let _ = effects.push(Effect::MenuRender);
                return effects;
            }
            if logical_id == PREV_BANK_BUTTON {
                store.prev_bank();
                self.emit_bank_change(store, &mut effects);
                return effects;
            }
            if logical_id == NEXT_BANK_BUTTON {
                store.next_bank();
                self.emit_bank_change(store, &mut effects);
                return effects;
            }
        }

        let config = store.get(store.current_bank() as usize, logical_id);
        match config.mode {
            ButtonMode::Toggle => self.handle_toggle(logical_id, event, &config, &mut effects),
            ButtonMode::Momentary => {
                self.handle_momentary(logical_id, event, &config, &mut effects)
            }
        }
        effects
    }

    /// Refresh effects after a remote write to one button of the current bank.
    pub fn after_remote_button_write(&self, index: usize, store: &ConfigStore) -> Effects {
        let mut effects = Effects::new();
        let config = store.get(store.current_bank() as usize, index);
        let _ = effects.push(Effect::ButtonVisual {
            index,
            lit: self.toggle_state(index),
            mode: config.mode,
        });
        let mut text = StatusText::new();
        let _ = write!(text, "Btn {} updated", index + 1);
        let _ = effects.push(Effect::Status(text));
        effects
    }

    /// Refresh effects after a remote bank switch (only called when the bank
    /// actually changed).
    pub fn after_remote_bank_set(&mut self, store: &ConfigStore) -> Effects {
        let mut effects = Effects::new();
        self.emit_bank_change(store, &mut effects);
        effects
    }

    fn handle_menu_event(
        &mut self,
        logical_id: usize,
        event: ButtonEvent,
        store: &mut ConfigStore,
        effects: &mut Effects,
    ) {
        match self
            .menu
            .handle_button(logical_id, event, &mut self.settings, store)
        {
            MenuOutcome::None => {}
            MenuOutcome::Redraw => {
                let _ = effects.push(Effect::MenuRender);
            }
            MenuOutcome::BankChanged => {
                // The toggle-reset invariant covers menu-driven changes too.
                self.toggles = [false; NUM_BUTTONS];
                let _ = effects.push(Effect::BankLabel(store.current_bank()));
                let _ = effects.push(Effect::MenuRender);
            }
            MenuOutcome::Closed => {
                let _ = effects.push(Effect::MainRedraw);
            }
        }
    }

    /// Bank changed: clear toggle state, redraw everything bank-related.
    ///
    /// Deliberately does not flush Note-Offs for toggles that were on; see
    /// DESIGN.md.
    fn emit_bank_change(&mut self, store: &ConfigStore, effects: &mut Effects) {
        self.toggles = [false; NUM_BUTTONS];
        let bank = store.current_bank();
        for index in 0..NUM_BUTTONS {
            let config = store.get(bank as usize, index);
            let _ = effects.push(Effect::ButtonVisual {
                index,
                lit: false,
                mode: config.mode,
            });
        }
        let _ = effects.push(Effect::BankLabel(bank));
        let mut text = StatusText::new();
        let _ = write!(text, "Bank {}", bank + 1);
        let _ = effects.push(Effect::Status(text));
    }

    /// Emit Note-Offs for every momentary note still sounding and forget
    /// them. Uses the press-time record, same as the normal release path.
    fn flush_active_notes(&mut self, effects: &mut Effects) {
        for slot in self.active_notes.iter_mut() {
            if let Some(note) = slot.take() {
                if note.kind == MidiKind::Note {
                    let _ = effects.push(Effect::Midi(MidiMessage::NoteOff {
                        channel: note.channel,
                        note: note.value,
                        velocity: RELEASE_VELOCITY,
                    }));
                }
            }
        }
    }

    fn handle_toggle(
        &mut self,
        logical_id: usize,
        event: ButtonEvent,
        config: &ButtonConfig,
        effects: &mut Effects,
    ) {
        if event != ButtonEvent::Pressed {
            return;
        }
        self.toggles[logical_id] = !self.toggles[logical_id];
        let on = self.toggles[logical_id];
        let _ = effects.push(Effect::ButtonVisual {
            index: logical_id,
            lit: on,
            mode: config.mode,
        });
        if !config.enabled {
            return;
        }

        let mut text = StatusText::new();
        match config.kind {
            MidiKind::Note => {
                let message = if on {
                    MidiMessage::NoteOn {
                        channel: config.channel,
                        note: config.value,
                        velocity: config.velocity,
                    }
                } else {
                    MidiMessage::NoteOff {
                        channel: config.channel,
                        note: config.value,
                        velocity: config.velocity,
                    }
                };
                let _ = effects.push(Effect::Midi(message));
                let _ = write!(text, "Note {} {}", if on { "ON" } else { "OFF" }, config.value);
            }
            MidiKind::ControlChange => {
                let value = if on { 127 } else { 0 };
                let _ = effects.push(Effect::Midi(MidiMessage::ControlChange {
                    channel: config.channel,
                    controller: config.value,
                    value,
                }));
                let _ = write!(text, "CC {}: {}", config.value, value);
            }
            MidiKind::ProgramChange => {
                // PC has no natural "off"; send only on the on-transition.
                if !on {
                    return;
                }
                let _ = effects.push(Effect::Midi(MidiMessage::ProgramChange {
                    channel: config.channel,
                    program: config.value,
                }));
                let _ = write!(text, "PC {}", config.value);
            }
        }
        let _ = effects.push(Effect::Status(text));
    }

    fn handle_momentary(
        &mut self,
        logical_id: usize,
        event: ButtonEvent,
        config: &ButtonConfig,
        effects: &mut Effects,
    ) {
        match event {
            ButtonEvent::Pressed => {
                let _ = effects.push(Effect::ButtonVisual {
                    index: logical_id,
                    lit: true,
                    mode: config.mode,
                });
                if !config.enabled {
                    return;
                }
                self.active_notes[logical_id] = Some(ActiveNote {
                    value: config.value,
                    channel: config.channel,
                    kind: config.kind,
                });

                let mut text = StatusText::new();
                match config.kind {
                    MidiKind::Note => {
                        let _ = effects.push(Effect::Midi(MidiMessage::NoteOn {
                            channel: config.channel,
                            note: config.value,
                            velocity: config.velocity,
                        }));
                        let _ = write!(text, "Note {}", config.value);
                    }
                    MidiKind::ControlChange => {
                        let _ = effects.push(Effect::Midi(MidiMessage::ControlChange {
                            channel: config.channel,
                            controller: config.value,
                            value: 127,
                        }));
                        let _ = write!(text, "CC {}", config.value);
                    }
                    MidiKind::ProgramChange => {
                        let _ = effects.push(Effect::Midi(MidiMessage::ProgramChange {
                            channel: config.channel,
                            program: config.value,
                        }));
                        let _ = write!(text, "PC {}", config.value);
                    }
                }
                let _ = effects.push(Effect::Status(text));
            }
            ButtonEvent::Released => {
                let _ = effects.push(Effect::ButtonVisual {
                    index: logical_id,
                    lit: false,
                    mode: config.mode,
                });
                // Close out what was actually started, not what the config
                // says now.
                if let Some(note) = self.active_notes[logical_id].take() {
                    if note.kind == MidiKind::Note {
                        let _ = effects.push(Effect::Midi(MidiMessage::NoteOff {
                            channel: note.channel,
                            note: note.value,
                            velocity: RELEASE_VELOCITY,
                        }));
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NUM_BANKS;

    /// Physical id whose remap lands on the given logical button.
    fn physical_for(logical: usize) -> u8 {
        let slot = BUTTON_REMAP.iter().position(|&l| l == logical).unwrap();
        (slot + 1) as u8
    }

    fn midi_effects(effects: &Effects) -> std::vec::Vec<MidiMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Midi(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    fn toggle_cfg(value: u8, kind: MidiKind) -> ButtonConfig {
        ButtonConfig {
            mode: ButtonMode::Toggle,
            kind,
            value,
            channel: 1,
            velocity: 100,
            enabled: true,
        }
    }

    #[test]
    fn idle_sentinel_and_out_of_range_ids_are_dropped() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        assert!(engine
            .handle_event(IDLE_BUTTON_ID, ButtonEvent::Pressed, &mut store)
            .is_empty());
        assert!(engine
            .handle_event(9, ButtonEvent::Pressed, &mut store)
            .is_empty());
    }

    #[test]
    fn momentary_press_and_release_send_matching_note_pair() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let physical = physical_for(2);
        let config = store.get(0, 2);

        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert_eq!(
            midi_effects(&fx),
            [MidiMessage::NoteOn {
                channel: config.channel,
                note: config.value,
                velocity: config.velocity,
            }]
        );

        let fx = engine.handle_event(physical, ButtonEvent::Released, &mut store);
        assert_eq!(
            midi_effects(&fx),
            [MidiMessage::NoteOff {
                channel: config.channel,
                note: config.value,
                velocity: RELEASE_VELOCITY,
            }]
        );
    }

    #[test]
    fn momentary_release_uses_config_recorded_at_press_time() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let physical = physical_for(1);
        let before = store.get(0, 1);

        engine.handle_event(physical, ButtonEvent::Pressed, &mut store);

        // Remote edit between press and release.
        store.set(
            0,
            1,
            ButtonConfig {
                value: 99,
                channel: 9,
                ..before
            },
        );

        let fx = engine.handle_event(physical, ButtonEvent::Released, &mut store);
        assert_eq!(
            midi_effects(&fx),
            [MidiMessage::NoteOff {
                channel: before.channel,
                note: before.value,
                velocity: RELEASE_VELOCITY,
            }]
        );

        // The note was closed out; a second release sends nothing.
        let fx = engine.handle_event(physical, ButtonEvent::Released, &mut store);
        assert!(midi_effects(&fx).is_empty());
    }

    #[test]
    fn toggle_note_alternates_on_off_on_press_only() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        store.set(0, 0, toggle_cfg(64, MidiKind::Note));
        let physical = physical_for(0);

        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert!(engine.toggle_state(0));
        assert!(matches!(
            midi_effects(&fx)[..],
            [MidiMessage::NoteOn { note: 64, .. }]
        ));

        // Release does nothing in toggle mode.
        let fx = engine.handle_event(physical, ButtonEvent::Released, &mut store);
        assert!(midi_effects(&fx).is_empty());

        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert!(!engine.toggle_state(0));
        assert!(matches!(
            midi_effects(&fx)[..],
            [MidiMessage::NoteOff { note: 64, .. }]
        ));
    }

    #[test]
    fn toggle_cc_sends_127_then_0() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        store.set(0, 2, toggle_cfg(20, MidiKind::ControlChange));
        let physical = physical_for(2);

        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert!(matches!(
            midi_effects(&fx)[..],
            [MidiMessage::ControlChange { value: 127, .. }]
        ));
        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert!(matches!(
            midi_effects(&fx)[..],
            [MidiMessage::ControlChange { value: 0, .. }]
        ));
    }

    #[test]
    fn toggle_pc_fires_only_on_the_on_transition() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        store.set(0, 2, toggle_cfg(5, MidiKind::ProgramChange));
        let physical = physical_for(2);

        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert_eq!(midi_effects(&fx).len(), 1);
        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert!(midi_effects(&fx).is_empty());
    }

    #[test]
    fn disabled_button_gives_feedback_but_no_midi() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let mut cfg = store.get(0, 3);
        cfg.enabled = false;
        store.set(0, 3, cfg);
        let physical = physical_for(3);

        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert!(midi_effects(&fx).is_empty());
        assert!(fx
            .iter()
            .any(|e| matches!(e, Effect::ButtonVisual { index: 3, lit: true, .. })));
    }

    #[test]
    fn long_press_gestures_step_banks_with_wrap() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();

        let fx = engine.handle_event(
            physical_for(NEXT_BANK_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        assert_eq!(store.current_bank(), 1);
        assert!(fx.iter().any(|e| matches!(e, Effect::BankLabel(1))));

        engine.handle_event(
            physical_for(PREV_BANK_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        assert_eq!(store.current_bank(), 0);

        engine.handle_event(
            physical_for(PREV_BANK_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        assert_eq!(store.current_bank(), NUM_BANKS as u8 - 1);
    }

    #[test]
    fn bank_change_resets_all_toggle_state() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        store.set(0, 1, toggle_cfg(30, MidiKind::Note));
        store.set(0, 2, toggle_cfg(31, MidiKind::Note));

        engine.handle_event(physical_for(1), ButtonEvent::Pressed, &mut store);
        engine.handle_event(physical_for(2), ButtonEvent::Pressed, &mut store);
        assert!(engine.toggle_state(1) && engine.toggle_state(2));

        engine.handle_event(
            physical_for(NEXT_BANK_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        for i in 0..NUM_BUTTONS {
            assert!(!engine.toggle_state(i));
        }
    }

    #[test]
    fn bank_change_redraws_all_buttons_off() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let fx = engine.handle_event(
            physical_for(NEXT_BANK_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        let visuals: std::vec::Vec<_> = fx
            .iter()
            .filter(|e| matches!(e, Effect::ButtonVisual { lit: false, .. }))
            .collect();
        assert_eq!(visuals.len(), NUM_BUTTONS);
        assert!(fx.iter().any(|e| matches!(e, Effect::Status(_))));
    }

    #[test]
    fn long_press_on_menu_button_opens_menu() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let fx = engine.handle_event(
            physical_for(MENU_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        assert!(engine.menu.is_active());
        assert_eq!(fx.as_slice(), [Effect::MenuRender]);
    }

    #[test]
    fn active_menu_suppresses_all_midi_and_non_menu_mutation() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        engine.handle_event(
            physical_for(MENU_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );

        let snapshot_before = crate::remote::encode_snapshot(&store);
        for physical in 1..=NUM_BUTTONS as u8 {
            for event in [
                ButtonEvent::Pressed,
                ButtonEvent::Released,
                ButtonEvent::Clicked,
                ButtonEvent::DoubleClicked,
                ButtonEvent::LongPressed,
            ] {
                // Skip the select/bank navigation paths that are legitimate
                // menu-item actions.
                if event == ButtonEvent::Pressed {
                    continue;
                }
                let fx = engine.handle_event(physical, event, &mut store);
                assert!(midi_effects(&fx).is_empty());
            }
        }
        assert_eq!(crate::remote::encode_snapshot(&store), snapshot_before);
        assert!(engine.menu.is_active());

        // Pressed events act on the menu, never on MIDI. The back-mapped
        // button closes it, so reopen before continuing.
        for physical in 1..=NUM_BUTTONS as u8 {
            let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
            assert!(midi_effects(&fx).is_empty());
            if !engine.menu.is_active() {
                engine.handle_event(
                    physical_for(MENU_BUTTON),
                    ButtonEvent::LongPressed,
                    &mut store,
                );
            }
        }
    }

    #[test]
    fn opening_menu_closes_the_note_started_by_the_hold() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let physical = physical_for(MENU_BUTTON);
        let config = store.get(0, MENU_BUTTON);

        // The hold that opens the menu begins with an ordinary press, which
        // on the momentary default starts a note.
        let fx = engine.handle_event(physical, ButtonEvent::Pressed, &mut store);
        assert_eq!(
            midi_effects(&fx),
            [MidiMessage::NoteOn {
                channel: config.channel,
                note: config.value,
                velocity: config.velocity,
            }]
        );

        // Crossing the long-press threshold opens the menu and must close
        // that note out, since its release will land in the menu.
        let fx = engine.handle_event(physical, ButtonEvent::LongPressed, &mut store);
        assert!(engine.menu.is_active());
        assert_eq!(
            midi_effects(&fx),
            [MidiMessage::NoteOff {
                channel: config.channel,
                note: config.value,
                velocity: RELEASE_VELOCITY,
            }]
        );

        // The release ending the hold is consumed by the menu: no MIDI, and
        // no stale record left behind.
        let fx = engine.handle_event(physical, ButtonEvent::Released, &mut store);
        assert!(midi_effects(&fx).is_empty());
    }

    #[test]
    fn opening_menu_closes_notes_held_on_other_buttons() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        let held = store.get(0, 2);

        engine.handle_event(physical_for(2), ButtonEvent::Pressed, &mut store);
        let fx = engine.handle_event(
            physical_for(MENU_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );
        assert!(engine.menu.is_active());
        assert!(midi_effects(&fx).contains(&MidiMessage::NoteOff {
            channel: held.channel,
            note: held.value,
            velocity: RELEASE_VELOCITY,
        }));

        // Already closed out: the release that arrives after the menu is
        // dismissed sends nothing.
        engine.handle_event(
            physical_for(crate::config::MENU_NAV_BACK),
            ButtonEvent::Pressed,
            &mut store,
        );
        assert!(!engine.menu.is_active());
        let fx = engine.handle_event(physical_for(2), ButtonEvent::Released, &mut store);
        assert!(midi_effects(&fx).is_empty());
    }

    #[test]
    fn closing_menu_restores_main_screen() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        engine.handle_event(
            physical_for(MENU_BUTTON),
            ButtonEvent::LongPressed,
            &mut store,
        );

        let fx = engine.handle_event(
            physical_for(crate::config::MENU_NAV_BACK),
            ButtonEvent::Pressed,
            &mut store,
        );
        assert!(!engine.menu.is_active());
        assert_eq!(fx.as_slice(), [Effect::MainRedraw]);
    }

    #[test]
    fn remote_bank_set_resets_toggles_and_redraws() {
        let mut engine = Engine::new();
        let mut store = ConfigStore::with_defaults();
        store.set(0, 0, toggle_cfg(40, MidiKind::Note));
        engine.handle_event(physical_for(0), ButtonEvent::Pressed, &mut store);
        assert!(engine.toggle_state(0));

        assert!(store.set_current_bank(2));
        let fx = engine.after_remote_bank_set(&store);
        assert!(!engine.toggle_state(0));
        assert!(fx.iter().any(|e| matches!(e, Effect::BankLabel(2))));
    }
}
