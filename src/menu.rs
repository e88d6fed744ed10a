//! Modal settings menu.
//!
//! A small overlay state machine entered via a long-press gesture. While it
//! is active it owns all button input (the dispatch engine forwards events
//! here exclusively). The item list is a fixed static table: bank selector,
//! BLE enable toggle, display brightness, exit.

use crate::config::{
    BRIGHTNESS_STEP, DEFAULT_BRIGHTNESS, MENU_NAV_BACK, MENU_NAV_DOWN, MENU_NAV_SELECT,
    MENU_NAV_UP,
};
use crate::input::ButtonEvent;
use crate::store::ConfigStore;
use core::fmt::Write;
use heapless::String;

/// Global settings edited through the menu. Not persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub ble_enabled: bool,
    pub brightness: u8,
}

impl Settings {
    pub const fn new() -> Self {
        Self {
            ble_enabled: true,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// What selecting an item does.
#[derive(Clone, Copy)]
pub enum ItemKind {
    /// Advance the active bank (wraps).
    BankSelect,
    /// Flip `Settings::ble_enabled`.
    BleToggle,
    /// Step a numeric setting, wrapping past `max` back to `min`.
    Brightness { min: u8, max: u8, step: u8 },
    /// Leave the menu.
    Exit,
}

pub struct MenuItem {
    pub label: &'static str,
    pub kind: ItemKind,
}

/// The fixed item table. Not user-extensible.
pub const MENU_ITEMS: [MenuItem; 4] = [
    MenuItem {
        label: "Bank",
        kind: ItemKind::BankSelect,
    },
    MenuItem {
        label: "BLE",
        kind: ItemKind::BleToggle,
    },
    MenuItem {
        label: "Brightness",
        kind: ItemKind::Brightness {
            min: 0,
            max: 255,
            step: BRIGHTNESS_STEP,
        },
    },
    MenuItem {
        label: "Exit",
        kind: ItemKind::Exit,
    },
];

/// Result of feeding a button event into the active menu, for the dispatch
/// engine to translate into effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Nothing happened (wrong event type, menu inactive).
    None,
    /// Navigation or a value edit; the menu needs a redraw.
    Redraw,
    /// The bank selector fired and the active bank moved.
    BankChanged,
    /// The menu closed; the main screen must be restored.
    Closed,
}

pub struct Menu {
    active: bool,
    selected: usize,
}

impl Menu {
    pub const fn new() -> Self {
        Self {
            active: false,
            selected: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn item_count() -> usize {
        MENU_ITEMS.len()
    }

    /// Enter the menu at the first item. The caller renders.
    pub fn open(&mut self) {
        self.active = true;
        self.selected = 0;
    }

    pub fn close(&mut self) {
        self.active = false;
    }

    /// Handle a logical button event while active. Only `Pressed` acts;
    /// everything else is swallowed so no stray release/click leaks back
    /// into MIDI handling.
    pub fn handle_button(
        &mut self,
        logical_id: usize,
        event: ButtonEvent,
        settings: &mut Settings,
        store: &mut ConfigStore,
    ) -> MenuOutcome {
        if !self.active || event != ButtonEvent::Pressed {
            return MenuOutcome::None;
        }
        match logical_id {
            MENU_NAV_UP => {
                self.move_up();
                MenuOutcome::Redraw
            }
            MENU_NAV_DOWN => {
                self.move_down();
                MenuOutcome::Redraw
            }
            MENU_NAV_SELECT => self.select(settings, store),
            MENU_NAV_BACK => {
                self.close();
                MenuOutcome::Closed
            }
            _ => MenuOutcome::None,
        }
    }

    fn move_up(&mut self) {
        self.selected = if self.selected == 0 {
            MENU_ITEMS.len() - 1
        } else {
            self.selected - 1
        };
    }

    fn move_down(&mut self) {
        self.selected = (self.selected + 1) % MENU_ITEMS.len();
    }

    fn select(&mut self, settings: &mut Settings, store: &mut ConfigStore) -> MenuOutcome {
        match MENU_ITEMS[self.selected].kind {
            ItemKind::BankSelect => {
                store.next_bank();
                MenuOutcome::BankChanged
            }
            ItemKind::BleToggle => {
                settings.ble_enabled = !settings.ble_enabled;
                MenuOutcome::Redraw
            }
            ItemKind::Brightness { min, max, step } => {
                settings.brightness = match settings.brightness.checked_add(step) {
                    Some(next) if next <= max => next,
                    _ => min,
                };
                MenuOutcome::Redraw
            }
            ItemKind::Exit => {
                self.close();
                MenuOutcome::Closed
            }
        }
    }

    /// Value column text for one item row.
    pub fn value_text(index: usize, settings: &Settings, store: &ConfigStore) -> String<8> {
        let mut text = String::new();
        match MENU_ITEMS.get(index).map(|item| &item.kind) {
            Some(ItemKind::BankSelect) => {
                let _ = write!(text, "{}", store.current_bank() + 1);
            }
            Some(ItemKind::BleToggle) => {
                let _ = text.push_str(if settings.ble_enabled { "ON" } else { "OFF" });
            }
            Some(ItemKind::Brightness { .. }) => {
                let _ = write!(text, "{}", settings.brightness);
            }
            _ => {}
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(menu: &mut Menu, id: usize, settings: &mut Settings, store: &mut ConfigStore) -> MenuOutcome {
        menu.handle_button(id, ButtonEvent::Pressed, settings, store)
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut menu = Menu::new();
        let mut settings = Settings::new();
        let mut store = ConfigStore::with_defaults();
        menu.open();
        assert_eq!(menu.selected(), 0);

        pressed(&mut menu, MENU_NAV_UP, &mut settings, &mut store);
        assert_eq!(menu.selected(), Menu::item_count() - 1);

        pressed(&mut menu, MENU_NAV_DOWN, &mut settings, &mut store);
        assert_eq!(menu.selected(), 0);
    }

    #[test]
    fn bank_item_advances_bank_and_reports_it() {
        let mut menu = Menu::new();
        let mut settings = Settings::new();
        let mut store = ConfigStore::with_defaults();
        menu.open();

        let outcome = pressed(&mut menu, MENU_NAV_SELECT, &mut settings, &mut store);
        assert_eq!(outcome, MenuOutcome::BankChanged);
        assert_eq!(store.current_bank(), 1);
        assert!(menu.is_active());
    }

    #[test]
    fn ble_item_toggles_setting() {
        let mut menu = Menu::new();
        let mut settings = Settings::new();
        let mut store = ConfigStore::with_defaults();
        menu.open();
        pressed(&mut menu, MENU_NAV_DOWN, &mut settings, &mut store);

        pressed(&mut menu, MENU_NAV_SELECT, &mut settings, &mut store);
        assert!(!settings.ble_enabled);
        pressed(&mut menu, MENU_NAV_SELECT, &mut settings, &mut store);
        assert!(settings.ble_enabled);
    }

    #[test]
    fn brightness_steps_and_wraps_to_min() {
        let mut menu = Menu::new();
        let mut settings = Settings::new();
        let mut store = ConfigStore::with_defaults();
        menu.open();
        pressed(&mut menu, MENU_NAV_DOWN, &mut settings, &mut store);
        pressed(&mut menu, MENU_NAV_DOWN, &mut settings, &mut store);

        // 255 is already at max, so the first step wraps to min.
        pressed(&mut menu, MENU_NAV_SELECT, &mut settings, &mut store);
        assert_eq!(settings.brightness, 0);
        pressed(&mut menu, MENU_NAV_SELECT, &mut settings, &mut store);
        assert_eq!(settings.brightness, BRIGHTNESS_STEP);
    }

    #[test]
    fn back_and_exit_close_the_menu() {
        let mut menu = Menu::new();
        let mut settings = Settings::new();
        let mut store = ConfigStore::with_defaults();

        menu.open();
        assert_eq!(
            pressed(&mut menu, MENU_NAV_BACK, &mut settings, &mut store),
            MenuOutcome::Closed
        );
        assert!(!menu.is_active());

        menu.open();
        // Navigate to the Exit item (last) and select it.
        pressed(&mut menu, MENU_NAV_UP, &mut settings, &mut store);
        assert_eq!(
            pressed(&mut menu, MENU_NAV_SELECT, &mut settings, &mut store),
            MenuOutcome::Closed
        );
        assert!(!menu.is_active());
    }

    #[test]
    fn non_press_events_are_swallowed() {
        let mut menu = Menu::new();
        let mut settings = Settings::new();
        let mut store = ConfigStore::with_defaults();
        menu.open();

        for event in [
            ButtonEvent::Released,
            ButtonEvent::Clicked,
            ButtonEvent::DoubleClicked,
            ButtonEvent::LongPressed,
        ] {
            assert_eq!(
                menu.handle_button(MENU_NAV_SELECT, event, &mut settings, &mut store),
                MenuOutcome::None
            );
        }
        assert_eq!(store.current_bank(), 0);
    }

    #[test]
    fn value_column_text() {
        let settings = Settings::new();
        let store = ConfigStore::with_defaults();
        assert_eq!(Menu::value_text(0, &settings, &store).as_str(), "1");
        assert_eq!(Menu::value_text(1, &settings, &store).as_str(), "ON");
        assert_eq!(Menu::value_text(2, &settings, &store).as_str(), "255");
        assert_eq!(Menu::value_text(3, &settings, &store).as_str(), "");
    }
}
