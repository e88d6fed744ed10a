//! Ladder button input: ADC level classification and event generation.
//!
//! Four footswitches share one analog pin through a resistor ladder. A raw
//! SAADC sample is classified into a physical id (1-4, or the idle sentinel
//! 0 when the pin rests at the open-circuit level), and `LadderDebouncer`
//! turns the debounced id transitions into the semantic events the dispatch
//! engine consumes.
//!
//! The debouncer is a pure, tick-driven state machine so the whole event
//! pipeline is testable on the host; the embedded SAADC task in `main.rs`
//! only samples and feeds it.

use crate::config::{
    CLICK_MAX_MS, DEBOUNCE_MS, DOUBLE_CLICK_GAP_MS, IDLE_BUTTON_ID, LADDER_LEVELS, LONG_PRESS_MS,
    NUM_BUTTONS,
};
use heapless::Vec;

/// Semantic button events, after debouncing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Pressed,
    Released,
    Clicked,
    DoubleClicked,
    LongPressed,
}

/// Events produced by one debouncer tick. A single ladder transition can
/// yield at most Released + Clicked/DoubleClicked + Pressed.
pub type InputEvents = Vec<(u8, ButtonEvent), 4>;

/// Classify a raw 12-bit ladder sample into a physical button id.
///
/// A sample maps to the first level it does not exceed: the lowest tap is
/// physical 1, the open-circuit rest level is the idle sentinel.
pub fn classify_level(sample: u16) -> u8 {
    for (i, &level) in LADDER_LEVELS.iter().enumerate() {
        if sample <= level {
            return if i < NUM_BUTTONS {
                (i as u8) + 1
            } else {
                IDLE_BUTTON_ID
            };
        }
    }
    IDLE_BUTTON_ID
}

/// Debounces ladder id transitions and detects click/double-click/long-press
/// gestures, one physical button at a time (the ladder is electrically
/// single-press).
pub struct LadderDebouncer {
    /// Debounced id currently considered live (0 = idle).
    stable_id: u8,
    /// Raw id waiting out the debounce window.
    candidate_id: u8,
    candidate_since: u64,
    /// When the live press started.
    pressed_at: u64,
    /// A long-press fires once per hold.
    long_fired: bool,
    /// Previous click, for double-click pairing: (id, release time).
    last_click: Option<(u8, u64)>,
}

impl LadderDebouncer {
    pub const fn new() -> Self {
        Self {
            stable_id: IDLE_BUTTON_ID,
            candidate_id: IDLE_BUTTON_ID,
            candidate_since: 0,
            pressed_at: 0,
            long_fired: false,
            last_click: None,
        }
    }

    /// Feed one classified sample. `now_ms` must be monotonic.
    pub fn sample(&mut self, raw_id: u8, now_ms: u64) -> InputEvents {
        let mut events = InputEvents::new();

        if raw_id != self.candidate_id {
            self.candidate_id = raw_id;
            self.candidate_since = now_ms;
        }

        if self.candidate_id != self.stable_id
            && now_ms.saturating_sub(self.candidate_since) >= DEBOUNCE_MS
        {
            let previous = self.stable_id;
            self.stable_id = self.candidate_id;

            if previous != IDLE_BUTTON_ID {
                let _ = events.push((previous, ButtonEvent::Released));
                self.classify_release(previous, now_ms, &mut events);
            }
            if self.stable_id != IDLE_BUTTON_ID {
                let _ = events.push((self.stable_id, ButtonEvent::Pressed));
                self.pressed_at = now_ms;
                self.long_fired = false;
            }
        } else if self.stable_id != IDLE_BUTTON_ID
            && !self.long_fired
            && now_ms.saturating_sub(self.pressed_at) >= LONG_PRESS_MS
        {
            self.long_fired = true;
            let _ = events.push((self.stable_id, ButtonEvent::LongPressed));
        }

        events
    }

    fn classify_release(&mut self, id: u8, now_ms: u64, events: &mut InputEvents) {
        // Long-pressed holds never count as clicks.
        if self.long_fired || now_ms.saturating_sub(self.pressed_at) > CLICK_MAX_MS {
            self.last_click = None;
            return;
        }
        match self.last_click {
            Some((prev_id, prev_at))
                if prev_id == id && now_ms.saturating_sub(prev_at) <= DOUBLE_CLICK_GAP_MS =>
            {
                let _ = events.push((id, ButtonEvent::DoubleClicked));
                self.last_click = None;
            }
            _ => {
                let _ = events.push((id, ButtonEvent::Clicked));
                self.last_click = Some((id, now_ms));
            }
        }
    }
}
