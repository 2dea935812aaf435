use crate::config::ButtonConfig;
use crate::types::{ButtonEvent, ToggleEvent};

/// Debounced push button with single/double/triple/long classification.
///
/// Feed raw pin samples at the poll cadence; an event comes out once the
/// classification window closes. A press held past the long-press threshold
/// fires `Long` exactly once and suppresses any further classification until
/// the button is released.
#[derive(Debug)]
pub struct Button {
    config: ButtonConfig,
    raw: bool,
    raw_since_ms: u64,
    level: bool,
    presses: u8,
    pressed_at_ms: Option<u64>,
    released_at_ms: Option<u64>,
    long_fired: bool,
}

impl Button {
    pub fn new(config: ButtonConfig) -> Self {
        Self {
            config,
            raw: false,
            raw_since_ms: 0,
            level: false,
            presses: 0,
            pressed_at_ms: None,
            released_at_ms: None,
            long_fired: false,
        }
    }

    /// Sample the raw (active-high) pin level. Returns at most one event.
    pub fn sample(&mut self, pressed: bool, now_ms: u64) -> Option<ButtonEvent> {
        if pressed != self.raw {
            self.raw = pressed;
            self.raw_since_ms = now_ms;
        }

        // Accept an edge only after the raw level has held steady.
        if self.raw != self.level
            && now_ms.saturating_sub(self.raw_since_ms) >= self.config.debounce_ms
        {
            self.level = self.raw;
            if self.level {
                self.on_press(now_ms);
            } else {
                self.on_release(now_ms);
            }
        }

        if self.level {
            return self.check_long_press(now_ms);
        }
        self.classify_if_window_closed(now_ms)
    }

    fn on_press(&mut self, now_ms: u64) {
        self.presses = self.presses.saturating_add(1);
        self.pressed_at_ms = Some(now_ms);
    }

    fn on_release(&mut self, now_ms: u64) {
        self.pressed_at_ms = None;
        if self.long_fired {
            // Long press already reported; this release closes the gesture.
            self.long_fired = false;
            self.presses = 0;
            self.released_at_ms = None;
        } else {
            self.released_at_ms = Some(now_ms);
        }
    }

    fn check_long_press(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        let start = self.pressed_at_ms?;
        if self.long_fired || now_ms.saturating_sub(start) < self.config.long_press_ms {
            return None;
        }
        self.long_fired = true;
        self.presses = 0;
        self.released_at_ms = None;
        Some(ButtonEvent::Long)
    }

    fn classify_if_window_closed(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        let released = self.released_at_ms?;
        if now_ms.saturating_sub(released) <= self.config.repeat_window_ms {
            return None;
        }

        let presses = self.presses.min(self.config.max_repeat_presses);
        self.presses = 0;
        self.released_at_ms = None;

        match presses {
            0 => None,
            1 => Some(ButtonEvent::Single),
            2 => Some(ButtonEvent::Double),
            _ => Some(ButtonEvent::Triple),
        }
    }
}

/// Level-toggle input: fires once per clean transition, with a minimum
/// stable-time filter to reject contact bounce.
#[derive(Debug)]
pub struct Toggle {
    stable_ms: u64,
    raw: bool,
    raw_since_ms: u64,
    level: bool,
}

impl Toggle {
    pub fn new(initial_level: bool, stable_ms: u64) -> Self {
        Self {
            stable_ms,
            raw: initial_level,
            raw_since_ms: 0,
            level: initial_level,
        }
    }

    pub fn level(&self) -> bool {
        self.level
    }

    pub fn sample(&mut self, level: bool, now_ms: u64) -> Option<ToggleEvent> {
        if level != self.raw {
            self.raw = level;
            self.raw_since_ms = now_ms;
        }

        if self.raw == self.level || now_ms.saturating_sub(self.raw_since_ms) < self.stable_ms {
            return None;
        }

        self.level = self.raw;
        Some(if self.level {
            ToggleEvent::On
        } else {
            ToggleEvent::Off
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn test_config() -> ButtonConfig {
        ButtonConfig {
            debounce_ms: 0,
            repeat_window_ms: 350,
            long_press_ms: 4_000,
            max_repeat_presses: 3,
        }
    }

    fn press_release(button: &mut Button, press_ms: u64, release_ms: u64) {
        assert_eq!(button.sample(true, press_ms), None);
        assert_eq!(button.sample(false, release_ms), None);
    }

    #[test]
    fn single_press_classifies_after_window() {
        let mut button = Button::new(test_config());
        press_release(&mut button, 0, 50);

        assert_eq!(button.sample(false, 300), None);
        assert_eq!(button.sample(false, 401), Some(ButtonEvent::Single));
        assert_eq!(button.sample(false, 500), None);
    }

    #[test]
    fn three_presses_in_window_are_one_triple() {
        let mut button = Button::new(test_config());
        press_release(&mut button, 0, 50);
        press_release(&mut button, 150, 200);
        press_release(&mut button, 300, 350);

        assert_eq!(button.sample(false, 600), None);
        assert_eq!(button.sample(false, 701), Some(ButtonEvent::Triple));
        assert_eq!(button.sample(false, 800), None);
    }

    #[test]
    fn double_press_classifies_as_double() {
        let mut button = Button::new(test_config());
        press_release(&mut button, 0, 60);
        press_release(&mut button, 200, 260);

        assert_eq!(button.sample(false, 611), Some(ButtonEvent::Double));
    }

    #[test]
    fn excess_presses_clamp_to_triple() {
        let mut button = Button::new(test_config());
        for start in [0u64, 100, 200, 300] {
            press_release(&mut button, start, start + 40);
        }

        assert_eq!(button.sample(false, 691), Some(ButtonEvent::Triple));
    }

    #[test]
    fn long_hold_fires_once_and_suppresses_classification() {
        let mut button = Button::new(test_config());
        assert_eq!(button.sample(true, 0), None);
        assert_eq!(button.sample(true, 3_999), None);
        assert_eq!(button.sample(true, 4_000), Some(ButtonEvent::Long));
        assert_eq!(button.sample(true, 8_000), None);

        // Release produces nothing further.
        assert_eq!(button.sample(false, 9_000), None);
        assert_eq!(button.sample(false, 10_000), None);
    }

    #[test]
    fn bounce_shorter_than_debounce_is_ignored() {
        let mut button = Button::new(ButtonConfig {
            debounce_ms: 20,
            ..test_config()
        });

        assert_eq!(button.sample(true, 0), None);
        assert_eq!(button.sample(false, 10), None);
        assert_eq!(button.sample(false, 100), None);
        // No press registered, so silence never classifies.
        assert_eq!(button.sample(false, 1_000), None);
    }

    #[test]
    fn toggle_fires_once_per_stable_transition() {
        let mut toggle = Toggle::new(false, 50);

        assert_eq!(toggle.sample(true, 0), None);
        assert_eq!(toggle.sample(true, 49), None);
        assert_eq!(toggle.sample(true, 50), Some(ToggleEvent::On));
        assert_eq!(toggle.sample(true, 100), None);

        // Bounce back under the stable window: no event.
        assert_eq!(toggle.sample(false, 200), None);
        assert_eq!(toggle.sample(true, 220), None);
        assert_eq!(toggle.sample(true, 400), None);

        assert_eq!(toggle.sample(false, 500), None);
        assert_eq!(toggle.sample(false, 551), Some(ToggleEvent::Off));
        assert!(!toggle.level());
    }
}
