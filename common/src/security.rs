use crate::button::Toggle;
use crate::config::SecurityConfig;
use crate::types::{
    Characteristic, Effect, SecurityState, SecurityStatePayload, ToggleEvent, Value,
};

/// Security panel. Arm state and tamper are independent axes: a tamper
/// edge never changes the arm state, and changing the arm state never
/// clears tamper.
#[derive(Debug)]
pub struct SecurityEngine {
    current: SecurityState,
    target: SecurityState,
    tamper: Toggle,
    tampered: bool,
}

impl SecurityEngine {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            current: SecurityState::Disarmed,
            target: SecurityState::Disarmed,
            tamper: Toggle::new(false, config.tamper_stable_ms),
            tampered: false,
        }
    }

    pub fn current(&self) -> SecurityState {
        self.current
    }

    pub fn is_tampered(&self) -> bool {
        self.tampered
    }

    /// Announce the boot state so a late-joining subscriber sees it.
    pub fn startup(&self) -> Vec<Effect> {
        vec![
            Effect::Notify(
                Characteristic::SecurityCurrentState,
                Value::U8(self.current.code()),
            ),
            Effect::Indicate(self.current == SecurityState::NightArm),
        ]
    }

    /// Accepts every panel state as a target, Triggered included.
    /// A write that matches the current state produces nothing.
    pub fn set_target(&mut self, state: SecurityState) -> Vec<Effect> {
        self.target = state;
        if self.current == self.target {
            return Vec::new();
        }
        self.current = self.target;
        vec![
            Effect::Notify(
                Characteristic::SecurityCurrentState,
                Value::U8(self.current.code()),
            ),
            Effect::Indicate(self.current == SecurityState::NightArm),
        ]
    }

    /// Sample the raw tamper contact; debounced in the same way as a
    /// toggle switch so contact chatter never flaps the characteristic.
    pub fn tamper_sample(&mut self, raw: bool, now_ms: u64) -> Vec<Effect> {
        match self.tamper.sample(raw, now_ms) {
            Some(ToggleEvent::On) => self.set_tampered(true),
            Some(ToggleEvent::Off) => self.set_tampered(false),
            None => Vec::new(),
        }
    }

    fn set_tampered(&mut self, tampered: bool) -> Vec<Effect> {
        self.tampered = tampered;
        vec![Effect::Notify(
            Characteristic::StatusTampered,
            Value::Bool(tampered),
        )]
    }

    pub fn state_payload(&self) -> SecurityStatePayload {
        SecurityStatePayload {
            current_state: self.current.as_str(),
            target_state: self.target.as_str(),
            tampered: self.tampered,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn engine() -> SecurityEngine {
        SecurityEngine::new(SecurityConfig::default())
    }

    #[test]
    fn target_write_notifies_exactly_once() {
        let mut engine = engine();

        let effects = engine.set_target(SecurityState::AwayArm);
        assert_eq!(
            effects,
            vec![
                Effect::Notify(Characteristic::SecurityCurrentState, Value::U8(1)),
                Effect::Indicate(false),
            ]
        );

        // Redundant write is fully suppressed.
        assert_eq!(engine.set_target(SecurityState::AwayArm), vec![]);
    }

    #[test]
    fn night_arm_lights_the_indicator() {
        let mut engine = engine();

        let effects = engine.set_target(SecurityState::NightArm);
        assert!(effects.contains(&Effect::Indicate(true)));

        let effects = engine.set_target(SecurityState::Disarmed);
        assert!(effects.contains(&Effect::Indicate(false)));
    }

    #[test]
    fn triggered_is_an_accepted_target() {
        let mut engine = engine();
        engine.set_target(SecurityState::AwayArm);

        let effects = engine.set_target(SecurityState::Triggered);
        assert_eq!(engine.current(), SecurityState::Triggered);
        assert!(effects.contains(&Effect::Notify(
            Characteristic::SecurityCurrentState,
            Value::U8(4)
        )));
    }

    #[test]
    fn tamper_is_orthogonal_to_arm_state() {
        let mut engine = engine();
        engine.set_target(SecurityState::StayArm);

        // Raw contact must hold for the stability window before it counts.
        assert_eq!(engine.tamper_sample(true, 0), vec![]);
        assert_eq!(engine.tamper_sample(true, 49), vec![]);
        let effects = engine.tamper_sample(true, 50);
        assert_eq!(
            effects,
            vec![Effect::Notify(Characteristic::StatusTampered, Value::Bool(true))]
        );
        assert_eq!(engine.current(), SecurityState::StayArm);

        // Disarming does not clear tamper.
        engine.set_target(SecurityState::Disarmed);
        assert!(engine.is_tampered());

        // Only the contact releasing does.
        engine.tamper_sample(false, 1_000);
        let effects = engine.tamper_sample(false, 1_050);
        assert_eq!(
            effects,
            vec![Effect::Notify(Characteristic::StatusTampered, Value::Bool(false))]
        );
    }

    #[test]
    fn tamper_chatter_below_stability_window_is_ignored() {
        let mut engine = engine();

        engine.tamper_sample(true, 0);
        engine.tamper_sample(false, 20);
        engine.tamper_sample(true, 40);
        assert_eq!(engine.tamper_sample(false, 60), vec![]);
        assert!(!engine.is_tampered());
    }

    #[test]
    fn payload_reflects_both_axes() {
        let mut engine = engine();
        engine.set_target(SecurityState::NightArm);
        engine.tamper_sample(true, 0);
        engine.tamper_sample(true, 50);

        let payload = engine.state_payload();
        assert_eq!(payload.current_state, "NIGHT_ARM");
        assert_eq!(payload.target_state, "NIGHT_ARM");
        assert!(payload.tampered);
    }
}
