use crate::config::{CoverConfig, CoverTravel};
use crate::types::{
    Actuator, Characteristic, CoverSide, CoverStatePayload, Effect, PositionState, Value,
};

/// One motorized cover. Position is a percent where 0 is fully closed
/// and 100 is fully open; travel pacing comes from the per-direction
/// calibration so "move 30 percent" always takes 30 percent of the
/// measured full-travel time, whatever the starting point.
#[derive(Debug)]
pub struct Cover {
    side: CoverSide,
    travel: CoverTravel,
    current: u8,
    target: u8,
    last_tick_ms: Option<u64>,
    step_accum_ms: u64,
}

/// Both covers, driven as one accessory.
#[derive(Debug)]
pub struct CoverEngine {
    pub left: Cover,
    pub right: Cover,
}

impl CoverEngine {
    pub fn new(config: &CoverConfig) -> Self {
        Self {
            left: Cover::new(CoverSide::Left, config.left),
            right: Cover::new(CoverSide::Right, config.right),
        }
    }

    pub fn side_mut(&mut self, side: CoverSide) -> &mut Cover {
        match side {
            CoverSide::Left => &mut self.left,
            CoverSide::Right => &mut self.right,
        }
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<Effect> {
        let mut effects = self.left.tick(now_ms);
        effects.extend(self.right.tick(now_ms));
        effects
    }

    pub fn is_moving(&self) -> bool {
        self.left.is_moving() || self.right.is_moving()
    }
}

impl Cover {
    fn new(side: CoverSide, travel: CoverTravel) -> Self {
        // Boots closed; the motor is left de-energized until commanded.
        Self {
            side,
            travel,
            current: 0,
            target: 0,
            last_tick_ms: None,
            step_accum_ms: 0,
        }
    }

    pub fn current_position(&self) -> u8 {
        self.current
    }

    pub fn target_position(&self) -> u8 {
        self.target
    }

    pub fn is_moving(&self) -> bool {
        self.current != self.target
    }

    /// Adopt a persisted position at boot without energizing the motor.
    pub fn restore_position(&mut self, position: u8) {
        let position = position.min(100);
        self.current = position;
        self.target = position;
    }

    /// Command a new target. Works mid-travel: the remaining distance is
    /// re-paced from the position the cover has actually reached, and a
    /// direction reversal swaps the energized winding (the actuator group
    /// inserts the dead time).
    pub fn set_target(&mut self, target: u8, now_ms: u64) -> Vec<Effect> {
        let target = target.min(100);
        if target == self.target {
            return Vec::new();
        }
        self.target = target;

        let mut effects = vec![Effect::Notify(
            Characteristic::CoverTargetPosition(self.side),
            Value::U8(target),
        )];
        if self.current == self.target {
            // Retarget back onto the current position: stop where we are.
            effects.extend(self.arrive());
            return effects;
        }

        self.last_tick_ms = Some(now_ms);
        self.step_accum_ms = 0;
        effects.push(Effect::Assert(self.direction()));
        effects
    }

    /// One-percent adjustment from the paired remote, usable mid-travel.
    pub fn nudge(&mut self, delta: i8, now_ms: u64) -> Vec<Effect> {
        let target = (self.target as i16 + delta as i16).clamp(0, 100) as u8;
        self.set_target(target, now_ms)
    }

    /// Advance travel by the wall time elapsed since the previous tick.
    /// A stalled host that skips ticks catches up by completing several
    /// percent steps at once.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Effect> {
        let Some(last) = self.last_tick_ms else {
            return Vec::new();
        };
        if !self.is_moving() {
            return Vec::new();
        }

        self.step_accum_ms += now_ms.saturating_sub(last);
        self.last_tick_ms = Some(now_ms);

        let step_ms = self.per_percent_ms();
        let mut effects = Vec::new();
        while self.step_accum_ms >= step_ms && self.is_moving() {
            self.step_accum_ms -= step_ms;
            if self.target > self.current {
                self.current += 1;
            } else {
                self.current -= 1;
            }
            effects.push(Effect::Notify(
                Characteristic::CoverCurrentPosition(self.side),
                Value::U8(self.current),
            ));
        }
        if !self.is_moving() {
            effects.extend(self.arrive());
        }
        effects
    }

    pub fn state_payload(&self) -> CoverStatePayload {
        CoverStatePayload {
            side: self.side.as_str(),
            current_position: self.current,
            target_position: self.target,
            position_state: PositionState::Stationary.as_str(),
        }
    }

    fn direction(&self) -> Actuator {
        if self.target > self.current {
            Actuator::CoverOpen(self.side)
        } else {
            Actuator::CoverClose(self.side)
        }
    }

    fn per_percent_ms(&self) -> u64 {
        let full = if self.target > self.current {
            self.travel.open_ms
        } else {
            self.travel.close_ms
        };
        (full / 100).max(1)
    }

    fn arrive(&mut self) -> Vec<Effect> {
        self.last_tick_ms = None;
        self.step_accum_ms = 0;
        vec![
            Effect::Release(Actuator::CoverOpen(self.side)),
            Effect::Release(Actuator::CoverClose(self.side)),
            Effect::Notify(
                Characteristic::CoverPositionState(self.side),
                Value::U8(PositionState::Stationary.code()),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn left_cover() -> Cover {
        Cover::new(CoverSide::Left, CoverConfig::default().left)
    }

    #[test]
    fn full_open_takes_the_calibrated_budget() {
        let mut cover = left_cover();

        let effects = cover.set_target(100, 0);
        assert!(effects.contains(&Effect::Assert(Actuator::CoverOpen(CoverSide::Left))));

        // 4300ms for 100 percent: one percent every 43ms.
        assert_eq!(cover.tick(42), vec![]);
        let effects = cover.tick(43);
        assert_eq!(
            effects,
            vec![Effect::Notify(
                Characteristic::CoverCurrentPosition(CoverSide::Left),
                Value::U8(1)
            )]
        );

        let effects = cover.tick(4_300);
        assert_eq!(cover.current_position(), 100);
        assert!(effects.contains(&Effect::Release(Actuator::CoverOpen(CoverSide::Left))));
        assert!(effects.contains(&Effect::Release(Actuator::CoverClose(CoverSide::Left))));
        assert!(!cover.is_moving());
    }

    #[test]
    fn partial_travel_is_proportional() {
        let mut cover = left_cover();
        cover.set_target(30, 0);

        // 30 percent of a 4300ms open: done at 1290ms, not before.
        cover.tick(1_289);
        assert_eq!(cover.current_position(), 29);
        cover.tick(1_290);
        assert_eq!(cover.current_position(), 30);
        assert!(!cover.is_moving());
    }

    #[test]
    fn closing_uses_the_close_budget() {
        let mut cover = left_cover();
        cover.set_target(100, 0);
        cover.tick(4_300);

        cover.set_target(0, 10_000);
        // 5900ms for 100 percent closing: one percent every 59ms.
        cover.tick(10_058);
        assert_eq!(cover.current_position(), 100);
        cover.tick(10_059);
        assert_eq!(cover.current_position(), 99);
        cover.tick(15_900);
        assert_eq!(cover.current_position(), 0);
    }

    #[test]
    fn mid_travel_retarget_repaces_from_the_reached_position() {
        let mut cover = left_cover();
        cover.set_target(100, 0);
        cover.tick(2_150);
        assert_eq!(cover.current_position(), 50);

        // Reverse toward 20: 30 percent of the close budget from here.
        let effects = cover.set_target(20, 2_150);
        assert!(effects.contains(&Effect::Assert(Actuator::CoverClose(CoverSide::Left))));

        cover.tick(2_150 + 59 * 30 - 1);
        assert_eq!(cover.current_position(), 21);
        cover.tick(2_150 + 59 * 30);
        assert_eq!(cover.current_position(), 20);
        assert!(!cover.is_moving());
    }

    #[test]
    fn nudge_works_mid_travel() {
        let mut cover = left_cover();
        cover.set_target(50, 0);
        cover.tick(430);
        assert_eq!(cover.current_position(), 10);

        let effects = cover.nudge(1, 430);
        assert_eq!(cover.target_position(), 51);
        assert!(effects.contains(&Effect::Notify(
            Characteristic::CoverTargetPosition(CoverSide::Left),
            Value::U8(51)
        )));
        assert!(cover.is_moving());
    }

    #[test]
    fn nudge_clamps_at_the_ends() {
        let mut cover = left_cover();

        assert_eq!(cover.nudge(-1, 0), vec![]);
        assert_eq!(cover.target_position(), 0);

        cover.set_target(100, 0);
        cover.tick(4_300);
        cover.nudge(1, 5_000);
        assert_eq!(cover.target_position(), 100);
    }

    #[test]
    fn retarget_onto_current_position_stops_the_motor() {
        let mut cover = left_cover();
        cover.set_target(100, 0);
        cover.tick(430);
        assert_eq!(cover.current_position(), 10);

        let effects = cover.set_target(10, 430);
        assert!(effects.contains(&Effect::Release(Actuator::CoverOpen(CoverSide::Left))));
        assert!(!cover.is_moving());
        assert_eq!(cover.tick(10_000), vec![]);
    }

    #[test]
    fn redundant_target_write_is_silent() {
        let mut cover = left_cover();
        cover.set_target(40, 0);

        assert_eq!(cover.set_target(40, 100), vec![]);
    }

    #[test]
    fn stalled_ticks_catch_up() {
        let mut cover = left_cover();
        cover.set_target(100, 0);

        // One late tick completes every step owed so far.
        let effects = cover.tick(430);
        assert_eq!(cover.current_position(), 10);
        assert_eq!(effects.len(), 10);
    }

    #[test]
    fn values_above_full_open_clamp_to_100() {
        let mut cover = left_cover();
        cover.set_target(250, 0);
        assert_eq!(cover.target_position(), 100);
    }

    #[test]
    fn sides_travel_independently() {
        let mut engine = CoverEngine::new(&CoverConfig::default());
        engine.left.set_target(100, 0);
        engine.right.set_target(100, 0);

        // Right is slower: 60ms per percent against the left's 43ms.
        engine.tick(4_300);
        assert_eq!(engine.left.current_position(), 100);
        assert_eq!(engine.right.current_position(), 71);

        engine.tick(6_000);
        assert_eq!(engine.right.current_position(), 100);
        assert!(!engine.is_moving());
    }
}
