use crate::config::LockConfig;
use crate::timer::{TimerId, TimerService};
use crate::types::{Actuator, Characteristic, Effect, LockState, LockStatePayload, Value};

/// Lock mechanism engine: relay-driven bolt with an optional auto-relock
/// countdown. Owns its current state exclusively; everything external goes
/// through target writes and `tick`.
#[derive(Debug)]
pub struct LockEngine {
    config: LockConfig,
    current: LockState,
    target: LockState,
    timers: TimerService,
    relock: TimerId,
}

impl LockEngine {
    pub fn new(config: LockConfig) -> Self {
        let mut timers = TimerService::new();
        let relock = timers.create();
        Self {
            config,
            current: LockState::Unknown,
            target: LockState::Secured,
            timers,
            relock,
        }
    }

    pub fn current(&self) -> LockState {
        self.current
    }

    pub fn target(&self) -> LockState {
        self.target
    }

    /// Enter the known-secured state at boot, matching the hardware reset
    /// level of the relay.
    pub fn startup(&mut self) -> Vec<Effect> {
        self.current = LockState::Secured;
        self.target = LockState::Secured;
        vec![
            Effect::Release(Actuator::LockRelay),
            Effect::Indicate(false),
            Effect::Notify(
                Characteristic::LockCurrentState,
                Value::U8(self.current.code()),
            ),
        ]
    }

    /// Inbound target write. Redundant requests are no-ops: no actuator
    /// writes, no notifications, and no timer re-arm.
    pub fn set_target(&mut self, target: LockState, now_ms: u64) -> Vec<Effect> {
        match target {
            LockState::Unsecured => {
                self.target = target;
                self.unlock(now_ms)
            }
            LockState::Secured => {
                self.target = target;
                self.lock()
            }
            // Jammed/Unknown are states the lock reports, not ones it can
            // be driven to; the request leaves the engine untouched.
            LockState::Jammed | LockState::Unknown => Vec::new(),
        }
    }

    /// Poll the auto-relock countdown. Firing while unsecured forces the
    /// target back to secured and re-enters the secured path exactly once.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Effect> {
        if !self.timers.poll(now_ms).contains(&self.relock) {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.target != LockState::Secured {
            self.target = LockState::Secured;
            effects.push(Effect::Notify(
                Characteristic::LockTargetState,
                Value::U8(self.target.code()),
            ));
        }
        effects.extend(self.lock());
        effects
    }

    pub fn state_payload(&self, now_ms: u64) -> LockStatePayload {
        LockStatePayload {
            current_state: self.current.as_str(),
            target_state: self.target.as_str(),
            relock_armed: self.timers.is_armed(self.relock),
            relock_remaining_ms: self.timers.remaining_ms(self.relock, now_ms),
        }
    }

    fn unlock(&mut self, now_ms: u64) -> Vec<Effect> {
        if self.current == LockState::Unsecured {
            return Vec::new();
        }

        self.current = LockState::Unsecured;
        if self.config.auto_relock_ms > 0 {
            self.timers.arm(self.relock, self.config.auto_relock_ms, now_ms);
        }
        vec![
            Effect::Assert(Actuator::LockRelay),
            Effect::Indicate(true),
            Effect::Notify(
                Characteristic::LockCurrentState,
                Value::U8(self.current.code()),
            ),
        ]
    }

    fn lock(&mut self) -> Vec<Effect> {
        self.timers.disarm(self.relock);

        if self.current == LockState::Secured {
            return Vec::new();
        }

        self.current = LockState::Secured;
        vec![
            Effect::Release(Actuator::LockRelay),
            Effect::Indicate(false),
            Effect::Notify(
                Characteristic::LockCurrentState,
                Value::U8(self.current.code()),
            ),
        ]
    }
}
