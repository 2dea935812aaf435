/// Countdown timers polled from the single accessory context.
///
/// Handles are created once at accessory init and live for the life of the
/// process; arming and disarming is cheap and allocation-free after that.
/// Firing is detected by `poll(now_ms)` on the same execution context that
/// handles every other accessory event, so a timer can never race a target
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(usize);

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    deadline_ms: Option<u64>,
    period_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TimerService {
    slots: Vec<TimerSlot>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> TimerId {
        self.slots.push(TimerSlot {
            deadline_ms: None,
            period_ms: None,
        });
        TimerId(self.slots.len() - 1)
    }

    /// Arm a one-shot countdown. Arming an already-armed timer replaces the
    /// prior deadline; the old one will not fire.
    pub fn arm(&mut self, id: TimerId, duration_ms: u64, now_ms: u64) {
        let slot = &mut self.slots[id.0];
        slot.deadline_ms = Some(now_ms.saturating_add(duration_ms));
        slot.period_ms = None;
    }

    /// Arm a periodic timer that re-arms itself on every fire.
    pub fn arm_periodic(&mut self, id: TimerId, period_ms: u64, now_ms: u64) {
        let slot = &mut self.slots[id.0];
        slot.deadline_ms = Some(now_ms.saturating_add(period_ms));
        slot.period_ms = Some(period_ms.max(1));
    }

    /// No-op on a timer that is not armed.
    pub fn disarm(&mut self, id: TimerId) {
        let slot = &mut self.slots[id.0];
        slot.deadline_ms = None;
        slot.period_ms = None;
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.slots[id.0].deadline_ms.is_some()
    }

    pub fn remaining_ms(&self, id: TimerId, now_ms: u64) -> u64 {
        self.slots[id.0]
            .deadline_ms
            .map(|deadline| deadline.saturating_sub(now_ms))
            .unwrap_or(0)
    }

    /// Collect every timer whose deadline has passed. One-shots are cleared
    /// before this returns, so a fire can never be observed twice; periodic
    /// timers re-arm from their previous deadline to avoid drift.
    pub fn poll(&mut self, now_ms: u64) -> Vec<TimerId> {
        let mut fired = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(deadline) = slot.deadline_ms else {
                continue;
            };
            if now_ms < deadline {
                continue;
            }

            match slot.period_ms {
                Some(period) => {
                    let mut next = deadline.saturating_add(period);
                    // Catch up if polling stalled past several periods.
                    while next <= now_ms {
                        next = next.saturating_add(period);
                    }
                    slot.deadline_ms = Some(next);
                }
                None => slot.deadline_ms = None,
            }
            fired.push(TimerId(index));
        }
        fired
    }
}
