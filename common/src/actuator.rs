use std::collections::HashMap;

use crate::types::{Actuator, CoverSide, Effect};

/// Raw pin access. Writes are pin toggles: non-blocking and infallible at
/// this level; hardware faults are outside the core.
pub trait Gpio {
    fn write(&mut self, pin: u8, level: bool);
    fn read(&self, pin: u8) -> bool;
}

/// In-memory pin bank. Backs the host build and every test; a HAL
/// implementation of `Gpio` replaces it on real hardware.
#[derive(Debug, Default)]
pub struct MemoryGpio {
    levels: HashMap<u8, bool>,
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Gpio for MemoryGpio {
    fn write(&mut self, pin: u8, level: bool) {
        self.levels.insert(pin, level);
    }

    fn read(&self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }
}

/// One physical output with its asserted polarity. Several of the original
/// boards drive relays active-low.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub pin: u8,
    pub active_high: bool,
}

impl Output {
    pub fn new(pin: u8, active_high: bool) -> Self {
        Self { pin, active_high }
    }

    fn write(&self, gpio: &mut dyn Gpio, asserted: bool) {
        gpio.write(self.pin, asserted == self.active_high);
    }

    fn is_asserted(&self, gpio: &dyn Gpio) -> bool {
        gpio.read(self.pin) == self.active_high
    }
}

/// A set of outputs of which at most one may be energized at any instant
/// (heater/cooler pair, the two legs of a motor H-bridge).
///
/// Selection always releases every sibling before asserting the chosen
/// member, so the group passes through a brief all-off dead time instead of
/// ever shorting two legs together.
#[derive(Debug)]
pub struct ExclusiveGroup {
    outputs: Vec<Output>,
    asserted: Option<usize>,
}

impl ExclusiveGroup {
    pub fn new(outputs: Vec<Output>) -> Self {
        Self {
            outputs,
            asserted: None,
        }
    }

    /// Drive all members to the released level. Called once at startup so
    /// the hardware matches the group's bookkeeping.
    pub fn release_all(&mut self, gpio: &mut dyn Gpio) {
        for output in &self.outputs {
            output.write(gpio, false);
        }
        self.asserted = None;
    }

    /// Assert exactly `member`, or nothing for `None`. Release-then-assert
    /// order: the final state never has more than one member energized.
    pub fn set_exclusive(&mut self, gpio: &mut dyn Gpio, member: Option<usize>) {
        for (index, output) in self.outputs.iter().enumerate() {
            if Some(index) != member {
                output.write(gpio, false);
            }
        }
        if let Some(index) = member {
            self.outputs[index].write(gpio, true);
        }
        self.asserted = member;
    }

    pub fn asserted(&self) -> Option<usize> {
        self.asserted
    }

    pub fn is_asserted(&self, gpio: &dyn Gpio, member: usize) -> bool {
        self.outputs[member].is_asserted(gpio)
    }

    pub fn asserted_count(&self, gpio: &dyn Gpio) -> usize {
        self.outputs
            .iter()
            .filter(|output| output.is_asserted(gpio))
            .count()
    }
}

/// Pin assignments for every output the accessories drive.
#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    pub lock_relay: Output,
    pub heater: Output,
    pub cooler: Output,
    pub fan: Output,
    pub cover_left_open: Output,
    pub cover_left_close: Output,
    pub cover_right_open: Output,
    pub cover_right_close: Output,
    pub status_led: Output,
}

impl Default for PinMap {
    fn default() -> Self {
        // Pin numbers follow the original boards; heater/cooler/fan relays
        // are driven active-low there.
        Self {
            lock_relay: Output::new(12, true),
            heater: Output::new(13, false),
            cooler: Output::new(26, false),
            fan: Output::new(14, false),
            cover_left_open: Output::new(16, true),
            cover_left_close: Output::new(17, true),
            cover_right_open: Output::new(18, true),
            cover_right_close: Output::new(19, true),
            status_led: Output::new(2, false),
        }
    }
}

/// Routes engine effects onto physical outputs, enforcing group exclusivity
/// structurally: the heater/cooler pair and each cover's direction pair go
/// through an [`ExclusiveGroup`], everything else is a plain output.
#[derive(Debug)]
pub struct ActuatorBank {
    hvac: ExclusiveGroup,
    cover_left: ExclusiveGroup,
    cover_right: ExclusiveGroup,
    lock_relay: Output,
    fan: Output,
    status_led: Output,
}

const HVAC_HEATER: usize = 0;
const HVAC_COOLER: usize = 1;
const COVER_OPEN: usize = 0;
const COVER_CLOSE: usize = 1;

impl ActuatorBank {
    pub fn new(pins: PinMap, gpio: &mut dyn Gpio) -> Self {
        let mut bank = Self {
            hvac: ExclusiveGroup::new(vec![pins.heater, pins.cooler]),
            cover_left: ExclusiveGroup::new(vec![pins.cover_left_open, pins.cover_left_close]),
            cover_right: ExclusiveGroup::new(vec![pins.cover_right_open, pins.cover_right_close]),
            lock_relay: pins.lock_relay,
            fan: pins.fan,
            status_led: pins.status_led,
        };
        bank.hvac.release_all(gpio);
        bank.cover_left.release_all(gpio);
        bank.cover_right.release_all(gpio);
        bank.lock_relay.write(gpio, false);
        bank.fan.write(gpio, false);
        bank.status_led.write(gpio, false);
        bank
    }

    pub fn apply(&mut self, gpio: &mut dyn Gpio, effect: Effect) {
        match effect {
            Effect::Assert(actuator) => self.set(gpio, actuator, true),
            Effect::Release(actuator) => self.set(gpio, actuator, false),
            Effect::Indicate(on) => self.status_led.write(gpio, on),
            Effect::Notify(..) => {}
        }
    }

    fn set(&mut self, gpio: &mut dyn Gpio, actuator: Actuator, asserted: bool) {
        match actuator {
            Actuator::LockRelay => self.lock_relay.write(gpio, asserted),
            Actuator::Fan => self.fan.write(gpio, asserted),
            Actuator::Heater => Self::set_member(&mut self.hvac, gpio, HVAC_HEATER, asserted),
            Actuator::Cooler => Self::set_member(&mut self.hvac, gpio, HVAC_COOLER, asserted),
            Actuator::CoverOpen(side) => {
                Self::set_member(self.cover_mut(side), gpio, COVER_OPEN, asserted)
            }
            Actuator::CoverClose(side) => {
                Self::set_member(self.cover_mut(side), gpio, COVER_CLOSE, asserted)
            }
        }
    }

    fn set_member(group: &mut ExclusiveGroup, gpio: &mut dyn Gpio, member: usize, asserted: bool) {
        if asserted {
            group.set_exclusive(gpio, Some(member));
        } else if group.asserted() == Some(member) {
            group.set_exclusive(gpio, None);
        }
    }

    fn cover_mut(&mut self, side: CoverSide) -> &mut ExclusiveGroup {
        match side {
            CoverSide::Left => &mut self.cover_left,
            CoverSide::Right => &mut self.cover_right,
        }
    }

    /// Read-back for status endpoints and tests.
    pub fn is_asserted(&self, gpio: &dyn Gpio, actuator: Actuator) -> bool {
        match actuator {
            Actuator::LockRelay => self.lock_relay.is_asserted(gpio),
            Actuator::Fan => self.fan.is_asserted(gpio),
            Actuator::Heater => self.hvac.is_asserted(gpio, HVAC_HEATER),
            Actuator::Cooler => self.hvac.is_asserted(gpio, HVAC_COOLER),
            Actuator::CoverOpen(side) => self.cover(side).is_asserted(gpio, COVER_OPEN),
            Actuator::CoverClose(side) => self.cover(side).is_asserted(gpio, COVER_CLOSE),
        }
    }

    fn cover(&self, side: CoverSide) -> &ExclusiveGroup {
        match side {
            CoverSide::Left => &self.cover_left,
            CoverSide::Right => &self.cover_right,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn group() -> (ExclusiveGroup, MemoryGpio) {
        let mut gpio = MemoryGpio::new();
        let mut group = ExclusiveGroup::new(vec![
            Output::new(10, true),
            Output::new(11, false),
            Output::new(12, true),
        ]);
        group.release_all(&mut gpio);
        (group, gpio)
    }

    #[test]
    fn at_most_one_member_asserted_for_any_sequence() {
        let (mut group, mut gpio) = group();

        let sequence = [
            Some(0),
            Some(1),
            Some(1),
            None,
            Some(2),
            Some(0),
            None,
            None,
            Some(1),
        ];
        for member in sequence {
            group.set_exclusive(&mut gpio, member);
            assert!(group.asserted_count(&gpio) <= 1);
            assert_eq!(group.asserted(), member);
            if let Some(index) = member {
                assert!(group.is_asserted(&gpio, index));
            }
        }
    }

    #[test]
    fn mixed_polarity_outputs_release_to_inactive_levels() {
        let (mut group, mut gpio) = group();
        group.set_exclusive(&mut gpio, Some(1));

        // Active-low member asserted: pin 11 low, siblings at inactive level.
        assert!(!gpio.read(11));
        assert!(!gpio.read(10));
        assert!(!gpio.read(12));

        group.set_exclusive(&mut gpio, None);
        assert!(gpio.read(11));
    }

    #[test]
    fn bank_routes_heater_and_cooler_through_one_group() {
        let mut gpio = MemoryGpio::new();
        let mut bank = ActuatorBank::new(PinMap::default(), &mut gpio);

        bank.apply(&mut gpio, Effect::Assert(Actuator::Heater));
        assert!(bank.is_asserted(&gpio, Actuator::Heater));
        assert!(!bank.is_asserted(&gpio, Actuator::Cooler));

        bank.apply(&mut gpio, Effect::Assert(Actuator::Cooler));
        assert!(!bank.is_asserted(&gpio, Actuator::Heater));
        assert!(bank.is_asserted(&gpio, Actuator::Cooler));
    }

    #[test]
    fn releasing_a_non_asserted_member_keeps_the_active_one() {
        let mut gpio = MemoryGpio::new();
        let mut bank = ActuatorBank::new(PinMap::default(), &mut gpio);

        bank.apply(&mut gpio, Effect::Assert(Actuator::Heater));
        bank.apply(&mut gpio, Effect::Release(Actuator::Cooler));

        assert!(bank.is_asserted(&gpio, Actuator::Heater));
    }

    #[test]
    fn cover_sides_are_independent_groups() {
        let mut gpio = MemoryGpio::new();
        let mut bank = ActuatorBank::new(PinMap::default(), &mut gpio);

        bank.apply(&mut gpio, Effect::Assert(Actuator::CoverOpen(CoverSide::Left)));
        bank.apply(
            &mut gpio,
            Effect::Assert(Actuator::CoverClose(CoverSide::Right)),
        );

        assert!(bank.is_asserted(&gpio, Actuator::CoverOpen(CoverSide::Left)));
        assert!(bank.is_asserted(&gpio, Actuator::CoverClose(CoverSide::Right)));

        bank.apply(
            &mut gpio,
            Effect::Assert(Actuator::CoverClose(CoverSide::Left)),
        );
        assert!(!bank.is_asserted(&gpio, Actuator::CoverOpen(CoverSide::Left)));
        assert!(bank.is_asserted(&gpio, Actuator::CoverClose(CoverSide::Right)));
    }
}
