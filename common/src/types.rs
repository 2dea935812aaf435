use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Lock mechanism state, numeric codes as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockState {
    Unsecured,
    Secured,
    Jammed,
    Unknown,
}

impl LockState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsecured => "UNSECURED",
            Self::Secured => "SECURED",
            Self::Jammed => "JAMMED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Secured => 1,
            Self::Jammed => 2,
            Self::Unknown => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ValueError> {
        match code {
            0 => Ok(Self::Unsecured),
            1 => Ok(Self::Secured),
            2 => Ok(Self::Jammed),
            3 => Ok(Self::Unknown),
            other => Err(ValueError::UnknownCode {
                characteristic: "lock state",
                code: other,
            }),
        }
    }
}

/// Requested heating/cooling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThermostatMode {
    Off,
    Heat,
    Cool,
    Auto,
}

impl ThermostatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Auto => "AUTO",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Cool => 2,
            Self::Auto => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ValueError> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::Heat),
            2 => Ok(Self::Cool),
            3 => Ok(Self::Auto),
            other => Err(ValueError::UnknownCode {
                characteristic: "thermostat mode",
                code: other,
            }),
        }
    }
}

/// What the HVAC plant is actually doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HvacState {
    Off,
    Heating,
    Cooling,
}

impl HvacState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Heating => 1,
            Self::Cooling => 2,
        }
    }
}

/// Security panel arm state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityState {
    StayArm,
    AwayArm,
    NightArm,
    Disarmed,
    Triggered,
}

impl SecurityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StayArm => "STAY_ARM",
            Self::AwayArm => "AWAY_ARM",
            Self::NightArm => "NIGHT_ARM",
            Self::Disarmed => "DISARMED",
            Self::Triggered => "TRIGGERED",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::StayArm => 0,
            Self::AwayArm => 1,
            Self::NightArm => 2,
            Self::Disarmed => 3,
            Self::Triggered => 4,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ValueError> {
        match code {
            0 => Ok(Self::StayArm),
            1 => Ok(Self::AwayArm),
            2 => Ok(Self::NightArm),
            3 => Ok(Self::Disarmed),
            4 => Ok(Self::Triggered),
            other => Err(ValueError::UnknownCode {
                characteristic: "security state",
                code: other,
            }),
        }
    }
}

/// Motion state of one window covering.
///
/// `Jammed` and `Oscillating` are part of the wire vocabulary but no code
/// path produces them; there is no jam sensor on the covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionState {
    Stationary,
    Jammed,
    Oscillating,
}

impl PositionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stationary => "STATIONARY",
            Self::Jammed => "JAMMED",
            Self::Oscillating => "OSCILLATING",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Stationary => 0,
            Self::Jammed => 1,
            Self::Oscillating => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoverSide {
    Left,
    Right,
}

impl CoverSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// Classified event from a debounced push button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Single,
    Double,
    Triple,
    Long,
}

/// Clean transition of a two-position input (wall toggle, tamper loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleEvent {
    On,
    Off,
}

/// Every physical output the accessories drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    LockRelay,
    Heater,
    Cooler,
    Fan,
    CoverOpen(CoverSide),
    CoverClose(CoverSide),
}

/// One observable/controllable property of an accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Characteristic {
    LockCurrentState,
    LockTargetState,
    CurrentTemperature,
    CurrentHumidity,
    CurrentHvacState,
    SecurityCurrentState,
    StatusTampered,
    CoverCurrentPosition(CoverSide),
    CoverTargetPosition(CoverSide),
    CoverPositionState(CoverSide),
}

impl Characteristic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LockCurrentState => "lock_current_state",
            Self::LockTargetState => "lock_target_state",
            Self::CurrentTemperature => "current_temperature",
            Self::CurrentHumidity => "current_humidity",
            Self::CurrentHvacState => "current_hvac_state",
            Self::SecurityCurrentState => "security_current_state",
            Self::StatusTampered => "status_tampered",
            Self::CoverCurrentPosition(CoverSide::Left) => "cover_left_current_position",
            Self::CoverCurrentPosition(CoverSide::Right) => "cover_right_current_position",
            Self::CoverTargetPosition(CoverSide::Left) => "cover_left_target_position",
            Self::CoverTargetPosition(CoverSide::Right) => "cover_right_target_position",
            Self::CoverPositionState(CoverSide::Left) => "cover_left_position_state",
            Self::CoverPositionState(CoverSide::Right) => "cover_right_position_state",
        }
    }
}

/// Typed characteristic value carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    U8(u8),
    F32(f32),
    Bool(bool),
}

impl Value {
    pub fn to_payload(self) -> String {
        match self {
            Self::U8(v) => v.to_string(),
            Self::F32(v) => format!("{v:.1}"),
            Self::Bool(v) => v.to_string(),
        }
    }
}

/// Side effect requested by an engine. Engines never touch hardware or the
/// network themselves; the controller applies these in one place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Energize an output. Members of an exclusive group release their
    /// siblings as part of the same operation.
    Assert(Actuator),
    /// De-energize an output.
    Release(Actuator),
    /// Publish a new characteristic value to the protocol layer.
    Notify(Characteristic, Value),
    /// Drive the status indicator LED.
    Indicate(bool),
}

#[derive(Debug, Clone, Serialize)]
pub struct LockStatePayload {
    #[serde(rename = "currentState")]
    pub current_state: &'static str,
    #[serde(rename = "targetState")]
    pub target_state: &'static str,
    #[serde(rename = "relockArmed")]
    pub relock_armed: bool,
    #[serde(rename = "relockRemainingMs")]
    pub relock_remaining_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermostatStatePayload {
    pub temp: f32,
    pub humidity: f32,
    pub target: f32,
    #[serde(rename = "heatingThreshold")]
    pub heating_threshold: f32,
    #[serde(rename = "coolingThreshold")]
    pub cooling_threshold: f32,
    pub mode: &'static str,
    pub state: &'static str,
    #[serde(rename = "sensorValid")]
    pub sensor_valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityStatePayload {
    #[serde(rename = "currentState")]
    pub current_state: &'static str,
    #[serde(rename = "targetState")]
    pub target_state: &'static str,
    pub tampered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverStatePayload {
    pub side: &'static str,
    #[serde(rename = "currentPosition")]
    pub current_position: u8,
    #[serde(rename = "targetPosition")]
    pub target_position: u8,
    #[serde(rename = "positionState")]
    pub position_state: &'static str,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        for code in 0..=3 {
            assert_eq!(LockState::from_code(code).unwrap().code(), code);
            assert_eq!(ThermostatMode::from_code(code).unwrap().code(), code);
        }
        for code in 0..=4 {
            assert_eq!(SecurityState::from_code(code).unwrap().code(), code);
        }
    }

    #[test]
    fn position_state_wire_codes() {
        assert_eq!(PositionState::Stationary.code(), 0);
        assert_eq!(PositionState::Jammed.code(), 1);
        assert_eq!(PositionState::Oscillating.code(), 2);
    }

    #[test]
    fn out_of_range_codes_are_rejected() {
        assert!(LockState::from_code(4).is_err());
        assert!(ThermostatMode::from_code(4).is_err());
        assert!(SecurityState::from_code(5).is_err());
    }

    #[test]
    fn payloads_serialize_with_wire_names() {
        let payload = CoverStatePayload {
            side: CoverSide::Left.as_str(),
            current_position: 40,
            target_position: 100,
            position_state: PositionState::Stationary.as_str(),
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["currentPosition"], 40);
        assert_eq!(json["targetPosition"], 100);
        assert_eq!(json["positionState"], "STATIONARY");
    }
}
