pub mod actuator;
pub mod button;
pub mod config;
pub mod cover;
pub mod error;
pub mod lock;
pub mod security;
pub mod thermostat;
pub mod timer;
pub mod topics;
pub mod types;

pub use actuator::{ActuatorBank, ExclusiveGroup, Gpio, MemoryGpio, Output, PinMap};
pub use button::{Button, Toggle};
pub use config::{
    ButtonConfig, CoverConfig, CoverTravel, LockConfig, NetworkConfig, RuntimeConfig,
    SecurityConfig, ThermostatConfig, ThermostatSettings,
};
pub use cover::{Cover, CoverEngine};
pub use error::{ConfigError, ValueError};
pub use lock::LockEngine;
pub use security::SecurityEngine;
pub use thermostat::ThermostatEngine;
pub use timer::{TimerId, TimerService};
pub use topics::*;
pub use types::{
    Actuator, ButtonEvent, Characteristic, CoverSide, CoverStatePayload, Effect, HvacState,
    LockState, LockStatePayload, PositionState, SecurityState, SecurityStatePayload,
    ThermostatMode, ThermostatStatePayload, ToggleEvent, Value,
};
