use thiserror::Error;

/// Invalid startup configuration. Fatal: the accessory must not activate
/// with one of these, there is no runtime recovery.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("heating threshold {heating} must be below cooling threshold {cooling}")]
    InvertedThresholds { heating: f32, cooling: f32 },
    #[error("{side} cover travel time must be non-zero")]
    ZeroTravelTime { side: &'static str },
    #[error("cover poll tick must be non-zero")]
    ZeroPollTick,
    #[error("button long-press threshold {long_press_ms}ms must exceed the repeat window {repeat_window_ms}ms")]
    LongPressInsideRepeatWindow {
        long_press_ms: u64,
        repeat_window_ms: u64,
    },
    #[error("temperature range [{min}, {max}] is empty")]
    EmptyTemperatureRange { min: f32, max: f32 },
}

/// Malformed or out-of-range value arriving from the protocol layer.
/// Rejected at the boundary: logged, no state mutation, no notification.
#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("unknown {characteristic} code {code}")]
    UnknownCode {
        characteristic: &'static str,
        code: u8,
    },
    #[error("{characteristic} {value} outside [{min}, {max}]")]
    OutOfRange {
        characteristic: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{characteristic} {value} would invert the heating/cooling threshold pair")]
    WouldInvertThresholds {
        characteristic: &'static str,
        value: f32,
    },
    #[error("{characteristic} is not a number")]
    NotANumber { characteristic: &'static str },
}
