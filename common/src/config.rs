use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ThermostatMode;

/// Debounce and classification windows for physical push buttons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub debounce_ms: u64,
    /// A press within this window of the previous release counts toward a
    /// multi-press.
    pub repeat_window_ms: u64,
    pub long_press_ms: u64,
    pub max_repeat_presses: u8,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 20,
            repeat_window_ms: 350,
            long_press_ms: 4_000,
            max_repeat_presses: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long the lock stays unsecured before relocking itself.
    /// 0 disables auto-relock.
    pub auto_relock_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            auto_relock_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatConfig {
    /// Fan spin-up lag after the heater engages.
    pub heater_fan_delay_ms: u64,
    /// Cooler wants airflow immediately.
    pub cooler_fan_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub sensor_stale_timeout_ms: u64,
    pub min_valid_temp_c: f32,
    pub max_valid_temp_c: f32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            heater_fan_delay_ms: 30_000,
            cooler_fan_delay_ms: 0,
            poll_interval_ms: 10_000,
            sensor_stale_timeout_ms: 60_000,
            min_valid_temp_c: -40.0,
            max_valid_temp_c: 65.0,
        }
    }
}

/// User-adjustable thermostat settings, persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatSettings {
    pub target_c: f32,
    pub mode: ThermostatMode,
    pub heating_threshold_c: f32,
    pub cooling_threshold_c: f32,
}

impl Default for ThermostatSettings {
    fn default() -> Self {
        Self {
            target_c: 22.0,
            mode: ThermostatMode::Off,
            heating_threshold_c: 15.0,
            cooling_threshold_c: 25.0,
        }
    }
}

impl ThermostatSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heating_threshold_c >= self.cooling_threshold_c {
            return Err(ConfigError::InvertedThresholds {
                heating: self.heating_threshold_c,
                cooling: self.cooling_threshold_c,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Minimum stable time on the tamper loop before an edge is believed.
    pub tamper_stable_ms: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            tamper_stable_ms: 50,
        }
    }
}

/// Measured full-travel times for one cover, calibrated per direction
/// because motor load differs between raising and lowering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoverTravel {
    pub open_ms: u64,
    pub close_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverConfig {
    pub left: CoverTravel,
    pub right: CoverTravel,
    pub tick_ms: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            left: CoverTravel {
                open_ms: 4_300,
                close_ms: 5_900,
            },
            right: CoverTravel {
                open_ms: 6_000,
                close_ms: 7_000,
            },
            tick_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

/// Everything the controller loads at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub button: ButtonConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub thermostat: ThermostatConfig,
    #[serde(default)]
    pub settings: ThermostatSettings,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub cover: CoverConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl ButtonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.long_press_ms <= self.repeat_window_ms {
            return Err(ConfigError::LongPressInsideRepeatWindow {
                long_press_ms: self.long_press_ms,
                repeat_window_ms: self.repeat_window_ms,
            });
        }
        Ok(())
    }
}

impl ThermostatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_valid_temp_c >= self.max_valid_temp_c {
            return Err(ConfigError::EmptyTemperatureRange {
                min: self.min_valid_temp_c,
                max: self.max_valid_temp_c,
            });
        }
        Ok(())
    }
}

impl CoverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (side, travel) in [("left", self.left), ("right", self.right)] {
            if travel.open_ms == 0 || travel.close_ms == 0 {
                return Err(ConfigError::ZeroTravelTime { side });
            }
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroPollTick);
        }
        Ok(())
    }
}

impl RuntimeConfig {
    /// Startup gate: a config that fails here must prevent accessory
    /// activation rather than run with undefined behavior.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.button.validate()?;
        self.thermostat.validate()?;
        self.settings.validate()?;
        self.cover.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(RuntimeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn inverted_thresholds_fail_validation() {
        let mut config = RuntimeConfig::default();
        config.settings.heating_threshold_c = 25.0;
        config.settings.cooling_threshold_c = 15.0;

        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedThresholds {
                heating: 25.0,
                cooling: 15.0
            })
        );
    }

    #[test]
    fn zero_travel_time_fails_validation() {
        let mut config = RuntimeConfig::default();
        config.cover.right.close_ms = 0;

        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroTravelTime { side: "right" })
        );
    }
}
