use crate::config::{ThermostatConfig, ThermostatSettings};
use crate::error::{ConfigError, ValueError};
use crate::timer::{TimerId, TimerService};
use crate::types::{
    Actuator, Characteristic, Effect, HvacState, ThermostatMode, ThermostatStatePayload, Value,
};

// HomeKit-style characteristic ranges, enforced at the write boundary.
const TARGET_TEMP_MIN_C: f32 = 10.0;
const TARGET_TEMP_MAX_C: f32 = 38.0;
const HEATING_THRESHOLD_MIN_C: f32 = 0.0;
const HEATING_THRESHOLD_MAX_C: f32 = 25.0;
const COOLING_THRESHOLD_MIN_C: f32 = 10.0;
const COOLING_THRESHOLD_MAX_C: f32 = 35.0;

/// Heating/cooling engine. Transitions are evaluated only when a fresh
/// sensed temperature arrives or a target/mode/threshold changes; while the
/// sensor is stale the engine holds its last actuator state rather than
/// guessing.
#[derive(Debug)]
pub struct ThermostatEngine {
    config: ThermostatConfig,
    settings: ThermostatSettings,
    state: HvacState,
    current_temp_c: f32,
    current_humidity: f32,
    last_sensor_update_ms: Option<u64>,
    timers: TimerService,
    fan_delay: TimerId,
}

impl ThermostatEngine {
    /// Fails on an invalid threshold pair: the accessory must not activate
    /// with an undefined Auto tie-break.
    pub fn new(
        config: ThermostatConfig,
        settings: ThermostatSettings,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        settings.validate()?;

        let mut timers = TimerService::new();
        let fan_delay = timers.create();
        Ok(Self {
            config,
            settings,
            state: HvacState::Off,
            current_temp_c: 0.0,
            current_humidity: 0.0,
            last_sensor_update_ms: None,
            timers,
            fan_delay,
        })
    }

    pub fn state(&self) -> HvacState {
        self.state
    }

    pub fn settings(&self) -> &ThermostatSettings {
        &self.settings
    }

    pub fn current_temp_c(&self) -> f32 {
        self.current_temp_c
    }

    pub fn current_humidity(&self) -> f32 {
        self.current_humidity
    }

    pub fn is_sensor_fresh(&self, now_ms: u64) -> bool {
        self.last_sensor_update_ms
            .map(|last| now_ms.saturating_sub(last) < self.config.sensor_stale_timeout_ms)
            .unwrap_or(false)
    }

    /// A fresh, validated reading from the sensor collaborator.
    pub fn update_sensor(&mut self, temp_c: f32, humidity: f32, now_ms: u64) -> Vec<Effect> {
        self.current_temp_c = temp_c;
        self.current_humidity = humidity;
        self.last_sensor_update_ms = Some(now_ms);

        let mut effects = vec![
            Effect::Notify(Characteristic::CurrentTemperature, Value::F32(temp_c)),
            Effect::Notify(Characteristic::CurrentHumidity, Value::F32(humidity)),
        ];
        effects.extend(self.evaluate(now_ms));
        effects
    }

    /// Humidity arrives on its own topic and is report-only: it never
    /// refreshes the staleness window and never drives a transition.
    /// Until a real temperature has been measured the engine must not
    /// evaluate anything off its 0.0 placeholder.
    pub fn update_humidity(&mut self, humidity: f32) -> Vec<Effect> {
        self.current_humidity = humidity;
        vec![Effect::Notify(
            Characteristic::CurrentHumidity,
            Value::F32(humidity),
        )]
    }

    /// A failed read invalidates freshness immediately; the last value is
    /// retained for reporting but never drives another transition.
    pub fn sensor_read_failed(&mut self) {
        self.last_sensor_update_ms = None;
    }

    pub fn set_mode(&mut self, mode: ThermostatMode, now_ms: u64) -> Vec<Effect> {
        if self.settings.mode == mode {
            return Vec::new();
        }
        self.settings.mode = mode;
        if mode == ThermostatMode::Off {
            // Off does not wait for the next reading.
            return self.transition_to(HvacState::Off);
        }
        self.evaluate(now_ms)
    }

    pub fn set_target_temperature(
        &mut self,
        target_c: f32,
        now_ms: u64,
    ) -> Result<Vec<Effect>, ValueError> {
        Self::check_range(
            "target temperature",
            target_c,
            TARGET_TEMP_MIN_C,
            TARGET_TEMP_MAX_C,
        )?;
        self.settings.target_c = target_c;
        Ok(self.evaluate(now_ms))
    }

    pub fn set_heating_threshold(
        &mut self,
        threshold_c: f32,
        now_ms: u64,
    ) -> Result<Vec<Effect>, ValueError> {
        Self::check_range(
            "heating threshold",
            threshold_c,
            HEATING_THRESHOLD_MIN_C,
            HEATING_THRESHOLD_MAX_C,
        )?;
        if threshold_c >= self.settings.cooling_threshold_c {
            return Err(ValueError::WouldInvertThresholds {
                characteristic: "heating threshold",
                value: threshold_c,
            });
        }
        self.settings.heating_threshold_c = threshold_c;
        Ok(self.evaluate(now_ms))
    }

    pub fn set_cooling_threshold(
        &mut self,
        threshold_c: f32,
        now_ms: u64,
    ) -> Result<Vec<Effect>, ValueError> {
        Self::check_range(
            "cooling threshold",
            threshold_c,
            COOLING_THRESHOLD_MIN_C,
            COOLING_THRESHOLD_MAX_C,
        )?;
        if threshold_c <= self.settings.heating_threshold_c {
            return Err(ValueError::WouldInvertThresholds {
                characteristic: "cooling threshold",
                value: threshold_c,
            });
        }
        self.settings.cooling_threshold_c = threshold_c;
        Ok(self.evaluate(now_ms))
    }

    /// Poll the fan-delay countdown.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Effect> {
        if self.timers.poll(now_ms).contains(&self.fan_delay) {
            return vec![Effect::Assert(Actuator::Fan)];
        }
        Vec::new()
    }

    pub fn state_payload(&self, now_ms: u64) -> ThermostatStatePayload {
        ThermostatStatePayload {
            temp: self.current_temp_c,
            humidity: self.current_humidity,
            target: self.settings.target_c,
            heating_threshold: self.settings.heating_threshold_c,
            cooling_threshold: self.settings.cooling_threshold_c,
            mode: self.settings.mode.as_str(),
            state: self.state.as_str(),
            sensor_valid: self.is_sensor_fresh(now_ms),
        }
    }

    fn evaluate(&mut self, now_ms: u64) -> Vec<Effect> {
        if self.settings.mode != ThermostatMode::Off && !self.is_sensor_fresh(now_ms) {
            return Vec::new();
        }
        let desired = self.desired_state();
        self.transition_to_armed(desired, now_ms)
    }

    fn desired_state(&self) -> HvacState {
        let temp = self.current_temp_c;
        let settings = &self.settings;
        match settings.mode {
            ThermostatMode::Off => HvacState::Off,
            ThermostatMode::Heat if temp < settings.target_c => HvacState::Heating,
            ThermostatMode::Cool if temp > settings.target_c => HvacState::Cooling,
            ThermostatMode::Auto if temp < settings.heating_threshold_c => HvacState::Heating,
            ThermostatMode::Auto if temp > settings.cooling_threshold_c => HvacState::Cooling,
            _ => HvacState::Off,
        }
    }

    fn transition_to_armed(&mut self, desired: HvacState, now_ms: u64) -> Vec<Effect> {
        if desired == self.state {
            return Vec::new();
        }

        let mut effects = self.transition_to(desired);
        let fan_delay_ms = match desired {
            HvacState::Heating => Some(self.config.heater_fan_delay_ms),
            HvacState::Cooling => Some(self.config.cooler_fan_delay_ms),
            HvacState::Off => None,
        };
        if let Some(delay_ms) = fan_delay_ms {
            if delay_ms == 0 {
                effects.push(Effect::Assert(Actuator::Fan));
            } else {
                self.timers.arm(self.fan_delay, delay_ms, now_ms);
            }
        }
        effects
    }

    /// Shared entry/exit actions; fan scheduling is layered on by the
    /// caller because `set_mode(Off)` must work without a clock reading.
    fn transition_to(&mut self, desired: HvacState) -> Vec<Effect> {
        if desired == self.state {
            return Vec::new();
        }

        self.state = desired;
        self.timers.disarm(self.fan_delay);

        let mut effects = match desired {
            HvacState::Heating => vec![
                Effect::Release(Actuator::Cooler),
                Effect::Assert(Actuator::Heater),
                Effect::Release(Actuator::Fan),
            ],
            HvacState::Cooling => vec![
                Effect::Release(Actuator::Heater),
                Effect::Assert(Actuator::Cooler),
                Effect::Release(Actuator::Fan),
            ],
            HvacState::Off => vec![
                Effect::Release(Actuator::Heater),
                Effect::Release(Actuator::Cooler),
                Effect::Release(Actuator::Fan),
            ],
        };
        effects.push(Effect::Notify(
            Characteristic::CurrentHvacState,
            Value::U8(self.state.code()),
        ));
        effects
    }

    fn check_range(
        characteristic: &'static str,
        value: f32,
        min: f32,
        max: f32,
    ) -> Result<(), ValueError> {
        if !value.is_finite() {
            return Err(ValueError::NotANumber { characteristic });
        }
        if !(min..=max).contains(&value) {
            return Err(ValueError::OutOfRange {
                characteristic,
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn auto_engine() -> ThermostatEngine {
        let settings = ThermostatSettings {
            mode: ThermostatMode::Auto,
            heating_threshold_c: 15.0,
            cooling_threshold_c: 25.0,
            ..ThermostatSettings::default()
        };
        ThermostatEngine::new(ThermostatConfig::default(), settings).unwrap()
    }

    #[test]
    fn auto_mode_tie_break() {
        let mut engine = auto_engine();

        let effects = engine.update_sensor(10.0, 40.0, 1_000);
        assert_eq!(engine.state(), HvacState::Heating);
        assert!(effects.contains(&Effect::Assert(Actuator::Heater)));

        engine.update_sensor(30.0, 40.0, 2_000);
        assert_eq!(engine.state(), HvacState::Cooling);

        engine.update_sensor(20.0, 40.0, 3_000);
        assert_eq!(engine.state(), HvacState::Off);
    }

    #[test]
    fn inverted_thresholds_refuse_activation() {
        let settings = ThermostatSettings {
            heating_threshold_c: 25.0,
            cooling_threshold_c: 15.0,
            ..ThermostatSettings::default()
        };

        assert_eq!(
            ThermostatEngine::new(ThermostatConfig::default(), settings).err(),
            Some(ConfigError::InvertedThresholds {
                heating: 25.0,
                cooling: 15.0
            })
        );
    }

    #[test]
    fn entering_heating_delays_the_fan() {
        let mut engine = auto_engine();

        let effects = engine.update_sensor(10.0, 40.0, 0);
        assert!(effects.contains(&Effect::Release(Actuator::Fan)));
        assert!(!effects.contains(&Effect::Assert(Actuator::Fan)));

        assert_eq!(engine.tick(29_999), vec![]);
        assert_eq!(engine.tick(30_000), vec![Effect::Assert(Actuator::Fan)]);
        assert_eq!(engine.tick(40_000), vec![]);
    }

    #[test]
    fn entering_cooling_starts_the_fan_immediately() {
        let mut engine = auto_engine();

        let effects = engine.update_sensor(30.0, 40.0, 0);
        assert!(effects.contains(&Effect::Assert(Actuator::Cooler)));
        assert!(effects.contains(&Effect::Assert(Actuator::Fan)));
    }

    #[test]
    fn leaving_heating_before_fan_delay_cancels_the_fan() {
        let mut engine = auto_engine();
        engine.update_sensor(10.0, 40.0, 0);

        let effects = engine.update_sensor(20.0, 40.0, 5_000);
        assert!(effects.contains(&Effect::Release(Actuator::Fan)));
        assert_eq!(engine.state(), HvacState::Off);

        // The pending 30s fan delay was disarmed with the transition.
        assert_eq!(engine.tick(31_000), vec![]);
    }

    #[test]
    fn repeated_readings_in_the_same_band_produce_no_effects() {
        let mut engine = auto_engine();
        engine.update_sensor(10.0, 40.0, 0);

        let effects = engine.update_sensor(11.0, 40.0, 1_000);
        assert_eq!(
            effects,
            vec![
                Effect::Notify(Characteristic::CurrentTemperature, Value::F32(11.0)),
                Effect::Notify(Characteristic::CurrentHumidity, Value::F32(40.0)),
            ]
        );
    }

    #[test]
    fn heat_mode_follows_target_temperature() {
        let settings = ThermostatSettings {
            mode: ThermostatMode::Heat,
            target_c: 22.0,
            ..ThermostatSettings::default()
        };
        let mut engine = ThermostatEngine::new(ThermostatConfig::default(), settings).unwrap();

        engine.update_sensor(20.0, 40.0, 0);
        assert_eq!(engine.state(), HvacState::Heating);

        let effects = engine.set_target_temperature(18.0, 1_000).unwrap();
        assert_eq!(engine.state(), HvacState::Off);
        assert!(effects.contains(&Effect::Release(Actuator::Heater)));
    }

    #[test]
    fn humidity_alone_never_drives_a_transition() {
        let mut engine = auto_engine();

        // No temperature has ever been measured; a retained humidity
        // message can arrive first after a restart.
        let effects = engine.update_humidity(42.0);
        assert_eq!(
            effects,
            vec![Effect::Notify(
                Characteristic::CurrentHumidity,
                Value::F32(42.0)
            )]
        );
        assert_eq!(engine.state(), HvacState::Off);
        assert_eq!(engine.current_humidity(), 42.0);
        assert!(!engine.is_sensor_fresh(1_000));
    }

    #[test]
    fn stale_sensor_is_a_no_op_not_a_guess() {
        let mut engine = auto_engine();
        engine.update_sensor(10.0, 40.0, 0);
        assert_eq!(engine.state(), HvacState::Heating);

        engine.sensor_read_failed();

        // Threshold change while stale: no transition either way.
        let effects = engine.set_heating_threshold(5.0, 1_000).unwrap();
        assert_eq!(effects, vec![]);
        assert_eq!(engine.state(), HvacState::Heating);
        assert!(!engine.is_sensor_fresh(1_000));
    }

    #[test]
    fn mode_off_works_even_while_stale() {
        let mut engine = auto_engine();
        engine.update_sensor(10.0, 40.0, 0);
        engine.sensor_read_failed();

        let effects = engine.set_mode(ThermostatMode::Off, 1_000);
        assert_eq!(engine.state(), HvacState::Off);
        assert!(effects.contains(&Effect::Release(Actuator::Heater)));
        assert!(effects.contains(&Effect::Release(Actuator::Fan)));
    }

    #[test]
    fn threshold_writes_cannot_invert_the_pair() {
        let mut engine = auto_engine();

        assert_eq!(
            engine.set_heating_threshold(25.0, 0),
            Err(ValueError::WouldInvertThresholds {
                characteristic: "heating threshold",
                value: 25.0
            })
        );
        assert_eq!(
            engine.set_cooling_threshold(14.0, 0),
            Err(ValueError::WouldInvertThresholds {
                characteristic: "cooling threshold",
                value: 14.0
            })
        );
        // Both untouched.
        assert_eq!(engine.settings().heating_threshold_c, 15.0);
        assert_eq!(engine.settings().cooling_threshold_c, 25.0);
    }

    #[test]
    fn out_of_range_target_is_rejected() {
        let mut engine = auto_engine();

        assert!(engine.set_target_temperature(50.0, 0).is_err());
        assert!(engine.set_target_temperature(f32::NAN, 0).is_err());
        assert_eq!(engine.settings().target_c, 22.0);
    }

    #[test]
    fn redundant_mode_write_is_silent() {
        let mut engine = auto_engine();
        engine.update_sensor(20.0, 40.0, 0);

        assert_eq!(engine.set_mode(ThermostatMode::Auto, 1_000), vec![]);
    }
}
