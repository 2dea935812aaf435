pub const TOPIC_SENSOR_TEMP: &str = "accessory/sensor/temperature";
pub const TOPIC_SENSOR_HUMIDITY: &str = "accessory/sensor/humidity";
pub const TOPIC_SENSOR_STATUS: &str = "accessory/sensor/status";

pub const TOPIC_CONTROLLER_STATE: &str = "accessory/controller/state";
pub const TOPIC_NOTIFY_PREFIX: &str = "accessory/notify";

pub const TOPIC_CMD_LOCK_TARGET: &str = "accessory/cmnd/lock/target";
pub const TOPIC_CMD_THERMOSTAT_MODE: &str = "accessory/cmnd/thermostat/mode";
pub const TOPIC_CMD_THERMOSTAT_TARGET: &str = "accessory/cmnd/thermostat/target";
pub const TOPIC_CMD_HEATING_THRESHOLD: &str = "accessory/cmnd/thermostat/heating_threshold";
pub const TOPIC_CMD_COOLING_THRESHOLD: &str = "accessory/cmnd/thermostat/cooling_threshold";
pub const TOPIC_CMD_SECURITY_TARGET: &str = "accessory/cmnd/security/target";
pub const TOPIC_CMD_COVER_LEFT_TARGET: &str = "accessory/cmnd/cover/left/target";
pub const TOPIC_CMD_COVER_RIGHT_TARGET: &str = "accessory/cmnd/cover/right/target";
