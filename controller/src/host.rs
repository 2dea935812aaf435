use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use accessory_common::{
    ActuatorBank, Button, ButtonEvent, CoverEngine, CoverSide, CoverStatePayload, Effect, Gpio,
    LockEngine, LockState, LockStatePayload, MemoryGpio, PinMap, RuntimeConfig, SecurityEngine,
    SecurityState, SecurityStatePayload, ThermostatEngine, ThermostatMode,
    ThermostatStatePayload, Toggle, ToggleEvent, ValueError, TOPIC_CMD_COOLING_THRESHOLD,
    TOPIC_CMD_COVER_LEFT_TARGET, TOPIC_CMD_COVER_RIGHT_TARGET, TOPIC_CMD_HEATING_THRESHOLD,
    TOPIC_CMD_LOCK_TARGET, TOPIC_CMD_SECURITY_TARGET, TOPIC_CMD_THERMOSTAT_MODE,
    TOPIC_CMD_THERMOSTAT_TARGET, TOPIC_CONTROLLER_STATE, TOPIC_NOTIFY_PREFIX,
    TOPIC_SENSOR_HUMIDITY, TOPIC_SENSOR_STATUS, TOPIC_SENSOR_TEMP,
};

// Host-build input pins, mirroring the wiring on the target board.
const PIN_BUTTON: u8 = 0;
const PIN_TAMPER: u8 = 4;
const PIN_ARM_SWITCH: u8 = 5;
const PIN_REMOTE_LEFT_OPEN: u8 = 21;
const PIN_REMOTE_LEFT_CLOSE: u8 = 22;
const PIN_REMOTE_RIGHT_OPEN: u8 = 23;
const PIN_REMOTE_RIGHT_CLOSE: u8 = 25;

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

#[derive(Clone)]
struct AppState {
    lock: Arc<Mutex<LockEngine>>,
    thermostat: Arc<Mutex<ThermostatEngine>>,
    security: Arc<Mutex<SecurityEngine>>,
    covers: Arc<Mutex<CoverEngine>>,
    io: Arc<Mutex<IoBoard>>,
    config: Arc<RuntimeConfig>,
    mqtt: AsyncClient,
    store: AppStore,
}

/// Simulated board: pins plus the debouncers that watch them. One lock
/// because actuator writes and input sampling share the pin map.
struct IoBoard {
    gpio: MemoryGpio,
    bank: ActuatorBank,
    button: Button,
    arm_switch: Toggle,
    remotes: Vec<RemoteInput>,
}

struct RemoteInput {
    pin: u8,
    side: CoverSide,
    delta: i8,
    button: Button,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    positions_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CoverPositions {
    left: u8,
    right: u8,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    lock: LockStatePayload,
    thermostat: ThermostatStatePayload,
    security: SecurityStatePayload,
    covers: Vec<CoverStatePayload>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime
        .validate()
        .context("runtime configuration rejected")?;

    let mut lock = LockEngine::new(runtime.lock.clone());
    let thermostat =
        ThermostatEngine::new(runtime.thermostat.clone(), runtime.settings.clone())
            .context("thermostat configuration rejected")?;
    let security = SecurityEngine::new(runtime.security.clone());

    let mut covers = CoverEngine::new(&runtime.cover);
    let positions = store.load_positions().await.unwrap_or_else(|err| {
        warn!("failed to load cover positions from store: {err:#}");
        CoverPositions::default()
    });
    covers.left.restore_position(positions.left);
    covers.right.restore_position(positions.right);

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("accessory-controller-rust", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let mut gpio = MemoryGpio::new();
    let bank = ActuatorBank::new(PinMap::default(), &mut gpio);
    let io = IoBoard {
        gpio,
        bank,
        button: Button::new(runtime.button.clone()),
        arm_switch: Toggle::new(false, runtime.button.debounce_ms.max(1)),
        remotes: vec![
            RemoteInput::new(PIN_REMOTE_LEFT_OPEN, CoverSide::Left, 1, &runtime),
            RemoteInput::new(PIN_REMOTE_LEFT_CLOSE, CoverSide::Left, -1, &runtime),
            RemoteInput::new(PIN_REMOTE_RIGHT_OPEN, CoverSide::Right, 1, &runtime),
            RemoteInput::new(PIN_REMOTE_RIGHT_CLOSE, CoverSide::Right, -1, &runtime),
        ],
    };

    let startup_effects = lock.startup();

    let app_state = AppState {
        lock: Arc::new(Mutex::new(lock)),
        thermostat: Arc::new(Mutex::new(thermostat)),
        security: Arc::new(Mutex::new(security)),
        covers: Arc::new(Mutex::new(covers)),
        io: Arc::new(Mutex::new(io)),
        config: Arc::new(runtime),
        mqtt,
        store,
    };

    subscribe_topics(&app_state.mqtt).await?;
    apply_effects(&app_state, startup_effects).await;
    let security_startup = { app_state.security.lock().await.startup() };
    apply_effects(&app_state, security_startup).await;

    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_input_loop(app_state.clone());
    spawn_accessory_loop(app_state.clone());
    spawn_state_publish_loop(app_state.clone());

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/lock/target", post(handle_lock_target))
        .route("/api/thermostat/mode", post(handle_thermostat_mode))
        .route("/api/thermostat/target", post(handle_thermostat_target))
        .route(
            "/api/thermostat/heating-threshold",
            post(handle_heating_threshold),
        )
        .route(
            "/api/thermostat/cooling-threshold",
            post(handle_cooling_threshold),
        )
        .route("/api/security/target", post(handle_security_target))
        .route("/api/cover/{side}/target", post(handle_cover_target))
        .route("/api/sim/gpio", post(handle_sim_gpio))
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("0.0.0.0:{port}")
        .parse()
        .context("invalid controller listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

impl RemoteInput {
    fn new(pin: u8, side: CoverSide, delta: i8, runtime: &RuntimeConfig) -> Self {
        Self {
            pin,
            side,
            delta,
            button: Button::new(runtime.button.clone()),
        }
    }
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_SENSOR_TEMP,
        TOPIC_SENSOR_HUMIDITY,
        TOPIC_SENSOR_STATUS,
        TOPIC_CMD_LOCK_TARGET,
        TOPIC_CMD_THERMOSTAT_MODE,
        TOPIC_CMD_THERMOSTAT_TARGET,
        TOPIC_CMD_HEATING_THRESHOLD,
        TOPIC_CMD_COOLING_THRESHOLD,
        TOPIC_CMD_SECURITY_TARGET,
        TOPIC_CMD_COVER_LEFT_TARGET,
        TOPIC_CMD_COVER_RIGHT_TARGET,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Fast tick: samples every input pin and advances cover travel.
fn spawn_input_loop(app_state: AppState) {
    tokio::spawn(async move {
        let tick_ms = app_state.config.cover.tick_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let (button_event, arm_event, tamper_level, nudges) = {
                let mut io = app_state.io.lock().await;
                let io = &mut *io;

                let button_event = io.button.sample(io.gpio.read(PIN_BUTTON), now_ms);
                let arm_event = io.arm_switch.sample(io.gpio.read(PIN_ARM_SWITCH), now_ms);
                let tamper_level = io.gpio.read(PIN_TAMPER);

                let mut nudges = Vec::new();
                for remote in &mut io.remotes {
                    let level = io.gpio.read(remote.pin);
                    if remote.button.sample(level, now_ms) == Some(ButtonEvent::Single) {
                        nudges.push((remote.side, remote.delta));
                    }
                }

                (button_event, arm_event, tamper_level, nudges)
            };

            if let Some(event) = button_event {
                handle_button_event(&app_state, event, now_ms).await;
            }

            if let Some(event) = arm_event {
                let target = match event {
                    ToggleEvent::On => SecurityState::AwayArm,
                    ToggleEvent::Off => SecurityState::Disarmed,
                };
                let effects = { app_state.security.lock().await.set_target(target) };
                apply_effects(&app_state, effects).await;
            }

            let tamper_effects = {
                app_state
                    .security
                    .lock()
                    .await
                    .tamper_sample(tamper_level, now_ms)
            };
            apply_effects(&app_state, tamper_effects).await;

            let had_nudge = !nudges.is_empty();
            let cover_effects = {
                let mut covers = app_state.covers.lock().await;
                let mut effects = Vec::new();
                for (side, delta) in nudges {
                    effects.extend(covers.side_mut(side).nudge(delta, now_ms));
                }
                effects.extend(covers.tick(now_ms));
                effects
            };
            apply_effects(&app_state, cover_effects).await;
            if had_nudge {
                if let Err(err) = persist_positions(&app_state).await {
                    warn!("failed to persist cover positions: {err:#}");
                }
            }
        }
    });
}

/// Slow tick: lock auto-relock and thermostat fan-delay countdowns.
fn spawn_accessory_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let lock_effects = { app_state.lock.lock().await.tick(now_ms) };
            apply_effects(&app_state, lock_effects).await;

            let fan_effects = { app_state.thermostat.lock().await.tick(now_ms) };
            apply_effects(&app_state, fan_effects).await;
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;

            let status = build_status(&app_state).await;
            match serde_json::to_vec(&status) {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }
        }
    });
}

async fn handle_button_event(app_state: &AppState, event: ButtonEvent, now_ms: u64) {
    match event {
        // Single press toggles the lock.
        ButtonEvent::Single => {
            let effects = {
                let mut lock = app_state.lock.lock().await;
                let target = match lock.current() {
                    LockState::Secured => LockState::Unsecured,
                    _ => LockState::Secured,
                };
                lock.set_target(target, now_ms)
            };
            apply_effects(app_state, effects).await;
        }
        // Double press runs both covers to the opposite end.
        ButtonEvent::Double => {
            let effects = {
                let mut covers = app_state.covers.lock().await;
                let open = covers.left.target_position() == 0
                    && covers.right.target_position() == 0;
                let target = if open { 100 } else { 0 };
                let mut effects = covers.left.set_target(target, now_ms);
                effects.extend(covers.right.set_target(target, now_ms));
                effects
            };
            apply_effects(app_state, effects).await;
            if let Err(err) = persist_positions(app_state).await {
                warn!("failed to persist cover positions: {err:#}");
            }
        }
        // Triple press flips the thermostat between Off and Auto.
        ButtonEvent::Triple => {
            let effects = {
                let mut thermostat = app_state.thermostat.lock().await;
                let mode = if thermostat.settings().mode == ThermostatMode::Off {
                    ThermostatMode::Auto
                } else {
                    ThermostatMode::Off
                };
                thermostat.set_mode(mode, now_ms)
            };
            apply_effects(app_state, effects).await;
            if let Err(err) = persist_settings(app_state).await {
                warn!("failed to persist thermostat settings: {err:#}");
            }
        }
        // Hold disarms the panel.
        ButtonEvent::Long => {
            let effects = {
                app_state
                    .security
                    .lock()
                    .await
                    .set_target(SecurityState::Disarmed)
            };
            apply_effects(app_state, effects).await;
        }
    }
}

/// Every engine effect lands here: pin writes through the actuator bank,
/// notifications onto MQTT. Publish failures are logged and dropped so a
/// broker outage never wedges a transition.
async fn apply_effects(app_state: &AppState, effects: Vec<Effect>) {
    if effects.is_empty() {
        return;
    }

    {
        let mut io = app_state.io.lock().await;
        let io = &mut *io;
        for effect in &effects {
            io.bank.apply(&mut io.gpio, *effect);
        }
    }

    for effect in effects {
        if let Effect::Notify(characteristic, value) = effect {
            let topic = format!("{TOPIC_NOTIFY_PREFIX}/{}", characteristic.as_str());
            if let Err(err) = app_state
                .mqtt
                .publish(topic, QoS::AtLeastOnce, false, value.to_payload())
                .await
            {
                warn!("notify publish failed: {err}");
            }
        }
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let now_ms = monotonic_ms();

    match topic.as_str() {
        TOPIC_SENSOR_TEMP => {
            let limits = &app_state.config.thermostat;
            match message.parse::<f32>() {
                Ok(temp)
                    if temp.is_finite()
                        && (limits.min_valid_temp_c..=limits.max_valid_temp_c)
                            .contains(&temp) =>
                {
                    let effects = {
                        let mut thermostat = app_state.thermostat.lock().await;
                        let humidity = thermostat.current_humidity();
                        thermostat.update_sensor(temp, humidity, now_ms)
                    };
                    apply_effects(app_state, effects).await;
                }
                Ok(_) => warn!("dropping out-of-range temperature reading: {message}"),
                Err(_) => warn!("rejected non-numeric temperature reading: {message}"),
            }
        }
        TOPIC_SENSOR_HUMIDITY => {
            // Humidity is report-only; only a temperature reading refreshes
            // the staleness window or evaluates a transition.
            match message.parse::<f32>() {
                Ok(humidity) if humidity.is_finite() && (0.0..=100.0).contains(&humidity) => {
                    let effects =
                        { app_state.thermostat.lock().await.update_humidity(humidity) };
                    apply_effects(app_state, effects).await;
                }
                Ok(_) => warn!("dropping out-of-range humidity reading: {message}"),
                Err(_) => warn!("rejected non-numeric humidity reading: {message}"),
            }
        }
        TOPIC_SENSOR_STATUS => {
            if message.eq_ignore_ascii_case("offline") {
                app_state.thermostat.lock().await.sensor_read_failed();
                warn!("sensor reported offline; holding last HVAC state");
            }
        }
        TOPIC_CMD_LOCK_TARGET => match message.trim().parse::<u8>() {
            Ok(code) => match LockState::from_code(code) {
                Ok(target) => {
                    let effects = { app_state.lock.lock().await.set_target(target, now_ms) };
                    apply_effects(app_state, effects).await;
                }
                Err(err) => warn!("rejected lock target write: {err}"),
            },
            Err(_) => warn!("rejected non-numeric lock target: {message}"),
        },
        TOPIC_CMD_THERMOSTAT_MODE => {
            let mode = match message.trim().to_ascii_uppercase().as_str() {
                "OFF" => Some(ThermostatMode::Off),
                "HEAT" => Some(ThermostatMode::Heat),
                "COOL" => Some(ThermostatMode::Cool),
                "AUTO" => Some(ThermostatMode::Auto),
                _ => None,
            };
            match mode {
                Some(mode) => {
                    let effects = { app_state.thermostat.lock().await.set_mode(mode, now_ms) };
                    apply_effects(app_state, effects).await;
                    persist_settings(app_state).await?;
                }
                None => warn!("rejected thermostat mode write: {message}"),
            }
        }
        TOPIC_CMD_THERMOSTAT_TARGET => {
            if let Ok(target) = message.trim().parse::<f32>() {
                let result = {
                    app_state
                        .thermostat
                        .lock()
                        .await
                        .set_target_temperature(target, now_ms)
                };
                match result {
                    Ok(effects) => {
                        apply_effects(app_state, effects).await;
                        persist_settings(app_state).await?;
                    }
                    Err(err) => warn!("rejected target temperature write: {err}"),
                }
            }
        }
        TOPIC_CMD_HEATING_THRESHOLD => {
            if let Ok(threshold) = message.trim().parse::<f32>() {
                let result = {
                    app_state
                        .thermostat
                        .lock()
                        .await
                        .set_heating_threshold(threshold, now_ms)
                };
                match result {
                    Ok(effects) => {
                        apply_effects(app_state, effects).await;
                        persist_settings(app_state).await?;
                    }
                    Err(err) => warn!("rejected heating threshold write: {err}"),
                }
            }
        }
        TOPIC_CMD_COOLING_THRESHOLD => {
            if let Ok(threshold) = message.trim().parse::<f32>() {
                let result = {
                    app_state
                        .thermostat
                        .lock()
                        .await
                        .set_cooling_threshold(threshold, now_ms)
                };
                match result {
                    Ok(effects) => {
                        apply_effects(app_state, effects).await;
                        persist_settings(app_state).await?;
                    }
                    Err(err) => warn!("rejected cooling threshold write: {err}"),
                }
            }
        }
        TOPIC_CMD_SECURITY_TARGET => match message.trim().parse::<u8>() {
            Ok(code) => match SecurityState::from_code(code) {
                Ok(target) => {
                    let effects = { app_state.security.lock().await.set_target(target) };
                    apply_effects(app_state, effects).await;
                }
                Err(err) => warn!("rejected security target write: {err}"),
            },
            Err(_) => warn!("rejected non-numeric security target: {message}"),
        },
        TOPIC_CMD_COVER_LEFT_TARGET => {
            set_cover_target_from_text(app_state, CoverSide::Left, &message, now_ms).await;
        }
        TOPIC_CMD_COVER_RIGHT_TARGET => {
            set_cover_target_from_text(app_state, CoverSide::Right, &message, now_ms).await;
        }
        _ => {}
    }

    Ok(())
}

async fn set_cover_target_from_text(
    app_state: &AppState,
    side: CoverSide,
    message: &str,
    now_ms: u64,
) {
    match message.trim().parse::<u8>() {
        Ok(target) => {
            let effects = {
                app_state
                    .covers
                    .lock()
                    .await
                    .side_mut(side)
                    .set_target(target, now_ms)
            };
            apply_effects(app_state, effects).await;
            if let Err(err) = persist_positions(app_state).await {
                warn!("failed to persist cover positions: {err:#}");
            }
        }
        Err(_) => warn!("rejected cover target write: {message}"),
    }
}

async fn build_status(app_state: &AppState) -> StatusPayload {
    let now_ms = monotonic_ms();
    let lock = app_state.lock.lock().await.state_payload(now_ms);
    let thermostat = app_state.thermostat.lock().await.state_payload(now_ms);
    let security = app_state.security.lock().await.state_payload();
    let covers = {
        let covers = app_state.covers.lock().await;
        vec![covers.left.state_payload(), covers.right.state_payload()]
    };

    StatusPayload {
        lock,
        thermostat,
        security,
        covers,
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(build_status(&state).await)
}

async fn handle_lock_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let target = match value.parse::<u8>().map(LockState::from_code) {
        Ok(Ok(target)) => target,
        _ => return error_response(StatusCode::BAD_REQUEST, "Invalid lock target"),
    };

    let effects = {
        let mut lock = state.lock.lock().await;
        lock.set_target(target, monotonic_ms())
    };
    apply_effects(&state, effects).await;

    handle_get_status(State(state)).await.into_response()
}

async fn handle_thermostat_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    let mode = match value.to_ascii_uppercase().as_str() {
        "OFF" => ThermostatMode::Off,
        "HEAT" => ThermostatMode::Heat,
        "COOL" => ThermostatMode::Cool,
        "AUTO" => ThermostatMode::Auto,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid mode. Use 'OFF', 'HEAT', 'COOL' or 'AUTO'",
            )
        }
    };

    let effects = {
        let mut thermostat = state.thermostat.lock().await;
        thermostat.set_mode(mode, monotonic_ms())
    };
    apply_effects(&state, effects).await;

    if let Err(err) = persist_settings(&state).await {
        warn!("failed to persist mode update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_thermostat_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    thermostat_f32_write(state, params, |thermostat, value, now_ms| {
        thermostat.set_target_temperature(value, now_ms)
    })
    .await
}

async fn handle_heating_threshold(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    thermostat_f32_write(state, params, |thermostat, value, now_ms| {
        thermostat.set_heating_threshold(value, now_ms)
    })
    .await
}

async fn handle_cooling_threshold(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    thermostat_f32_write(state, params, |thermostat, value, now_ms| {
        thermostat.set_cooling_threshold(value, now_ms)
    })
    .await
}

async fn thermostat_f32_write<F>(
    state: AppState,
    params: HashMap<String, String>,
    write: F,
) -> axum::response::Response
where
    F: FnOnce(&mut ThermostatEngine, f32, u64) -> Result<Vec<Effect>, ValueError>,
{
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(value) = value.parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };

    let result = {
        let mut thermostat = state.thermostat.lock().await;
        write(&mut thermostat, value, monotonic_ms())
    };
    let effects = match result {
        Ok(effects) => effects,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    apply_effects(&state, effects).await;

    if let Err(err) = persist_settings(&state).await {
        warn!("failed to persist thermostat settings: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_security_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let target = match value.parse::<u8>().map(SecurityState::from_code) {
        Ok(Ok(target)) => target,
        _ => return error_response(StatusCode::BAD_REQUEST, "Invalid security target"),
    };

    let effects = { state.security.lock().await.set_target(target) };
    apply_effects(&state, effects).await;

    handle_get_status(State(state)).await.into_response()
}

async fn handle_cover_target(
    State(state): State<AppState>,
    Path(side): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let side = match side.to_ascii_lowercase().as_str() {
        "left" => CoverSide::Left,
        "right" => CoverSide::Right,
        _ => return error_response(StatusCode::NOT_FOUND, "Unknown cover side"),
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(target) = value.parse::<u8>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid position value (0-100)");
    };

    set_cover_target_from_text(&state, side, &target.to_string(), monotonic_ms()).await;

    handle_get_status(State(state)).await.into_response()
}

/// Host-build helper: drives a raw input pin level so the dashboard (or a
/// curl) can exercise buttons, the tamper loop and the remote without
/// hardware.
async fn handle_sim_gpio(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(pin) = params.get("pin").and_then(|value| value.parse::<u8>().ok()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid 'pin' parameter");
    };
    let Some(level) = params
        .get("level")
        .and_then(|value| value.parse::<bool>().ok())
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing or invalid 'level' parameter",
        );
    };

    {
        let mut io = state.io.lock().await;
        io.gpio.write(pin, level);
    }

    StatusCode::NO_CONTENT.into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("ACCESSORY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.accessory"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            positions_path: Arc::new(data_dir.join("positions.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }

    async fn load_positions(&self) -> anyhow::Result<CoverPositions> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.positions_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<CoverPositions>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(CoverPositions::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_positions(&self, positions: &CoverPositions) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.positions_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(positions)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}

async fn persist_settings(app_state: &AppState) -> anyhow::Result<()> {
    let settings = app_state.thermostat.lock().await.settings().clone();

    let mut runtime = app_state.store.load_runtime_config().await?;
    runtime.settings = settings;
    app_state.store.save_runtime_config(&runtime).await
}

/// Persists the commanded targets; on restart the covers adopt them as the
/// resting position rather than re-running the motors.
async fn persist_positions(app_state: &AppState) -> anyhow::Result<()> {
    let positions = {
        let covers = app_state.covers.lock().await;
        CoverPositions {
            left: covers.left.target_position(),
            right: covers.right.target_position(),
        }
    };
    app_state.store.save_positions(&positions).await
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
