use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wit_common::{MatchOrdering, Origin, Request, RuntimeConfig, Schedule, ScheduleForm};

use crate::{
    actuator::{Actuator, IrSend},
    controller::Controller,
    daemon::Scheduler,
    error::ActError,
    store::JsonFileStore,
};

const ENDPOINT: &str = "/wit";

type SharedController = Arc<Controller<JsonFileStore, IrSend>>;

#[derive(Clone)]
struct AppState {
    controller: SharedController,
    config: Arc<RuntimeConfig>,
    timezone: Option<Tz>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct DisplayView {
    running: bool,
    #[serde(rename = "override")]
    override_lock: bool,
    manual: bool,
    #[serde(rename = "opMode")]
    op_mode: String,
    schedule: String,
    #[serde(rename = "scheduledAction")]
    scheduled_action: Option<&'static str>,
    #[serde(rename = "operationModes")]
    operation_modes: Vec<String>,
    #[serde(rename = "homeUrl")]
    home_url: Option<String>,
    build: &'static str,
    time: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_runtime_config()?;
    let timezone = parse_timezone(&config.timezone)?;

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("failed to create data dir {}", config.data_dir))?;

    let controller = Controller::new(
        JsonFileStore::new(&config.data_dir),
        IrSend::new(config.lirc.clone()),
    );
    let state_path = controller.store().path().display().to_string();
    match controller.state().await {
        Ok(state) => info!(
            path = %state_path,
            running = state.running,
            locked = state.override_lock,
            manual = state.manual,
            "loaded state"
        ),
        Err(err) => warn!(path = %state_path, "state is not readable yet: {err}"),
    }

    let scheduler = Scheduler::new(
        controller.clone(),
        config.match_ordering,
        local_now(timezone).date_naive(),
    )
    .spawn(
        Duration::from_millis(config.scheduler_interval_ms),
        move || local_now(timezone),
    );

    let binding = normalize_binding(&config.binding);
    let app_state = AppState {
        controller,
        config: Arc::new(config),
        timezone,
    };
    let app = router(app_state);

    let addr: SocketAddr = binding
        .parse()
        .with_context(|| format!("invalid binding {binding}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}{ENDPOINT}/display");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    Ok(())
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route(&format!("{ENDPOINT}/display"), get(handle_display))
        .route(&format!("{ENDPOINT}/diagnostics"), get(handle_diagnostics))
        .route(&format!("{ENDPOINT}/{{action}}"), post(handle_action))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn handle_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let form = form.ok().map(|Form(pairs)| ScheduleForm::from_pairs(pairs));

    let result = match Request::from_name(&action, form) {
        Ok(request) => state.controller.act(request, Origin::Interactive).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(_) => Redirect::to(&format!("{ENDPOINT}/display")).into_response(),
        Err(err) => {
            warn!(action = %action, "action failed: {err}");
            act_error_response(&err)
        }
    }
}

async fn handle_display(State(state): State<AppState>) -> Response {
    let current = match state.controller.state().await {
        Ok(current) => current,
        Err(err) => {
            warn!("failed to read state: {err}");
            return act_error_response(&err);
        }
    };

    let now = local_now(state.timezone);
    let scheduled_action = Schedule::parse(&current.schedule)
        .ok()
        .and_then(|schedule| schedule.current_action(&now, state.config.match_ordering))
        .map(|action| action.as_str());

    Json(DisplayView {
        running: current.running,
        override_lock: current.override_lock,
        manual: current.manual,
        op_mode: current.op_mode,
        schedule: current.schedule,
        scheduled_action,
        operation_modes: state.config.op_modes.clone(),
        home_url: Some(state.config.home_url.clone()).filter(|url| !url.is_empty()),
        build: env!("CARGO_PKG_VERSION"),
        time: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    })
    .into_response()
}

async fn handle_diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.actuator().diagnostics())
}

fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let mut config = match std::env::var("WIT_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("invalid config file {path}"))?
        }
        Err(_) => RuntimeConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut RuntimeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(binding) = lookup("WIT_BINDING") {
        config.binding = binding;
    }
    if let Some(data_dir) = lookup("WIT_DATA_DIR") {
        config.data_dir = data_dir;
    }
    if let Some(remote) = lookup("WIT_LIRC_REMOTE") {
        config.lirc.remote = remote;
    }
    if let Some(device) = lookup("WIT_LIRC_DEVICE") {
        config.lirc.device = device;
    }
    if let Some(irsend) = lookup("WIT_IRSEND") {
        config.lirc.irsend = irsend;
    }
    if let Some(modes) = lookup("WIT_OPMODES") {
        config.set_op_modes(&modes);
    }
    if let Some(home) = lookup("WIT_HOME") {
        config.home_url = home;
    }
    if let Some(interval) = lookup("WIT_INTERVAL_MS").and_then(|value| value.parse::<u64>().ok()) {
        config.scheduler_interval_ms = interval;
    }
    if let Some(timezone) = lookup("WIT_TIMEZONE") {
        config.timezone = timezone;
    }
    if let Some(value) = lookup("WIT_MATCH_ORDERING") {
        match MatchOrdering::parse(&value) {
            Some(ordering) => config.match_ordering = ordering,
            None => warn!("ignoring unknown WIT_MATCH_ORDERING value '{value}'"),
        }
    }
}

fn parse_timezone(timezone: &str) -> anyhow::Result<Option<Tz>> {
    if timezone.is_empty() {
        return Ok(None);
    }
    timezone
        .parse::<Tz>()
        .map(Some)
        .map_err(|err| anyhow::anyhow!("invalid timezone '{timezone}': {err}"))
}

fn local_now(timezone: Option<Tz>) -> DateTime<FixedOffset> {
    match timezone {
        Some(tz) => {
            let local = Utc::now().with_timezone(&tz);
            local.with_timezone(&local.offset().fix())
        }
        None => Local::now().fixed_offset(),
    }
}

fn normalize_binding(binding: &str) -> String {
    if binding.starts_with(':') {
        format!("0.0.0.0{binding}")
    } else {
        binding.to_string()
    }
}

fn act_error_response(err: &ActError) -> Response {
    let status = match err {
        ActError::Request(_) | ActError::Schedule(_) => StatusCode::BAD_REQUEST,
        ActError::Store(_) | ActError::Actuator(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
