//! Raffle Backend
//!
//! Off-chain service that runs a lottery round and keeps it moving. Runs four
//! concurrent subsystems around one shared [`Raffle`]:
//!
//! - **Keeper**: polls `check_upkeep` and starts draws.
//! - **Fulfiller**: answers randomness requests and settles rounds.
//! - **Event log**: consumes raffle observations into logs and metrics.
//! - **HTTP server**: entries, payouts, redelivery, liveness and status probes.

use actix_web::{App, HttpResponse, HttpServer, web};
use raffle::{ChannelSink, Raffle};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod coordinator;
mod events;
mod fulfiller;
mod keeper;
mod metrics;
mod treasury;
mod vrf;

use config::AppConfig;
use coordinator::{ChannelCoordinator, PendingRequest};
use fulfiller::ParkedRequests;
use metrics::Metrics;
use treasury::PayoutLedger;

/// The raffle as shared between the keeper, the fulfiller and HTTP handlers.
pub type SharedRaffle = Arc<Mutex<Raffle<ChannelCoordinator, PayoutLedger>>>;

/// Shared application state accessible from HTTP handlers.
struct AppState {
    raffle: SharedRaffle,
    /// Requests the fulfiller gave up on.
    parked: ParkedRequests,
    /// Fulfiller queue, for redelivery.
    fulfiller_tx: mpsc::Sender<PendingRequest>,
    /// Number of fulfillments currently in-flight.
    pending_count: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
struct EnterRequest {
    /// Base58 player address.
    player: String,
    /// Stake in lamports.
    amount: u64,
}

/// Liveness probe: returns 200 if the process is running.
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Current round snapshot.
async fn status(data: web::Data<AppState>) -> HttpResponse {
    let pending = data.pending_count.load(Ordering::Relaxed);
    let parked: Vec<u64> = data.parked.lock().await.keys().copied().collect();
    let raffle = data.raffle.lock().await;
    HttpResponse::Ok().json(serde_json::json!({
        "status": "running",
        "raffle_state": raffle.raffle_state(),
        "entrance_fee": raffle.entrance_fee(),
        "num_players": raffle.num_players(),
        "balance": raffle.balance(),
        "interval": raffle.interval(),
        "last_timestamp": raffle.last_timestamp(),
        "last_winner": raffle.last_winner().map(|w| w.to_string()),
        "pending_request": raffle.pending_request(),
        "upkeep_needed": raffle.check_upkeep(),
        "requests_issued": raffle.oracle().request_counter(),
        "payouts": raffle.transfer().payouts(),
        "total_paid": raffle.transfer().total_paid(),
        "pending_fulfillments": pending,
        "parked_requests": parked
    }))
}

async fn metrics_handler(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.metrics.to_json())
}

async fn enter(data: web::Data<AppState>, body: web::Json<EnterRequest>) -> HttpResponse {
    let player = match Pubkey::from_str(&body.player) {
        Ok(p) => p,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({"error": format!("invalid player: {e}")}));
        }
    };

    let mut raffle = data.raffle.lock().await;
    match raffle.enter(player, body.amount) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "player": player.to_string(),
            "num_players": raffle.num_players(),
            "balance": raffle.balance()
        })),
        Err(e) => {
            warn!(player = %player, amount = body.amount, error = %e, "Entry rejected");
            HttpResponse::Conflict().json(serde_json::json!({"error": e.to_string()}))
        }
    }
}

async fn payouts(data: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let player = match Pubkey::from_str(&path) {
        Ok(p) => p,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({"error": format!("invalid player: {e}")}));
        }
    };

    let raffle = data.raffle.lock().await;
    HttpResponse::Ok().json(serde_json::json!({
        "player": player.to_string(),
        "credited": raffle.transfer().balance_of(&player)
    }))
}

/// Push a parked request back to the fulfiller.
async fn redeliver(data: web::Data<AppState>, path: web::Path<u64>) -> HttpResponse {
    let request_id = path.into_inner();
    match fulfiller::redeliver(&data.parked, &data.fulfiller_tx, request_id).await {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({
            "request_id": request_id,
            "redelivered": true
        })),
        Ok(false) => HttpResponse::NotFound()
            .json(serde_json::json!({"error": format!("request {request_id} is not parked")})),
        Err(e) => {
            warn!(request_id, error = %e, "Redelivery failed");
            HttpResponse::ServiceUnavailable()
                .json(serde_json::json!({"error": format!("{e:#}")}))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actix_server=warn,actix_web=warn")),
        )
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let raffle_config = config.raffle_config();

    info!(
        coordinator = %raffle_config.coordinator,
        entrance_fee = config.entrance_fee,
        interval_secs = config.interval_secs,
        subscription_id = config.subscription_id,
        "Starting raffle backend"
    );

    let pending_count = Arc::new(AtomicU64::new(0));
    let metrics = Arc::new(Metrics::new());
    let (tx, rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let fulfiller_tx = tx.clone();
    let parked = ParkedRequests::default();
    let coordinator = ChannelCoordinator::new(config.subscription_id, config.max_num_words, tx);
    let mut raffle = Raffle::new(raffle_config, coordinator, PayoutLedger::default());
    raffle.subscribe(ChannelSink(event_tx));
    let raffle: SharedRaffle = Arc::new(Mutex::new(raffle));

    // Background: turn raffle events into logs and metrics.
    tokio::spawn(events::run_event_log(event_rx, metrics.clone()));

    // Background: start draws whenever upkeep is needed.
    let keeper_raffle = raffle.clone();
    let keeper_metrics = metrics.clone();
    let poll_interval = Duration::from_millis(config.keeper_poll_ms.max(1));
    tokio::spawn(async move {
        keeper::run_keeper(keeper_raffle, poll_interval, keeper_metrics).await;
    });

    // Background: answer randomness requests and settle rounds.
    let fulfiller_config = config.clone();
    let fulfiller_raffle = raffle.clone();
    let fulfiller_parked = parked.clone();
    let fulfiller_pending = pending_count.clone();
    let fulfiller_metrics = metrics.clone();
    tokio::spawn(async move {
        fulfiller::run_fulfiller(
            fulfiller_config,
            rx,
            fulfiller_raffle,
            fulfiller_parked,
            fulfiller_pending,
            fulfiller_metrics,
        )
        .await;
    });

    let state = web::Data::new(AppState {
        raffle,
        parked,
        fulfiller_tx,
        pending_count,
        metrics,
    });

    info!(port = config.http_port, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .route("/status", web::get().to(status))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/enter", web::post().to(enter))
            .route("/payouts/{player}", web::get().to(payouts))
            .route("/redeliver/{request_id}", web::post().to(redeliver))
    })
    .bind(("0.0.0.0", config.http_port))?
    .run()
    .await
}
