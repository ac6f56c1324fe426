//! Application configuration loaded from environment variables.
//!
//! Required: `HMAC_SECRET`
//! Optional: `ENTRANCE_FEE_LAMPORTS`, `INTERVAL_SECS`, `GAS_LANE`,
//!           `SUBSCRIPTION_ID`, `CALLBACK_GAS_LIMIT`, `MAX_NUM_WORDS`,
//!           `COORDINATOR_KEYPAIR_PATH`, `KEEPER_POLL_MS`, `HTTP_PORT`,
//!           `MAX_RETRIES`, `INITIAL_RETRY_DELAY_MS`

use anyhow::{Context, Result};
use raffle::RaffleConfig;
use solana_sdk::signature::{Keypair, Signer, read_keypair_file};
use std::str::FromStr;
use std::sync::Arc;

/// Key hash of the default coordinator price tier.
const DEFAULT_GAS_LANE: &str = "5oM7Vb9xioeyEdFkPYbodNetNtERcdxVf63m8tQH1A3M";

/// Application configuration for the raffle backend.
#[derive(Clone)]
pub struct AppConfig {
    /// Minimum stake per entry, in lamports.
    pub entrance_fee: u64,
    /// Seconds between draws.
    pub interval_secs: i64,
    /// Coordinator price tier forwarded with every request.
    pub gas_lane: [u8; 32],
    /// Coordinator subscription paying for randomness.
    pub subscription_id: u64,
    /// Callback budget forwarded with every request.
    pub callback_gas_limit: u32,
    /// Upper bound on words a single request may ask for.
    pub max_num_words: u32,
    /// Identity of the coordinator; fulfillments are issued under this key.
    pub coordinator_keypair: Arc<Keypair>,
    /// Secret key for HMAC-SHA256 randomness generation.
    pub hmac_secret: Vec<u8>,
    /// How often the keeper polls `check_upkeep`, in milliseconds.
    pub keeper_poll_ms: u64,
    /// HTTP server port.
    pub http_port: u16,
    /// Maximum delivery attempts per fulfillment.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let entrance_fee = parse_or(&lookup, "ENTRANCE_FEE_LAMPORTS", 10_000_000)?;
        let interval_secs = parse_or(&lookup, "INTERVAL_SECS", 30)?;
        anyhow::ensure!(interval_secs >= 0, "INTERVAL_SECS must not be negative");

        let gas_lane_str = lookup("GAS_LANE").unwrap_or_else(|| DEFAULT_GAS_LANE.into());
        let gas_lane = parse_gas_lane(&gas_lane_str)
            .with_context(|| format!("invalid GAS_LANE: {gas_lane_str}"))?;

        let subscription_id = parse_or(&lookup, "SUBSCRIPTION_ID", 1)?;
        let callback_gas_limit = parse_or(&lookup, "CALLBACK_GAS_LIMIT", 500_000)?;
        let max_num_words = parse_or(&lookup, "MAX_NUM_WORDS", 500)?;

        let coordinator_keypair = match lookup("COORDINATOR_KEYPAIR_PATH") {
            Some(path) => {
                let path = shellexpand::tilde(&path).to_string();
                read_keypair_file(&path)
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .with_context(|| format!("failed to read keypair from {path}"))?
            }
            None => Keypair::new(),
        };

        let hmac_secret = lookup("HMAC_SECRET")
            .context("HMAC_SECRET env var must be set")?
            .into_bytes();

        let keeper_poll_ms = parse_or(&lookup, "KEEPER_POLL_MS", 1_000)?;
        let http_port = parse_or(&lookup, "HTTP_PORT", 8080)?;
        let max_retries = parse_or(&lookup, "MAX_RETRIES", 5)?;
        let initial_retry_delay_ms = parse_or(&lookup, "INITIAL_RETRY_DELAY_MS", 500)?;

        Ok(Self {
            entrance_fee,
            interval_secs,
            gas_lane,
            subscription_id,
            callback_gas_limit,
            max_num_words,
            coordinator_keypair: Arc::new(coordinator_keypair),
            hmac_secret,
            keeper_poll_ms,
            http_port,
            max_retries,
            initial_retry_delay_ms,
        })
    }

    /// Construction parameters for the raffle.
    pub fn raffle_config(&self) -> RaffleConfig {
        RaffleConfig {
            entrance_fee: self.entrance_fee,
            interval: self.interval_secs,
            gas_lane: self.gas_lane,
            subscription_id: self.subscription_id,
            callback_gas_limit: self.callback_gas_limit,
            coordinator: self.coordinator_keypair.pubkey(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

/// Decode a base58 key hash into its 32 raw bytes.
fn parse_gas_lane(s: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(s.trim()).into_vec()?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected 32 bytes, got {len}"))
}
