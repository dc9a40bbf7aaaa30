use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tuckshop_common::Secret;

const DEFAULT_CASH_EXPIRY: Duration = Duration::minutes(15);
const DEFAULT_MOBILE_EXPIRY: Duration = Duration::minutes(240);
const DEFAULT_RESERVATION_RETENTION: Duration = Duration::hours(24);
const DEFAULT_EXPIRY_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);
const DEFAULT_RECONCILIATION_INTERVAL: StdDuration = StdDuration::from_secs(86_400);
const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
const MIN_SECRET_LEN: usize = 16;

#[derive(Clone, Debug)]
pub struct PosConfig {
    pub database_url: String,
    /// The key used to sign redemption codes. Every instance pointing at the same database must share it, or codes
    /// issued by one counter will be rejected at another.
    pub redemption_secret: Secret<String>,
    /// How long an unpaid cash order holds its stock reservation before the expiry sweeper cancels it.
    pub cash_expiry: Duration,
    /// How long a mobile-money order's pickup code stays valid.
    pub mobile_expiry: Duration,
    /// How long reservation ledger entries on closed orders are kept before the reconciliation sweeper purges them.
    pub reservation_retention: Duration,
    pub expiry_sweep_interval: StdDuration,
    pub reconciliation_interval: StdDuration,
    /// The stock level at or below which a product is reported as running low.
    pub low_stock_threshold: i64,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            redemption_secret: random_secret(),
            cash_expiry: DEFAULT_CASH_EXPIRY,
            mobile_expiry: DEFAULT_MOBILE_EXPIRY,
            reservation_retention: DEFAULT_RESERVATION_RETENTION,
            expiry_sweep_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
            reconciliation_interval: DEFAULT_RECONCILIATION_INTERVAL,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

impl PosConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("TUCK_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TUCK_DATABASE_URL is not set. Please set it to the URL for the tuckshop database.");
            String::default()
        });
        let redemption_secret = match env::var("TUCK_REDEMPTION_SECRET") {
            Ok(s) if s.len() >= MIN_SECRET_LEN => Secret::new(s),
            Ok(s) => {
                warn!(
                    "🪛️ TUCK_REDEMPTION_SECRET is only {} characters long (minimum {MIN_SECRET_LEN}). It has been \
                     ignored.",
                    s.len()
                );
                random_secret()
            },
            Err(_) => random_secret(),
        };
        let (cash_expiry, mobile_expiry) = configure_expiry_windows();
        let reservation_retention = env::var("TUCK_RESERVATION_RETENTION_HOURS")
            .map_err(|_| {
                info!(
                    "🪛️ TUCK_RESERVATION_RETENTION_HOURS is not set. Using the default value of {} hrs.",
                    DEFAULT_RESERVATION_RETENTION.num_hours()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::hours)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TUCK_RESERVATION_RETENTION_HOURS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_RESERVATION_RETENTION);
        let expiry_sweep_interval =
            interval_from_env("TUCK_EXPIRY_SWEEP_INTERVAL_SECS", DEFAULT_EXPIRY_SWEEP_INTERVAL);
        let reconciliation_interval =
            interval_from_env("TUCK_RECONCILIATION_INTERVAL_SECS", DEFAULT_RECONCILIATION_INTERVAL);
        let low_stock_threshold = env::var("TUCK_LOW_STOCK_THRESHOLD")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TUCK_LOW_STOCK_THRESHOLD. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        Self {
            database_url,
            redemption_secret,
            cash_expiry,
            mobile_expiry,
            reservation_retention,
            expiry_sweep_interval,
            reconciliation_interval,
            low_stock_threshold,
        }
    }
}

fn configure_expiry_windows() -> (Duration, Duration) {
    let cash_expiry = env::var("TUCK_CASH_EXPIRY_MINUTES")
        .map_err(|_| {
            info!(
                "🪛️ TUCK_CASH_EXPIRY_MINUTES is not set. Using the default value of {} mins.",
                DEFAULT_CASH_EXPIRY.num_minutes()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for TUCK_CASH_EXPIRY_MINUTES. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_CASH_EXPIRY);
    let mobile_expiry = env::var("TUCK_MOBILE_EXPIRY_MINUTES")
        .map_err(|_| {
            info!(
                "🪛️ TUCK_MOBILE_EXPIRY_MINUTES is not set. Using the default value of {} mins.",
                DEFAULT_MOBILE_EXPIRY.num_minutes()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for TUCK_MOBILE_EXPIRY_MINUTES. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_MOBILE_EXPIRY);
    (cash_expiry, mobile_expiry)
}

fn interval_from_env(var: &str, default: StdDuration) -> StdDuration {
    env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}")).ok()
        })
        .map(StdDuration::from_secs)
        .unwrap_or(default)
}

fn random_secret() -> Secret<String> {
    warn!(
        "🚨️🚨️🚨️ The redemption code signing key has not been set. I'm using a random value for this session. DO NOT \
         operate on production like this, since codes issued now will stop verifying when the process restarts. Set \
         the TUCK_REDEMPTION_SECRET environment variable instead. 🚨️🚨️🚨️"
    );
    let secret: String = thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
    Secret::new(secret)
}
