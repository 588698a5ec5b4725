use crosscheck_core::jobs::MAX_CONCURRENCY;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub redis_url: String,
    pub database_url: String,
    pub request_channel: String,
    pub reply_channel: String,
    pub progress_channel: String,
    pub scraped_base_url: String,
    pub oracle_base_url: String,
    pub api_base_url: Option<String>,
    pub baseline_base_url: Option<String>,
    pub concurrency: usize,
    pub batch_delay: Duration,
    pub unit_estimate: Duration,
    pub expiry_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://redis:6379".to_string()),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            request_channel: env::var("RECON_REQUEST_CHANNEL")
                .unwrap_or_else(|_| "recon:requests".to_string()),
            reply_channel: env::var("RECON_REPLY_CHANNEL")
                .unwrap_or_else(|_| "recon:replies".to_string()),
            progress_channel: env::var("RECON_PROGRESS_CHANNEL")
                .unwrap_or_else(|_| "recon:progress".to_string()),
            scraped_base_url: env::var("SCRAPED_BASE_URL")
                .expect("SCRAPED_BASE_URL must be set"),
            oracle_base_url: env::var("ORACLE_BASE_URL").expect("ORACLE_BASE_URL must be set"),
            api_base_url: env::var("STATS_API_BASE_URL").ok(),
            baseline_base_url: env::var("BASELINE_BASE_URL").ok(),
            // Batch size never exceeds the engine ceiling.
            concurrency: env::var("RECON_CONCURRENCY")
                .unwrap_or_else(|_| "3".to_string())
                .parse::<usize>()
                .unwrap()
                .clamp(1, MAX_CONCURRENCY),
            // The authoritative source is rate limited; never go below 1s.
            batch_delay: Duration::from_secs(
                env::var("RECON_BATCH_DELAY_SECS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse::<u64>()
                    .unwrap()
                    .max(1),
            ),
            unit_estimate: Duration::from_secs(
                env::var("RECON_UNIT_ESTIMATE_SECS")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .unwrap(),
            ),
            expiry_sweep_interval_secs: env::var("RECON_EXPIRY_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap(),
        }
    }
}
