mod config;
mod requests;

use crate::config::Config;
use crate::requests::{parse_request, reply_err, reply_ok, Handler};
use anyhow::{Context, Result};
use crosscheck_core::compare::ComparisonEngine;
use crosscheck_core::db::ignored::PgIgnoredGames;
use crosscheck_core::db::jobs::PgJobStore;
use crosscheck_core::db::rules::PgRuleStore;
use crosscheck_core::db::teams::PgTeamDirectory;
use crosscheck_core::db::{ensure_schema, pool};
use crosscheck_core::ignored::IgnoredGameStore;
use crosscheck_core::jobs::{BulkJobRunner, JobConfig, ProgressEvent};
use crosscheck_core::models::rule::ComparisonSource;
use crosscheck_core::redis::RedisBus;
use crosscheck_core::rules::store::RuleStore;
use crosscheck_core::sources::http::HttpRecordSource;
use crosscheck_core::sources::SourceRegistry;
use dotenv::dotenv;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting reconciliation orchestrator...");

    let config = Config::from_env();

    // Database
    let pool_config = pool::DbPoolConfig::from_env();
    let db = pool::create_pool(&config.database_url, &pool_config).await?;
    ensure_schema(&db).await?;

    // Redis
    let bus = RedisBus::connect(&config.redis_url)
        .await
        .context("Failed to connect to redis")?;

    // Stores and engine
    let rules: Arc<dyn RuleStore> = Arc::new(PgRuleStore::new(db.clone()));
    let ignored: Arc<dyn IgnoredGameStore> = Arc::new(PgIgnoredGames::new(db.clone()));
    let teams = Arc::new(PgTeamDirectory::new(db.clone()));
    let jobs = Arc::new(PgJobStore::new(db.clone()));
    let engine = ComparisonEngine::new(rules.clone(), ignored.clone());

    let mut registry = SourceRegistry::new(Arc::new(HttpRecordSource::new(
        config.scraped_base_url.clone(),
    )))
    .register(
        ComparisonSource::Oracle,
        Arc::new(HttpRecordSource::new(config.oracle_base_url.clone())),
    );
    if let Some(url) = &config.api_base_url {
        registry = registry.register(ComparisonSource::Api, Arc::new(HttpRecordSource::new(url)));
    }
    if let Some(url) = &config.baseline_base_url {
        registry = registry.register(
            ComparisonSource::Baseline,
            Arc::new(HttpRecordSource::new(url)),
        );
    }

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let runner = Arc::new(
        BulkJobRunner::new(
            engine,
            Arc::new(registry),
            teams,
            jobs,
            JobConfig {
                concurrency: config.concurrency,
                batch_delay: config.batch_delay,
                unit_estimate: config.unit_estimate,
            },
        )
        .with_progress(progress_tx),
    );

    let handler = Arc::new(Handler {
        rules: rules.clone(),
        ignored,
        runner,
    });

    let instance = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "recon-orchestrator".to_string());

    let mut tasks = Vec::new();

    // 1. Request listener
    {
        let bus_requests = bus.clone();
        let bus_replies = bus.clone();
        let handler = handler.clone();
        let request_channel = config.request_channel.clone();
        let reply_channel = config.reply_channel.clone();
        tasks.push(tokio::spawn(async move {
            let mut pubsub = match bus_requests.subscribe(&request_channel).await {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    error!("Failed to subscribe to {}: {}", request_channel, e);
                    return;
                }
            };
            info!("Listening for requests on {}", request_channel);
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let Ok(payload) = msg.get_payload::<String>() else {
                    continue;
                };
                let reply = match parse_request(&payload) {
                    Ok((request_id, request)) => match handler.dispatch(request).await {
                        Ok(data) => reply_ok(request_id.as_deref(), data),
                        Err(e) => {
                            warn!("request failed: {}", e);
                            reply_err(request_id.as_deref(), &e)
                        }
                    },
                    Err(e) => reply_err(None, &e),
                };
                if let Err(e) = bus_replies.publish_json(&reply_channel, &reply).await {
                    error!("Failed to publish reply: {}", e);
                }
            }
        }));
    }

    // 2. Progress publisher
    {
        let bus_progress = bus.clone();
        let progress_channel = config.progress_channel.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                let payload = serde_json::json!({
                    "instance": instance,
                    "event": event,
                });
                if let Err(e) = bus_progress.publish_json(&progress_channel, &payload).await {
                    error!("Failed to publish progress: {}", e);
                }
            }
        }));
    }

    // 3. Rule expiry sweep
    {
        let rules = rules.clone();
        let interval = config.expiry_sweep_interval_secs;
        tasks.push(tokio::spawn(async move {
            info!("Rule expiry sweep started (interval: {}s)", interval);
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;
                match rules.sweep_expired(chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(swept) => info!("Expired {} mapping rule(s)", swept),
                    Err(e) => warn!("Expiry sweep failed: {}", e),
                }
            }
        }));
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }

    Ok(())
}
