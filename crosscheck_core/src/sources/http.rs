//! HTTP record source. Covers the scraped-data store, the stats API and
//! baseline snapshot endpoints; they all expose the same roster/schedule
//! JSON shape behind different base URLs.

use super::RecordSource;
use crate::error::{ReconError, Result};
use crate::models::comparison::UnitContext;
use crate::models::record::{GameRecord, PlayerRecord};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Clone)]
pub struct HttpRecordSource {
    client: Client,
    base_url: String,
}

impl HttpRecordSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
        }
    }

    fn url(&self, team_id: &str, dataset: &str, ctx: &UnitContext) -> String {
        let mut url = format!(
            "{}/teams/{}/{}",
            self.base_url.trim_end_matches('/'),
            team_id,
            dataset
        );
        let mut params: Vec<String> = Vec::new();
        if let Some(season) = &ctx.season {
            params.push(format!("season={}", season));
        }
        if let Some(start) = ctx.start_date {
            params.push(format!("startDate={}", start));
        }
        if let Some(end) = ctx.end_date {
            params.push(format!("endDate={}", end));
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    async fn fetch(&self, url: &str) -> Result<serde_json::Value> {
        let resp = self.client.get(url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(ReconError::not_found("team", url)),
            status if !status.is_success() => Err(ReconError::upstream(format!(
                "{} returned {}",
                url, status
            ))),
            _ => Ok(resp.json().await?),
        }
    }
}

fn string_field(obj: &serde_json::Value, key: &str) -> Option<String> {
    match &obj[key] {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_players(data: &serde_json::Value) -> Vec<PlayerRecord> {
    let mut players = Vec::new();
    if let Some(items) = data["players"].as_array().or_else(|| data.as_array()) {
        for item in items {
            let Some(name) = string_field(item, "name") else {
                continue;
            };
            players.push(PlayerRecord {
                name,
                position: string_field(item, "position"),
                weight: string_field(item, "weight"),
                height: string_field(item, "height"),
                year: string_field(item, "year"),
                eligibility: string_field(item, "eligibility"),
                hometown: string_field(item, "hometown"),
                jersey: string_field(item, "jersey"),
            });
        }
    }
    players
}

fn parse_games(data: &serde_json::Value) -> Vec<GameRecord> {
    let mut games = Vec::new();
    if let Some(items) = data["games"].as_array().or_else(|| data.as_array()) {
        for item in items {
            let Some(date) = string_field(item, "date") else {
                continue;
            };
            games.push(GameRecord {
                date,
                opponent: string_field(item, "opponent"),
                venue: string_field(item, "venue"),
                tv: string_field(item, "tv"),
                location_indicator: string_field(item, "locationIndicator"),
                is_conference_game: string_field(item, "isConferenceGame"),
                time: string_field(item, "time"),
                location: string_field(item, "location"),
            });
        }
    }
    games
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn players(&self, ctx: &UnitContext) -> Result<Vec<PlayerRecord>> {
        let url = self.url(&ctx.team_id, "roster", ctx);
        let data = self.fetch(&url).await?;
        Ok(parse_players(&data))
    }

    async fn games(&self, ctx: &UnitContext) -> Result<Vec<GameRecord>> {
        let url = self.url(&ctx.team_id, "schedule", ctx);
        let data = self.fetch(&url).await?;
        Ok(parse_games(&data))
    }
}
