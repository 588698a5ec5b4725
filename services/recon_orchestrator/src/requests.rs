//! Wire contract for the request channel: rule administration, single
//! and bulk comparisons, job control and the ignored-games list.

use chrono::NaiveDate;
use crosscheck_core::jobs::BulkJobRunner;
use crosscheck_core::models::comparison::UnitContext;
use crosscheck_core::models::job::JobFilters;
use crosscheck_core::models::rule::{
    ComparisonSource, ModuleKind, RuleAction, RuleDraft,
};
use crosscheck_core::rules::discovery;
use crosscheck_core::ignored::IgnoredGameStore;
use crosscheck_core::rules::store::RuleStore;
use crosscheck_core::{ReconError, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateRule {
        #[serde(flatten)]
        draft: RuleDraft,
    },
    UpdateRule {
        id: Uuid,
        #[serde(flatten)]
        draft: RuleDraft,
    },
    ImportRules {
        rules: Vec<RuleDraft>,
    },
    DeactivateRule {
        id: Uuid,
        #[serde(default)]
        note: Option<String>,
    },
    ConfirmSuggestion {
        id: Uuid,
        #[serde(default)]
        reviewer: Option<String>,
    },
    RejectSuggestion {
        id: Uuid,
        #[serde(default)]
        reviewer: Option<String>,
    },
    RunComparison {
        #[serde(rename = "teamId")]
        team_id: String,
        module: ModuleKind,
        source: ComparisonSource,
        #[serde(default)]
        league: Option<String>,
        #[serde(default)]
        sport: Option<String>,
        #[serde(default)]
        season: Option<String>,
        #[serde(default, rename = "startDate")]
        start_date: Option<NaiveDate>,
        #[serde(default, rename = "endDate")]
        end_date: Option<NaiveDate>,
    },
    RunBulk {
        #[serde(flatten)]
        filters: JobFilters,
    },
    JobStatus {
        #[serde(rename = "jobId")]
        job_id: Uuid,
    },
    CancelJob {
        #[serde(rename = "jobId")]
        job_id: Uuid,
    },
    IgnoreGame {
        #[serde(rename = "teamId")]
        team_id: String,
        module: ModuleKind,
        date: String,
        #[serde(default)]
        note: Option<String>,
    },
    UnignoreGame {
        #[serde(rename = "teamId")]
        team_id: String,
        module: ModuleKind,
        date: String,
    },
    ListIgnoredGames {
        #[serde(rename = "teamId")]
        team_id: String,
        module: ModuleKind,
    },
}

pub struct Handler {
    pub rules: Arc<dyn RuleStore>,
    pub ignored: Arc<dyn IgnoredGameStore>,
    pub runner: Arc<BulkJobRunner>,
}

impl Handler {
    pub async fn dispatch(&self, request: Request) -> Result<serde_json::Value> {
        match request {
            Request::CreateRule { draft } => {
                let rule = draft.into_rule(RuleAction::Created)?;
                let id = self.rules.insert(rule).await?;
                Ok(json!({ "id": id }))
            }
            Request::UpdateRule { id, draft } => {
                let existing = self.rules.get(id).await?;
                let updated = draft.apply_to(existing)?;
                self.rules.update(updated.clone()).await?;
                Ok(serde_json::to_value(updated)?)
            }
            Request::ImportRules { rules } => {
                let mut imported = Vec::new();
                let mut rejected = Vec::new();
                for (index, draft) in rules.into_iter().enumerate() {
                    match draft.into_rule(RuleAction::Imported) {
                        Ok(rule) => imported.push(self.rules.insert(rule).await?),
                        Err(e) => rejected.push(json!({ "index": index, "error": e.to_string() })),
                    }
                }
                Ok(json!({ "imported": imported, "rejected": rejected }))
            }
            Request::DeactivateRule { id, note } => {
                self.rules.set_active(id, false, note.as_deref()).await?;
                Ok(json!({ "id": id, "active": false }))
            }
            Request::ConfirmSuggestion { id, reviewer } => {
                let rule =
                    discovery::confirm_suggestion(&*self.rules, id, reviewer.as_deref()).await?;
                Ok(serde_json::to_value(rule)?)
            }
            Request::RejectSuggestion { id, reviewer } => {
                let rule =
                    discovery::reject_suggestion(&*self.rules, id, reviewer.as_deref()).await?;
                Ok(serde_json::to_value(rule)?)
            }
            Request::RunComparison {
                team_id,
                module,
                source,
                league,
                sport,
                season,
                start_date,
                end_date,
            } => {
                let mut ctx = UnitContext::new(team_id, module, source);
                ctx.league = league;
                ctx.sport = sport;
                ctx.season = season;
                ctx.start_date = start_date;
                ctx.end_date = end_date;
                let result = self.runner.compare_unit(&ctx).await?;
                Ok(serde_json::to_value(result)?)
            }
            Request::RunBulk { filters } => {
                let accepted = self.runner.submit(filters).await?;
                Ok(serde_json::to_value(accepted)?)
            }
            Request::JobStatus { job_id } => {
                let job = self.runner.store().get(job_id).await?;
                Ok(serde_json::to_value(job)?)
            }
            Request::CancelJob { job_id } => {
                let job = self.runner.cancel(job_id).await?;
                Ok(serde_json::to_value(job)?)
            }
            Request::IgnoreGame {
                team_id,
                module,
                date,
                note,
            } => {
                self.ignored
                    .add(&team_id, module, &date, note.as_deref())
                    .await?;
                Ok(json!({ "teamId": team_id, "module": module, "date": date }))
            }
            Request::UnignoreGame {
                team_id,
                module,
                date,
            } => {
                let removed = self.ignored.remove(&team_id, module, &date).await?;
                Ok(json!({ "removed": removed }))
            }
            Request::ListIgnoredGames { team_id, module } => {
                let dates = self.ignored.list(&team_id, module).await?;
                Ok(json!({ "teamId": team_id, "module": module, "dates": dates }))
            }
        }
    }
}

/// Parse an incoming payload, surfacing malformed requests as validation
/// errors rather than silent drops.
pub fn parse_request(payload: &str) -> Result<(Option<String>, Request)> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| ReconError::validation(format!("malformed request: {}", e)))?;
    let request_id = value["requestId"].as_str().map(str::to_string);
    let request: Request = serde_json::from_value(value)
        .map_err(|e| ReconError::validation(format!("malformed request: {}", e)))?;
    Ok((request_id, request))
}

pub fn reply_ok(request_id: Option<&str>, data: serde_json::Value) -> serde_json::Value {
    json!({ "requestId": request_id, "status": "ok", "data": data })
}

pub fn reply_err(request_id: Option<&str>, error: &ReconError) -> serde_json::Value {
    json!({
        "requestId": request_id,
        "status": "error",
        "kind": error.kind(),
        "error": error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_comparison() {
        let payload = r#"{
            "op": "run_comparison",
            "requestId": "r-1",
            "teamId": "t1",
            "module": "roster",
            "source": "oracle",
            "season": "2025-26"
        }"#;
        let (request_id, request) = parse_request(payload).unwrap();
        assert_eq!(request_id.as_deref(), Some("r-1"));
        match request {
            Request::RunComparison {
                team_id, module, ..
            } => {
                assert_eq!(team_id, "t1");
                assert_eq!(module, ModuleKind::Roster);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_rule() {
        let payload = r#"{
            "op": "create_rule",
            "fieldType": "weight",
            "scope": {"level": "team", "teamId": "t1"},
            "mappingType": "tolerance",
            "rules": {"tolerance": 5, "toleranceType": "absolute"},
            "appliesTo": {"scraped": true, "api": true, "oracle": true}
        }"#;
        let (_, request) = parse_request(payload).unwrap();
        assert!(matches!(request, Request::CreateRule { .. }));
    }

    #[test]
    fn test_malformed_request_is_validation_error() {
        let err = parse_request("{\"op\": \"no_such_op\"}").unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = parse_request("not json").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_parse_bulk_requires_shape() {
        let payload = r#"{
            "op": "run_bulk",
            "league": "acc",
            "modules": ["roster", "schedule"],
            "source": "api",
            "season": "2025-26"
        }"#;
        let (_, request) = parse_request(payload).unwrap();
        match request {
            Request::RunBulk { filters } => {
                assert_eq!(filters.modules.len(), 2);
                assert!(filters.validate().is_ok());
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }
}
