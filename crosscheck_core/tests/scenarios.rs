//! End-to-end scenarios over the in-memory stores: single-unit
//! comparisons, rule-assisted matching, bulk jobs with unit failures and
//! mid-flight cancellation.

use crosscheck_core::compare::ComparisonEngine;
use crosscheck_core::ignored::InMemoryIgnoredGames;
use crosscheck_core::jobs::{BulkJobRunner, InMemoryJobStore, JobConfig, JobStore};
use crosscheck_core::models::comparison::UnitContext;
use crosscheck_core::models::job::{JobFilters, JobStatus};
use crosscheck_core::models::record::{GameRecord, PlayerRecord};
use crosscheck_core::models::rule::{
    ComparisonSource, EquivalenceRule, FieldType, MappingRule, ModuleKind, RulePayload, RuleScope,
    ToleranceRule, ToleranceType,
};
use crosscheck_core::rules::store::InMemoryRuleStore;
use crosscheck_core::sources::{InMemoryTeamDirectory, RecordSource, SourceRegistry, TeamRef};
use crosscheck_core::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Fixed record source; every configured team answers instantly.
#[derive(Default)]
struct StaticSource {
    rosters: HashMap<String, Vec<PlayerRecord>>,
    schedules: HashMap<String, Vec<GameRecord>>,
}

impl StaticSource {
    fn with_roster(mut self, team_id: &str, players: Vec<PlayerRecord>) -> Self {
        self.rosters.insert(team_id.to_string(), players);
        self
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn players(&self, ctx: &UnitContext) -> Result<Vec<PlayerRecord>> {
        Ok(self.rosters.get(&ctx.team_id).cloned().unwrap_or_default())
    }

    async fn games(&self, ctx: &UnitContext) -> Result<Vec<GameRecord>> {
        Ok(self.schedules.get(&ctx.team_id).cloned().unwrap_or_default())
    }
}

fn team(id: &str) -> TeamRef {
    TeamRef {
        team_id: id.to_string(),
        name: id.to_string(),
        league: "league-1".to_string(),
        sport: Some("wbb".to_string()),
        conference: None,
        division: None,
    }
}

fn runner_with(
    rules: Vec<MappingRule>,
    teams: Vec<TeamRef>,
    scraped: StaticSource,
    source: StaticSource,
    config: JobConfig,
) -> (Arc<BulkJobRunner>, Arc<InMemoryJobStore>) {
    let rule_store = Arc::new(InMemoryRuleStore::with_rules(rules));
    let engine = ComparisonEngine::new(rule_store, Arc::new(InMemoryIgnoredGames::new()));
    let registry = Arc::new(
        SourceRegistry::new(Arc::new(scraped))
            .register(ComparisonSource::Oracle, Arc::new(source)),
    );
    let job_store = Arc::new(InMemoryJobStore::new());
    let runner = Arc::new(BulkJobRunner::new(
        engine,
        registry,
        Arc::new(InMemoryTeamDirectory::with_teams(teams)),
        job_store.clone(),
        config,
    ));
    (runner, job_store)
}

fn fast_config(concurrency: usize) -> JobConfig {
    JobConfig {
        concurrency,
        batch_delay: Duration::from_millis(5),
        unit_estimate: Duration::from_secs(1),
    }
}

// Scenario A: a team-level equivalence rule aligns "Bob Smith Jr." with
// "Smith, Bob" into one match with a mapped name and empty missing lists.
#[tokio::test]
async fn scenario_mapped_player_name() {
    let mapping = MappingRule::new(
        FieldType::Name,
        RuleScope::Team {
            team_id: "t1".to_string(),
        },
        RulePayload::Equivalence(EquivalenceRule {
            primary_value: "Bob Smith Jr.".to_string(),
            equivalents: vec!["Smith, Bob".to_string()],
            case_sensitive: false,
        }),
    );
    let scraped = StaticSource::default()
        .with_roster("t1", vec![PlayerRecord::named("Bob Smith Jr.")]);
    let source = StaticSource::default()
        .with_roster("t1", vec![PlayerRecord::named("Smith, Bob")]);
    let (runner, _) = runner_with(
        vec![mapping],
        vec![team("t1")],
        scraped,
        source,
        fast_config(3),
    );

    let ctx = UnitContext::new("t1", ModuleKind::Roster, ComparisonSource::Oracle);
    let result = runner.compare_unit(&ctx).await.unwrap();

    assert_eq!(result.matches.len(), 1);
    assert!(result.matches[0].mapped_fields.contains(&FieldType::Name));
    assert!(result.missing_in_scraped.is_empty());
    assert!(result.missing_in_source.is_empty());
    assert_eq!(result.match_percentage, 100);
}

// Scenario B: weight 205 vs 208 under an absolute tolerance of 5.
#[tokio::test]
async fn scenario_weight_tolerance() {
    fn roster(weight: &str) -> Vec<PlayerRecord> {
        let mut p = PlayerRecord::named("Al Jones");
        p.weight = Some(weight.to_string());
        vec![p]
    }

    for (tolerance, expect_match) in [(5.0, true), (2.0, false)] {
        let rule = MappingRule::new(
            FieldType::Weight,
            RuleScope::Global,
            RulePayload::Tolerance(ToleranceRule {
                tolerance,
                tolerance_type: ToleranceType::Absolute,
            }),
        );
        let (runner, _) = runner_with(
            vec![rule],
            vec![team("t1")],
            StaticSource::default().with_roster("t1", roster("205")),
            StaticSource::default().with_roster("t1", roster("208")),
            fast_config(3),
        );
        let ctx = UnitContext::new("t1", ModuleKind::Roster, ComparisonSource::Oracle);
        let result = runner.compare_unit(&ctx).await.unwrap();

        if expect_match {
            assert_eq!(result.matches.len(), 1, "tolerance {}", tolerance);
            assert!(result.matches[0].mapped_fields.contains(&FieldType::Weight));
        } else {
            assert_eq!(result.discrepancies.len(), 1, "tolerance {}", tolerance);
            let disc = &result.discrepancies[0].discrepancies[0];
            assert_eq!(disc.field, FieldType::Weight);
            assert_eq!(disc.scraped, "205");
            assert_eq!(disc.source, "208");
        }
    }
}

// Scenario C: 12 teams, concurrency 3, one unknown team. The job still
// completes; the bad unit is recorded with its error.
#[tokio::test]
async fn scenario_bulk_job_with_one_failing_unit() {
    let teams: Vec<TeamRef> = (1..=11).map(|i| team(&format!("t{}", i))).collect();
    let mut scraped = StaticSource::default();
    let mut source = StaticSource::default();
    for t in &teams {
        scraped = scraped.with_roster(&t.team_id, vec![PlayerRecord::named("Al Jones")]);
        source = source.with_roster(&t.team_id, vec![PlayerRecord::named("Al Jones")]);
    }
    // t12 is requested but unknown to the directory.
    let requested: Vec<String> = (1..=12).map(|i| format!("t{}", i)).collect();

    let (runner, store) = runner_with(vec![], teams, scraped, source, fast_config(3));
    let filters = JobFilters {
        teams: requested,
        modules: vec![ModuleKind::Roster],
        source: ComparisonSource::Oracle,
        ..Default::default()
    };
    let accepted = runner.submit(filters).await.unwrap();
    assert_eq!(accepted.total_operations, 12);

    let job = wait_for_terminal(&*store, accepted.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.completed, 12);
    assert_eq!(job.progress.failed, 1);
    assert_eq!(job.results.len(), 12);

    let failing = job
        .results
        .iter()
        .find(|r| r.team_id == "t12")
        .expect("failing unit recorded");
    assert!(failing.error.as_deref().unwrap().contains("not found"));
    assert!(failing.result.is_none());
}

// Scenario D: cancel lands while the runner sleeps between batches; the
// job ends cancelled with exactly the finished batches recorded.
#[tokio::test]
async fn scenario_cancel_between_batches() {
    let teams: Vec<TeamRef> = (1..=8).map(|i| team(&format!("t{}", i))).collect();
    let mut scraped = StaticSource::default();
    let mut source = StaticSource::default();
    for t in &teams {
        scraped = scraped.with_roster(&t.team_id, vec![PlayerRecord::named("Al Jones")]);
        source = source.with_roster(&t.team_id, vec![PlayerRecord::named("Al Jones")]);
    }

    let config = JobConfig {
        concurrency: 2,
        batch_delay: Duration::from_millis(800),
        unit_estimate: Duration::from_secs(1),
    };
    let (runner, store) = runner_with(vec![], teams, scraped, source, config);
    let filters = JobFilters {
        teams: (1..=8).map(|i| format!("t{}", i)).collect(),
        modules: vec![ModuleKind::Roster],
        source: ComparisonSource::Oracle,
        ..Default::default()
    };
    let accepted = runner.submit(filters).await.unwrap();

    // Wait for two full batches, then cancel inside the inter-batch delay.
    loop {
        let job = store.get(accepted.job_id).await.unwrap();
        if job.progress.completed >= 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    runner.cancel(accepted.job_id).await.unwrap();

    let job = wait_for_terminal(&*store, accepted.job_id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.results.len(), 4);
    assert_eq!(job.progress.completed, 4);

    // No further progress after the terminal state; a full batch-delay
    // later nothing new has been recorded.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let later = store.get(accepted.job_id).await.unwrap();
    assert_eq!(later.progress.completed, 4);
    assert_eq!(later.results.len(), 4);
}

#[tokio::test]
async fn cancel_is_idempotent_and_noop_when_terminal() {
    let (runner, store) = runner_with(
        vec![],
        vec![team("t1")],
        StaticSource::default().with_roster("t1", vec![]),
        StaticSource::default().with_roster("t1", vec![]),
        fast_config(3),
    );
    let filters = JobFilters {
        teams: vec!["t1".to_string()],
        modules: vec![ModuleKind::Roster],
        source: ComparisonSource::Oracle,
        ..Default::default()
    };
    let accepted = runner.submit(filters).await.unwrap();
    let done = wait_for_terminal(&*store, accepted.job_id).await;
    assert_eq!(done.status, JobStatus::Completed);

    let after_cancel = runner.cancel(accepted.job_id).await.unwrap();
    assert_eq!(after_cancel.status, JobStatus::Completed);
    let again = runner.cancel(accepted.job_id).await.unwrap();
    assert_eq!(again.status, JobStatus::Completed);
}

// Re-running an unchanged comparison yields identical summary counts.
#[tokio::test]
async fn comparison_is_idempotent() {
    let mut a = PlayerRecord::named("Al Jones");
    a.weight = Some("200".to_string());
    let mut b = PlayerRecord::named("Al Jones");
    b.weight = Some("210".to_string());

    let (runner, _) = runner_with(
        vec![],
        vec![team("t1")],
        StaticSource::default()
            .with_roster("t1", vec![a, PlayerRecord::named("Only Scraped")]),
        StaticSource::default()
            .with_roster("t1", vec![b, PlayerRecord::named("Only Source")]),
        fast_config(3),
    );
    let ctx = UnitContext::new("t1", ModuleKind::Roster, ComparisonSource::Oracle);

    let first = runner.compare_unit(&ctx).await.unwrap();
    let second = runner.compare_unit(&ctx).await.unwrap();
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.match_percentage, second.match_percentage);
    assert_eq!(first.total_scraped, second.total_scraped);
    assert_eq!(first.total_source, second.total_source);
}

// Removing a narrower-scope rule never makes a previously matched pair
// stricter when a broader rule still covers it.
#[tokio::test]
async fn resolver_relaxation_is_monotonic() {
    fn roster(weight: &str) -> Vec<PlayerRecord> {
        let mut p = PlayerRecord::named("Al Jones");
        p.weight = Some(weight.to_string());
        vec![p]
    }
    let global = MappingRule::new(
        FieldType::Weight,
        RuleScope::Global,
        RulePayload::Tolerance(ToleranceRule {
            tolerance: 5.0,
            tolerance_type: ToleranceType::Absolute,
        }),
    );
    let team_rule = MappingRule::new(
        FieldType::Weight,
        RuleScope::Team {
            team_id: "t1".to_string(),
        },
        RulePayload::Tolerance(ToleranceRule {
            tolerance: 10.0,
            tolerance_type: ToleranceType::Absolute,
        }),
    );

    for rules in [vec![global.clone(), team_rule], vec![global.clone()]] {
        let (runner, _) = runner_with(
            rules,
            vec![team("t1")],
            StaticSource::default().with_roster("t1", roster("205")),
            StaticSource::default().with_roster("t1", roster("208")),
            fast_config(3),
        );
        let ctx = UnitContext::new("t1", ModuleKind::Roster, ComparisonSource::Oracle);
        let result = runner.compare_unit(&ctx).await.unwrap();
        assert_eq!(result.matches.len(), 1);
    }
}

#[tokio::test]
async fn single_unit_unknown_team_is_not_found() {
    let (runner, _) = runner_with(
        vec![],
        vec![team("t1")],
        StaticSource::default(),
        StaticSource::default(),
        fast_config(3),
    );
    let ctx = UnitContext::new("ghost", ModuleKind::Schedule, ComparisonSource::Oracle);
    let err = runner.compare_unit(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

async fn wait_for_terminal(
    store: &dyn JobStore,
    job_id: uuid::Uuid,
) -> crosscheck_core::models::job::BulkJob {
    for _ in 0..500 {
        let job = store.get(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal status", job_id);
}
