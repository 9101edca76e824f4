//! End-to-end tests against the stub API
//!
//! Each test starts an axum server on an ephemeral port, either the full
//! stub or a one-off router that misbehaves in a specific way, and drives
//! the real HTTP client, engine and runner against it.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::json;
use tokio::net::TcpListener;

use schouwen::cli::{dispatch, GlobalOptions};
use schouwen::commands::Commands;
use schouwen::common::config::{ApiConfig, Config, LookupConfig, Timeouts};
use schouwen::lookup::{LookupRow, PlLookup};
use schouwen::scenario::{
    run_scenario, ActionRecord, Catalog, RunLedger, RunOptions, ScenarioEngine, ScenarioName,
};
use schouwen::stub::{self, StubConfig};
use schouwen::{ApiClient, Bsn, EndDate, Error, ExpectedStatus, PlNumber, RemoteApi};

const TOKEN: &str = "test-token";

/// PL export covering every built-in scenario
const PL_EXPORT: &str = "\
Schouwen testset,,
PLnummer,Omschrijving,BSN
001,Basis,000000012
005,Verhuisd,999990500
150,Geemigreerd,999991500
501,Overleden,999995010
502,Overleden,999995020
503,Overleden,999995030
504,Overleden,999995040
505,Overleden,999995050
506,Overleden,999995060
507,Overleden,999995070
509,Overleden,999995090
V02,Verhuisd,999993653
V12,Verhuisd,999993124
";

/// Test context with a running server and on-disk fixtures
struct TestContext {
    /// Temporary directory holding the fixtures; removed on drop
    temp_dir: tempfile::TempDir,
    /// Base URL of the server under test
    base_url: String,
    /// Path of the PL export
    pl_file: PathBuf,
    /// Path of the run ledger
    ledger_path: PathBuf,
    /// Day the run is anchored to
    today: NaiveDate,
}

impl TestContext {
    /// Start the full stub API
    async fn with_stub() -> Self {
        let today = today();
        let router = stub::router(StubConfig {
            token: Some(TOKEN.to_string()),
            today: Some(today),
        });
        Self::with_router(router).await
    }

    /// Start an arbitrary router
    async fn with_router(router: Router) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pl_file = temp_dir.path().join("pl.csv");
        std::fs::write(&pl_file, PL_EXPORT).expect("Failed to write PL export");
        let ledger_path = temp_dir.path().join("ledger.json");

        let base_url = spawn(router).await;

        Self {
            temp_dir,
            base_url,
            pl_file,
            ledger_path,
            today: today(),
        }
    }

    fn config(&self) -> Config {
        config_for(&self.base_url, TOKEN)
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).expect("Failed to build client")
    }

    fn lookup(&self) -> PlLookup {
        PlLookup::from_path(&self.pl_file, &LookupConfig::default()).expect("Failed to load PL export")
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            today: self.today,
            verbose: false,
            quiet: true,
        }
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn config_for(base_url: &str, token: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: Some(base_url.to_string()),
            token: Some(token.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn bsn(s: &str) -> Bsn {
    Bsn::new(s).unwrap()
}

fn bsns(items: &[&str]) -> BTreeSet<Bsn> {
    items.iter().map(|s| bsn(s)).collect()
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    format!("http://{}", addr)
}

// === Indicator client ===

#[tokio::test]
async fn test_create_returns_far_future_end_date() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();

    let einddatum = client
        .upsert_indicator(&bsn("000000012"), EndDate::far_future(), ExpectedStatus::Exact(201))
        .await
        .unwrap();
    assert_eq!(einddatum, "2099-12-31");
}

#[tokio::test]
async fn test_second_upsert_is_not_a_create() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let person = bsn("000000012");

    client
        .create_indicator(&person, ExpectedStatus::Exact(201))
        .await
        .unwrap();

    // The stub answers 200 for an existing indicator
    let err = client
        .create_indicator(&person, ExpectedStatus::Exact(201))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));

    client
        .create_indicator(&person, ExpectedStatus::Class(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expire_twice_is_idempotent() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let person = bsn("999995010");

    let first = client
        .expire_indicator(&person, ctx.today, ExpectedStatus::Class(2))
        .await
        .unwrap();
    let second = client
        .expire_indicator(&person, ctx.today, ExpectedStatus::Class(2))
        .await
        .unwrap();

    assert_eq!(first, "2026-10-18");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_open_end_date_without_einddatum_is_protocol_error() {
    let ctx = TestContext::with_stub().await;
    let err = ctx
        .client()
        .upsert_indicator(&bsn("000000012"), EndDate::Open, ExpectedStatus::Unchecked)
        .await
        .unwrap_err();
    match err {
        Error::Protocol { url, message } => {
            assert!(url.ends_with("/volgindicaties/000000012"));
            assert!(message.contains("einddatum"));
        }
        other => panic!("Expected Protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found_status_is_protocol_error() {
    let router = Router::new().route(
        "/volgindicaties/:bsn",
        put(|| async { (StatusCode::NOT_FOUND, Json(json!({"title": "Not found"}))) }),
    );
    let ctx = TestContext::with_router(router).await;

    let err = ctx
        .client()
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap_err();
    match err {
        Error::Protocol { message, .. } => assert!(message.contains("got 404")),
        other => panic!("Expected Protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unchecked_status_still_requires_einddatum() {
    let router = Router::new().route(
        "/volgindicaties/:bsn",
        put(|| async { (StatusCode::ACCEPTED, Json(json!({"einddatum": "2099-12-31"}))) }),
    );
    let ctx = TestContext::with_router(router).await;
    let client = ctx.client();

    let einddatum = client
        .create_indicator(&bsn("000000012"), ExpectedStatus::Unchecked)
        .await
        .unwrap();
    assert_eq!(einddatum, "2099-12-31");
}

#[tokio::test]
async fn test_non_json_body_is_protocol_error() {
    let router = Router::new().route(
        "/volgindicaties/:bsn",
        put(|| async { (StatusCode::CREATED, "<html>gateway</html>") }),
    );
    let ctx = TestContext::with_router(router).await;

    let err = ctx
        .client()
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn test_identifier_with_reserved_characters_reaches_the_right_person() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let odd = bsn("12?x=1/3");

    let einddatum = client
        .create_indicator(&odd, ExpectedStatus::Exact(201))
        .await
        .unwrap();
    assert_eq!(einddatum, "2099-12-31");

    let changed = client.changed_since(ctx.today).await.unwrap();
    assert_eq!(changed, BTreeSet::from([odd]));
}

#[tokio::test]
async fn test_bsn_echo_check() {
    let router = Router::new().route(
        "/volgindicaties/:bsn",
        put(|| async {
            (
                StatusCode::CREATED,
                Json(json!({"burgerservicenummer": "111111110", "einddatum": "2099-12-31"})),
            )
        }),
    );
    let ctx = TestContext::with_router(router).await;

    let mut config = ctx.config();
    config.api.verify_bsn_echo = true;
    let strict = ApiClient::new(&config).unwrap();

    let err = strict
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));

    // Without the check the same response is accepted
    ctx.client()
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let ctx = TestContext::with_stub().await;
    let client = ApiClient::new(&config_for(&ctx.base_url, "wrong")).unwrap();

    let err = client
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap_err();
    match err {
        Error::Protocol { message, .. } => assert!(message.contains("got 401")),
        other => panic!("Expected Protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind and drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&config_for(&format!("http://{}", addr), TOKEN)).unwrap();
    let err = client
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"burgerservicenummers": []}))
        }),
    );
    let ctx = TestContext::with_router(router).await;

    let mut config = ctx.config();
    config.timeouts = Timeouts { request_secs: 1 };
    let client = ApiClient::new(&config).unwrap();

    let err = client.changed_since(ctx.today).await.unwrap_err();
    match err {
        Error::Transport { source, .. } => assert!(source.is_timeout()),
        other => panic!("Expected Transport error, got {other:?}"),
    }
}

// === Change-feed client ===

#[tokio::test]
async fn test_empty_change_feed_is_valid() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { Json(json!({"burgerservicenummers": []})) }),
    );
    let ctx = TestContext::with_router(router).await;

    let changed = ctx.client().changed_since(ctx.today).await.unwrap();
    assert!(changed.is_empty());
}

#[tokio::test]
async fn test_change_feed_without_field_is_protocol_error() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { Json(json!({"_links": {}})) }),
    );
    let ctx = TestContext::with_router(router).await;

    let err = ctx.client().changed_since(ctx.today).await.unwrap_err();
    match err {
        Error::Protocol { url, message } => {
            assert!(url.ends_with("/wijzigingen?vanaf=2026-10-19"));
            assert!(message.contains("burgerservicenummers"));
        }
        other => panic!("Expected Protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_change_feed_collapses_duplicates() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { Json(json!({"burgerservicenummers": ["2", "1", "2"]})) }),
    );
    let ctx = TestContext::with_router(router).await;

    let changed = ctx.client().changed_since(ctx.today).await.unwrap();
    assert_eq!(changed, bsns(&["1", "2"]));
}

#[tokio::test]
async fn test_change_feed_entries_are_kept_verbatim() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { Json(json!({"burgerservicenummers": [" 999993653"]})) }),
    );
    let ctx = TestContext::with_router(router).await;

    let changed = ctx.client().changed_since(ctx.today).await.unwrap();
    assert!(!changed.contains(&bsn("999993653")));
    assert_eq!(changed, bsns(&[" 999993653"]));
}

#[tokio::test]
async fn test_change_feed_non_string_entry_is_protocol_error() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { Json(json!({"burgerservicenummers": [999993653]})) }),
    );
    let ctx = TestContext::with_router(router).await;

    let err = ctx.client().changed_since(ctx.today).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn test_change_feed_server_error_is_protocol_error() {
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let ctx = TestContext::with_router(router).await;

    let err = ctx.client().changed_since(ctx.today).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn test_stub_feed_reports_only_recent_changes() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();

    client
        .create_indicator(&bsn("000000012"), ExpectedStatus::Class(2))
        .await
        .unwrap();

    let changed = client.changed_since(ctx.today).await.unwrap();
    assert_eq!(changed, bsns(&["000000012"]));

    let tomorrow = ctx.today.succ_opt().unwrap();
    assert!(client.changed_since(tomorrow).await.unwrap().is_empty());
}

// === Scenario engine ===

#[tokio::test]
async fn test_engine_setup_then_verify() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let lookup = ctx.lookup();
    let engine = ScenarioEngine::new(&client, &lookup, ctx.today);

    let place: Vec<PlNumber> = ["001", "V02"].into_iter().map(PlNumber::from).collect();
    let expire: Vec<PlNumber> = ["501", "502", "503", "504", "505", "506", "507", "509"]
        .into_iter()
        .map(PlNumber::from)
        .collect();

    let record = engine
        .setup(&place, &expire, ExpectedStatus::Class(2), ExpectedStatus::Class(2))
        .await
        .unwrap();
    assert_eq!(record.placed, bsns(&["000000012", "999993653"]));
    assert_eq!(record.expired.len(), 8);

    let reconciliation = engine
        .verify(&[PlNumber::from("V02")], &BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(reconciliation.required, bsns(&["999993653"]));
    assert!(reconciliation.extra.contains(&bsn("000000012")));
}

#[tokio::test]
async fn test_engine_verify_reports_missing() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let lookup = ctx.lookup();
    let engine = ScenarioEngine::new(&client, &lookup, ctx.today);

    engine
        .setup(&[PlNumber::from("001")], &[], ExpectedStatus::Class(2), ExpectedStatus::Class(2))
        .await
        .unwrap();

    let err = engine
        .verify(&[PlNumber::from("001"), PlNumber::from("V02")], &BTreeSet::new())
        .await
        .unwrap_err();
    match err {
        Error::ExpectationNotMet { missing } => assert_eq!(missing, bsns(&["999993653"])),
        other => panic!("Expected ExpectationNotMet, got {other:?}"),
    }
}

// === Runner ===

#[tokio::test]
async fn test_deel_4_then_verwacht() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let lookup = ctx.lookup();
    let catalog = Catalog::builtin();
    let mut ledger = RunLedger::load(&ctx.ledger_path).unwrap();

    let report = run_scenario(
        ScenarioName::Deel4,
        &catalog,
        &lookup,
        &client,
        &mut ledger,
        &ctx.options(),
    )
    .await
    .unwrap();
    assert!(report.passed, "deel_4 failed: {:?}", report.error);
    assert_eq!(report.steps_run, 10);
    assert_eq!(report.steps_total, 10);

    let record = ledger.get(ScenarioName::Deel4).unwrap();
    assert_eq!(record.executed_on, ctx.today);
    assert!(record.expired.contains(&bsn("999995090")));
    ledger.save(&ctx.ledger_path).unwrap();

    let mut ledger = RunLedger::load(&ctx.ledger_path).unwrap();
    let report = run_scenario(
        ScenarioName::Deel4Verwacht,
        &catalog,
        &lookup,
        &client,
        &mut ledger,
        &ctx.options(),
    )
    .await
    .unwrap();
    assert!(report.passed, "deel_4_verwacht failed: {:?}", report.error);
    assert_eq!(
        report.reconciliation.unwrap().required,
        bsns(&["999993653"])
    );
}

#[tokio::test]
async fn test_failed_action_scenario_is_not_recorded() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    // 005 and 150 are missing from this lookup
    let lookup = PlLookup::from_rows(vec![LookupRow::new("501", "999995010")]).unwrap();
    let catalog = Catalog::builtin();
    let mut ledger = RunLedger::default();

    let report = run_scenario(
        ScenarioName::Deel7,
        &catalog,
        &lookup,
        &client,
        &mut ledger,
        &ctx.options(),
    )
    .await
    .unwrap();

    assert!(!report.passed);
    assert_eq!(report.steps_run, 1);
    assert_eq!(report.error_code, Some("NOT_FOUND"));
    assert!(ledger.get(ScenarioName::Deel7).is_none());
}

#[tokio::test]
async fn test_verwacht_excludes_what_deel_4_expired() {
    // The feed only knows 005 and 150; 501 was retired by deel_4
    let router = Router::new().route(
        "/wijzigingen",
        get(|| async { Json(json!({"burgerservicenummers": ["999990500", "999991500"]})) }),
    );
    let ctx = TestContext::with_router(router).await;
    let client = ctx.client();
    let lookup = ctx.lookup();
    let catalog = Catalog::builtin();

    // Without a deel_4 run there is nothing to exclude
    let mut ledger = RunLedger::default();
    let report = run_scenario(
        ScenarioName::Deel7Verwacht,
        &catalog,
        &lookup,
        &client,
        &mut ledger,
        &ctx.options(),
    )
    .await
    .unwrap();
    assert!(!report.passed);
    assert_eq!(report.error_code, Some("EXPECTATION_NOT_MET"));
    assert!(report.error.unwrap().contains("999995010"));

    let mut record = ActionRecord::new(ctx.today);
    record.expired = bsns(&["999995010", "999995030"]);
    ledger.record(ScenarioName::Deel4, record);

    let report = run_scenario(
        ScenarioName::Deel7Verwacht,
        &catalog,
        &lookup,
        &client,
        &mut ledger,
        &ctx.options(),
    )
    .await
    .unwrap();
    assert!(report.passed, "deel_7_verwacht failed: {:?}", report.error);
    let reconciliation = report.reconciliation.unwrap();
    assert_eq!(reconciliation.excluded_hits, bsns(&["999995010"]));
    assert_eq!(reconciliation.required, bsns(&["999990500", "999991500"]));
}

#[tokio::test]
async fn test_reset_after_place() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let lookup = ctx.lookup();
    let catalog = Catalog::builtin();
    let mut ledger = RunLedger::default();

    for name in [ScenarioName::Deel9, ScenarioName::Deel9Reset] {
        let report = run_scenario(name, &catalog, &lookup, &client, &mut ledger, &ctx.options())
            .await
            .unwrap();
        assert!(report.passed, "{} failed: {:?}", name, report.error);
    }

    let reset = ledger.get(ScenarioName::Deel9Reset).unwrap();
    assert_eq!(reset.expired, bsns(&["999993124"]));
    assert!(reset.placed.is_empty());

    let einddatum = client
        .upsert_indicator(
            &bsn("999993124"),
            EndDate::yesterday(ctx.today),
            ExpectedStatus::Exact(200),
        )
        .await
        .unwrap();
    assert_eq!(einddatum, "2026-10-18");
}

#[tokio::test]
async fn test_yaml_catalog_override_runs() {
    let ctx = TestContext::with_stub().await;
    let client = ctx.client();
    let lookup = ctx.lookup();
    let catalog = Catalog::from_yaml(
        r#"
scenarios:
  deel_4:
    kind: place
    place: ["V12"]
    place_status: "201"
  deel_4_verwacht:
    kind: verify
    expect: ["V12"]
"#,
    )
    .unwrap();
    let mut ledger = RunLedger::default();

    for name in [ScenarioName::Deel4, ScenarioName::Deel4Verwacht] {
        let report = run_scenario(name, &catalog, &lookup, &client, &mut ledger, &ctx.options())
            .await
            .unwrap();
        assert!(report.passed, "{} failed: {:?}", name, report.error);
    }
}

// === CLI ===

fn run_command(ctx: &TestContext, part: ScenarioName, pl_file: PathBuf) -> Commands {
    Commands::Run {
        part,
        pl_file,
        catalog: None,
        ledger: Some(ctx.ledger_path.clone()),
        json: true,
    }
}

fn global_options(ctx: &TestContext) -> GlobalOptions {
    let config_path = ctx.temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!("[api]\nbase_url = \"{}\"\ntoken = \"{}\"\n", ctx.base_url, TOKEN),
    )
    .expect("Failed to write config");
    GlobalOptions {
        config: Some(config_path),
        verbose: false,
    }
}

#[tokio::test]
async fn test_run_command_saves_ledger_only_after_success() {
    let ctx = TestContext::with_stub().await;
    let global = global_options(&ctx);

    dispatch(run_command(&ctx, ScenarioName::Deel4, ctx.pl_file.clone()), &global)
        .await
        .unwrap();
    let saved = RunLedger::load(&ctx.ledger_path).unwrap();
    let record = saved.get(ScenarioName::Deel4).unwrap();
    assert!(record.expired.contains(&bsn("999995090")));

    // deel_7 cannot resolve 005 in an export without it
    let partial = ctx.temp_dir.path().join("partial.csv");
    std::fs::write(&partial, "Schouwen testset,,\nPLnummer,Omschrijving,BSN\n501,Overleden,999995010\n")
        .unwrap();
    let err = dispatch(run_command(&ctx, ScenarioName::Deel7, partial), &global)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ScenarioFailed { .. }));

    let after = RunLedger::load(&ctx.ledger_path).unwrap();
    assert_eq!(after, saved);
    assert!(after.get(ScenarioName::Deel7).is_none());
}
