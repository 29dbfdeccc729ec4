//! HTTP surface tests: exercise the router with in-process requests against a
//! mock upstream and a temporary database.

use axum::http::StatusCode;
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use windfall::api::{self, AppState};
use windfall::datasource::MockCurtailmentSource;
use windfall::db::init_db;
use windfall::domain::{
    supported_profile_ids, CurtailmentRecord, Decimal, FarmId, SettlementPeriod,
    SUPPORTED_PROFILES,
};
use windfall::mining::DifficultySchedule;
use windfall::orchestration::{Ingestor, Orchestrator};
use windfall::reconcile::ReconciliationChecker;
use windfall::rollup::AggregateRebuilder;
use windfall::{Config, Repository};

struct TestApp {
    app: axum::Router,
    state: AppState,
    _temp: TempDir,
}

fn test_config() -> Config {
    Config {
        port: 0,
        database_path: ":memory:".to_string(),
        elexon_api_url: "http://example.invalid".to_string(),
        fetch_concurrency: 4,
        fetch_timeout_secs: 5,
        max_retry_attempts: 1,
        difficulty_file: None,
    }
}

async fn setup_test_app(source: MockCurtailmentSource) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let ingestor = Ingestor::new(Arc::new(source), repo.clone(), 4);
    let checker = ReconciliationChecker::new(
        repo.clone(),
        supported_profile_ids()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    let rebuilder = AggregateRebuilder::new(repo.clone());
    let orchestrator = Arc::new(Orchestrator::new(
        ingestor,
        repo.clone(),
        checker.clone(),
        rebuilder.clone(),
        SUPPORTED_PROFILES.to_vec(),
        Arc::new(DifficultySchedule::builtin()),
    ));

    let state = AppState::new(repo, test_config(), orchestrator, checker, rebuilder);
    let app = api::create_router(state.clone());

    TestApp {
        app,
        state,
        _temp: temp_dir,
    }
}

fn record(date: NaiveDate, period: u8, farm: &str, volume: &str) -> CurtailmentRecord {
    let volume = Decimal::from_str_canonical(volume).unwrap();
    let price = Decimal::from_str_canonical("-52").unwrap();
    CurtailmentRecord::new(
        date,
        SettlementPeriod::new(period).unwrap(),
        FarmId::new(farm.to_string()),
        "Test Wind Ltd".to_string(),
        volume,
        price,
        price,
        volume * price,
        true,
        false,
    )
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 28).unwrap()
}

async fn request(
    app: axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app(MockCurtailmentSource::new()).await;

    let (status, body) = request(test_app.app.clone(), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(test_app.app, "GET", "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_process_then_read_summaries() {
    let source = MockCurtailmentSource::new()
        .with_record(record(date(), 1, "FARM-A", "-100"))
        .with_record(record(date(), 2, "FARM-B", "-50"));
    let test_app = setup_test_app(source).await;

    let (status, body) = request(test_app.app.clone(), "POST", "/v1/process/2025-03-28").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], true);
    assert_eq!(body["records_ingested"], 2);
    assert_eq!(body["yields_computed"], 2 * SUPPORTED_PROFILES.len());
    assert_eq!(body["missing_after"], 0);

    let (status, body) = request(
        test_app.app.clone(),
        "GET",
        "/v1/summaries/daily?from=2025-03-28&to=2025-03-28",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summaries"][0]["total_volume_mwh"], "150");
    assert_eq!(body["summaries"][0]["total_payment"], "7800");
    assert_eq!(body["summaries"][0]["record_count"], 2);
    assert_eq!(
        body["mining"].as_array().unwrap().len(),
        SUPPORTED_PROFILES.len()
    );

    let (status, body) = request(
        test_app.app.clone(),
        "GET",
        "/v1/summaries/monthly?year=2025",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summaries"][0]["month"], 3);
    assert_eq!(body["summaries"][0]["total_volume_mwh"], "150");

    let (status, body) = request(test_app.app, "GET", "/v1/summaries/yearly").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summaries"][0]["year"], 2025);
    assert_eq!(body["summaries"][0]["total_volume_mwh"], "150");
}

#[tokio::test]
async fn test_reconciliation_endpoint_with_detail() {
    let source = MockCurtailmentSource::new().with_record(record(date(), 1, "FARM-A", "-100"));
    let test_app = setup_test_app(source).await;

    request(test_app.app.clone(), "POST", "/v1/process/2025-03-28").await;

    let (status, body) = request(
        test_app.app.clone(),
        "GET",
        "/v1/reconciliation?from=2025-03-28&to=2025-03-28",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], true);
    assert_eq!(body["total_missing"], 0);
    assert_eq!(body["dates"][0]["status"], "complete");
    assert!(body.get("missing").is_none());

    // Drop the derived rows and ask for the missing detail.
    test_app
        .state
        .repo
        .replace_mining_for_date(date(), &[])
        .await
        .unwrap();

    let (status, body) = request(
        test_app.app,
        "GET",
        "/v1/reconciliation?from=2025-03-28&to=2025-03-28&detail=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["complete"], false);
    assert_eq!(
        body["missing"].as_array().unwrap().len(),
        SUPPORTED_PROFILES.len()
    );
    assert_eq!(body["missing"][0]["farm_id"], "FARM-A");
}

#[tokio::test]
async fn test_verify_endpoint_reports_tampering() {
    let source = MockCurtailmentSource::new().with_record(record(date(), 1, "FARM-A", "-100"));
    let test_app = setup_test_app(source).await;

    request(test_app.app.clone(), "POST", "/v1/process/2025-03-28").await;

    let (status, body) = request(
        test_app.app.clone(),
        "GET",
        "/v1/summaries/verify?from=2025-03-28&to=2025-03-28",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
    assert_eq!(body["dates_checked"], 1);

    let mut tampered = test_app
        .state
        .repo
        .get_daily_summary(date())
        .await
        .unwrap()
        .unwrap();
    tampered.total_volume_mwh = Decimal::from_str_canonical("999").unwrap();
    test_app
        .state
        .repo
        .upsert_daily_summary(&tampered)
        .await
        .unwrap();

    let (status, body) = request(
        test_app.app,
        "GET",
        "/v1/summaries/verify?from=2025-03-28&to=2025-03-28",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], false);
    assert!(!body["inconsistencies"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_dates_rejected() {
    let test_app = setup_test_app(MockCurtailmentSource::new()).await;

    let (status, _) = request(test_app.app.clone(), "POST", "/v1/process/28-03-2025").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        test_app.app.clone(),
        "GET",
        "/v1/reconciliation?from=2025-03-28&to=not-a-date",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Inverted range.
    let (status, _) = request(
        test_app.app,
        "GET",
        "/v1/summaries/daily?from=2025-03-28&to=2025-03-01",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_upstream_down_returns_bad_gateway() {
    use windfall::datasource::DataSourceError;
    let source = MockCurtailmentSource::new().with_failures(
        48,
        DataSourceError::NetworkError("connection refused".to_string()),
    );
    let test_app = setup_test_app(source).await;

    let (status, body) = request(test_app.app, "POST", "/v1/process/2025-03-28").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("2025-03-28"));
}
