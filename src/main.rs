use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use windfall::api;
use windfall::config::Config;
use windfall::datasource::{CurtailmentSource, ElexonSource};
use windfall::db::init_db;
use windfall::domain::{supported_profile_ids, SUPPORTED_PROFILES};
use windfall::mining::DifficultySchedule;
use windfall::orchestration::{Ingestor, Orchestrator};
use windfall::reconcile::ReconciliationChecker;
use windfall::rollup::AggregateRebuilder;
use windfall::Repository;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));

    let source: Arc<dyn CurtailmentSource> = Arc::new(ElexonSource::new(
        config.elexon_api_url.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
        config.max_retry_attempts,
    ));
    let ingestor = Ingestor::new(source, repo.clone(), config.fetch_concurrency);

    let difficulty = match &config.difficulty_file {
        Some(path) => match DifficultySchedule::from_json_file(path) {
            Ok(schedule) => schedule,
            Err(e) => {
                eprintln!("Failed to load difficulty schedule from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => DifficultySchedule::builtin(),
    };

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
        Arc::new(difficulty),
    ));

    // Create router
    let app = api::create_router(api::AppState::new(
        repo,
        config,
        orchestrator,
        checker,
        rebuilder,
    ));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
