use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_registry::{
    AppState,
    config::{AppConfig, ConfigError, Env, LISTEN_ADDR},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    schema,
};

/// Everything that stops the process before it serves.
#[derive(Debug, Error)]
enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cannot bind or serve: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("FATAL: {}", StartupError::from(err));
            std::process::exit(1);
        }
    };

    init_logging(config.env);

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "startup failed");
        std::process::exit(1);
    }
}

/// Pretty logs locally, JSON lines in production. `RUST_LOG` overrides the default filter.
fn init_logging(env: Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "user_registry=debug,tower_http=info".into());

    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!("Application starting in {:?} mode", config.env);

    // An unreachable store is fatal; there is no retry.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(config.database.connect_options()?)
        .await?;

    schema::initialize(&pool).await?;

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(LISTEN_ADDR).await?;
    tracing::info!("Listening on {LISTEN_ADDR}");

    axum::serve(listener, app).await?;
    Ok(())
}
