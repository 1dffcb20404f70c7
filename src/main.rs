use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use school_chat::config::Config;
use school_chat::state::{AppState, ChatState};
use school_chat::{db, routes};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "school_chat=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    tokio::fs::create_dir_all(&config.data_dir).await.ok();

    let db_url = format!("sqlite:{}?mode=rwc", config.db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .expect("Failed to connect to database");

    db::schema::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Database migrations complete");

    let state = AppState {
        db: pool,
        config: config.clone(),
        chat: Arc::new(ChatState::new()),
    };

    let cors = CorsLayer::very_permissive();

    let app = routes::build_router(state)
        .layer(cors)
        .layer(tower_http::compression::CompressionLayer::new());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .await
        .expect("Server failed");
}
