use std::sync::Arc;

use session_gate::config::GateConfig;
use session_gate::identity::gotrue::GoTrueConnector;
use session_gate::profile::{PgProfileSync, ProfileSync};
use session_gate::{db, routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = GateConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let connector = GoTrueConnector::new(config.identity.clone()).expect("identity client init failed");

    // Profile sync is optional: without a database, sign-in still works.
    let profiles: Option<Arc<dyn ProfileSync>> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!("profile sync enabled");
            Some(Arc::new(PgProfileSync::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; profile sync disabled");
            None
        }
    };

    tracing::info!(
        identity = %config.identity.base_url,
        site_dir = %config.site_dir.display(),
        cooldown_ms = u64::try_from(config.loop_breaker.cooldown.as_millis()).unwrap_or(u64::MAX),
        "gateway configured"
    );

    let state = state::AppState::new(config, Arc::new(connector), profiles);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "session-gate listening");
    axum::serve(listener, app).await.expect("server failed");
}
