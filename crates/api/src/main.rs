use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use bestroute_api::build_app_from_env;
use bestroute_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("bestroute_api");

    let bind = env::var("BESTROUTE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let (app, state) = build_app_from_env()?;

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired(chrono::Utc::now());
            if removed > 0 {
                tracing::info!(removed, "expired search sessions purged");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(
        bind = %bind,
        backend = state.planner.backend_name(),
        "bestroute api started"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
