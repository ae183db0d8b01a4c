use callhub::http::router;
use callhub::notify::ChangeNotifier;
use callhub::state::AppState;
use callhub_core::config::AppConfig;
use callhub_store::listener::ReconnectingListener;
use callhub_store::pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(bind = %config.http_bind_addr, "starting callhub");

    let db_pool = pool::connect(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("../callhub-store/migrations").run(&db_pool).await?;

    let state = AppState::new(db_pool, config.clone());

    let listener = ReconnectingListener::new(
        state.config.database_url.clone(),
        state.config.change_notification_channels.clone(),
    );
    let notifier = ChangeNotifier::new(state.pool.clone(), "public".to_string(), state.stream.clone());
    tokio::spawn(async move { notifier.run(listener).await });

    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(&state.config.http_bind_addr).await?;

    let drain_deadline = state.config.shutdown_drain_deadline;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_deadline))
        .await?;

    Ok(())
}

async fn shutdown_signal(drain_deadline: std::time::Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(?drain_deadline, "shutdown signal received, draining in-flight requests");
    tokio::time::sleep(drain_deadline).await;
}
