mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    response::Redirect,
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use vizfeed_api::mail::{LogMailer, Mailer, resend::ResendMailer};
use vizfeed_api::state::{AppState, AppStateInner};
use vizfeed_api::viz::{VizRegistry, cleanup::run_sweep_loop};
use vizfeed_db::Database;

use crate::config::Config;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vizfeed=debug,vizfeed_server=debug,vizfeed_api=debug,vizfeed_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    info!("Database ready at {}", config.db_path.display());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let mailer: Arc<dyn Mailer> = match config.resend_api_key.clone() {
        Some(api_key) => {
            info!("Sending mail through Resend as {}", config.settings.mail_from);
            Arc::new(ResendMailer::new(
                http.clone(),
                api_key,
                config.settings.mail_from.clone(),
            ))
        }
        None => {
            info!("RESEND_API_KEY unset; outgoing mail is only logged");
            Arc::new(LogMailer)
        }
    };

    let viz = VizRegistry::with_capacity(config.viz_max_sessions);
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        settings: config.settings.clone(),
        mailer,
        http,
        viz: viz.clone(),
    });

    // Background sweep of abandoned viz sessions
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(run_sweep_loop(
        viz,
        config.viz_session_ttl,
        SWEEP_INTERVAL,
        shutdown.clone(),
    ));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/feed", get(|| async { Redirect::permanent("/") }))
        .merge(vizfeed_api::router(state));

    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("VizFeed server listening on {}", config.addr);
    info!(
        "Viz sessions expire after {}s without a signal",
        config.viz_session_ttl.as_secs()
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Viz sweep task failed: {}", e);
    }

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
