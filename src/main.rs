use whisky_catalog::{
    api::{build_router, AppState},
    config::Config,
    connect,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config.observability);
    tracing::info!("Starting whisky-catalog v{}", env!("CARGO_PKG_VERSION"));

    let (db, search) = connect(&config)?;
    tracing::info!(path = ?config.database.path, "Database ready");

    // The index is optional; a failure here only degrades search
    if let Err(e) = search.ensure_index().await {
        tracing::warn!(error = %e, "Could not prepare the search index");
    }

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let app = build_router(AppState::new(db, search));
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API listening on http://{}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
