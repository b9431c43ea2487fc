use std::net::SocketAddr;

use match_orchestrator::{server::serve_match, AdvisoryChat, Match, MatchConfig, UciProcess};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => MatchConfig::from_json_file(path)?,
        None => MatchConfig::default(),
    };
    config.validate()?;

    let (engine, events) = UciProcess::spawn(&config.engine_path)?;
    info!(engine = %config.engine_path, "analysis engine started");

    let chat = AdvisoryChat::new(config.advisory_fallback_text.clone());
    let game = Match::new(config, Box::new(engine))?;
    let app = serve_match(game, events, chat).await;

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!(%addr, "match server listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
