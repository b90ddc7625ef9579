use std::net::SocketAddr;

use athena::app;
use athena::extract::Calculation;
use athena::gemini::GeminiConfig;

/// Main entry point for the web application.
///
/// Reads the Gemini configuration from the environment (a `.env` file is
/// honored), then starts the server. `PORT` overrides the default 3000.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = GeminiConfig::from_env()?;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let on_analysis: athena::AnalysisListener = Box::new(|query: &str, result: &Calculation| {
        log::info!("Analysis complete for query: {}", query);
        log::info!(
            "Result: {}",
            serde_json::to_string(result).unwrap_or_default()
        );
    });

    app::run(config, addr, Some(on_analysis)).await
}
