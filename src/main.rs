// src/main.rs
use std::sync::Arc;

use pravka::api::start_api_server;
use pravka::config::ApiConfig;
use pravka::llm_provider::OpenAiProvider;
use tracing::error;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Missing credential halts before anything else starts.
            error!("Configuration error: {}", e);
            eprintln!("⚠️ {}", e);
            std::process::exit(1);
        }
    };

    println!("📦 Model: {}", config.llm.model);

    let provider = Arc::new(OpenAiProvider::new(config.llm.clone()));

    println!("🚀 Starting server on http://{} ...", config.bind_addr());
    start_api_server(&config, provider).await
}
