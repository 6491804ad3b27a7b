use std::sync::Arc;

use grb_core::{completion::CompletionClient, config::Config};
use grb_openrouter::OpenRouterClient;

#[tokio::main]
async fn main() -> Result<(), grb_core::Error> {
    let cfg = Arc::new(Config::load()?);
    grb_core::logging::init("grb", &cfg.log_level)?;

    let llm: Arc<dyn CompletionClient> = Arc::new(OpenRouterClient::new(cfg.completion_config()));

    let result = grb_telegram::router::run_polling(cfg, llm.clone()).await;

    // Release the HTTP transport on every exit path.
    llm.close().await;

    result.map_err(|e| grb_core::Error::External(format!("telegram bot failed: {e}")))?;
    tracing::info!("bot stopped");
    Ok(())
}
