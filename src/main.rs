mod config;
mod handlers;
mod models;
mod services;
mod web;

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use config::Config;
use handlers::{KitchenOrchestrator, KitchenState, NoticeBoard};
use services::GeminiService;
use web::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting Chef Nano...");

    let config = Config::from_env();
    let notices = Arc::new(NoticeBoard::new());

    if !config.is_configured() {
        log::warn!("⚠️ API_KEY not set, serving the setup screen instead of the kitchen");
    }

    let kitchen = config.api_key.as_ref().map(|api_key| {
        let gemini = GeminiService::new(
            api_key.clone(),
            config.text_model.clone(),
            config.image_model.clone(),
        )
        .with_api_base(config.api_base.clone());
        log::info!(
            "✅ Gemini service initialized (text: {}, image: {})",
            config.text_model,
            config.image_model
        );

        let kitchen = Arc::new(KitchenOrchestrator::new(Arc::new(gemini), notices.clone()));
        spawn_state_logger(&kitchen);
        kitchen
    });

    let app = create_router(kitchen, notices);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 Kitchen page on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}

/// Logs busy-state transitions as the orchestrator publishes them.
fn spawn_state_logger(kitchen: &KitchenOrchestrator) {
    let mut rx = kitchen.subscribe();
    tokio::spawn(async move {
        let mut last = busy_flags(&rx.borrow_and_update());
        while rx.changed().await.is_ok() {
            let flags = busy_flags(&rx.borrow_and_update());
            if flags != last {
                log::debug!(
                    "🔄 Busy flags: loading={} image_loading={} editing={}",
                    flags.0,
                    flags.1,
                    flags.2
                );
                last = flags;
            }
        }
    });
}

fn busy_flags(state: &KitchenState) -> (bool, bool, bool) {
    (state.is_loading(), state.is_image_loading(), state.is_editing())
}
