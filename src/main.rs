use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use sakubun_server::config::Config;
use sakubun_server::feedback::FeedbackService;
use sakubun_server::generation::transport::GeminiTransport;
use sakubun_server::generation::GenerationClient;
use sakubun_server::http::{create_router, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let transport = Arc::new(GeminiTransport::new(config.base_url.clone()));
    let client = GenerationClient::new(
        transport,
        config.api_key.clone(),
        config.models.fallback_model.clone(),
    );
    let service = FeedbackService::new(Arc::new(client), config.models.clone());
    let app = create_router(Arc::new(AppState::new(service)));

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!(
                "Invalid listen address {}:{}: {}",
                config.bind_addr, config.port, e
            );
            return;
        }
    };
    let listener = TcpListener::bind(addr).await.expect("Failed to bind");
    info!(
        "Feedback server listening on http://{} (model {}, pro {}, fallback {})",
        addr, config.models.default_model, config.models.pro_model, config.models.fallback_model
    );

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
