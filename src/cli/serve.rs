use crate::{
    config::Settings,
    error, info,
    server::{AppState, start_api_server},
};

pub async fn serve(settings: Settings) {
    info!("Serving on http://{}", settings.server_addr);
    if let Err(e) = start_api_server(AppState::new(settings)).await {
        error!("Server stopped: {}", e);
    }
}
