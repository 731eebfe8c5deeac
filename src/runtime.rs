use tracing::info;

use crate::handlers::api::{self, AppState};

/// Serve the HTTP surface until the process is stopped.
pub async fn run_api(state: AppState, port: u16) {
    let routes = api::routes(state);
    info!(port, "starting calendar agent server");
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}
