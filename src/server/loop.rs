// Server loop module
// Accepts connections until shutdown, then drains in-flight connections

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::Shutdown;
use crate::config::AppState;
use crate::logger;

/// Accept connections until `shutdown` fires, then wait for active
/// connections to finish (bounded by `performance.shutdown_grace`).
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Shutdown>,
) {
    let mut shutdown_rx = shutdown.subscribe();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, shutdown.subscribe());
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown_rx.wait_for(|requested| *requested) => {
                break;
            }
        }
    }

    // Stop accepting before draining so new clients get a refused connection
    drop(listener);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    logger::log_shutdown_started(state.connection_count(), grace.as_secs());
    let remaining = drain_connections(&state, grace).await;
    logger::log_shutdown_complete(remaining);
}

/// Wait until no connection is active or `grace` elapses.
/// Returns the number of connections still open.
async fn drain_connections(state: &AppState, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        // Register interest before checking the count so a release in between is not missed
        let closed = state.connection_closed.notified();
        let active = state.connection_count();
        if active == 0 {
            return 0;
        }
        if tokio::time::timeout_at(deadline, closed).await.is_err() {
            return state.connection_count();
        }
    }
}
