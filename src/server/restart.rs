// Rebind module
// Drains a replaced listener after a reload moved the server

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// How long a replaced listener keeps accepting its backlog
pub const DRAIN_PERIOD: Duration = Duration::from_millis(100);

/// Accept whatever is queued on the old listener for `DRAIN_PERIOD`, then close it.
///
/// Connections accepted here skip the connection limit: they were already
/// queued by the kernel before the switch. Connections in flight keep running
/// in their own tasks after the listener is dropped.
pub async fn drain_old_listener(
    old_listener: TcpListener,
    state: Arc<config::AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    logger::log_debug(&format!(
        "[Restart] Draining old listener backlog for {}ms",
        DRAIN_PERIOD.as_millis()
    ));

    let drain_deadline = tokio::time::Instant::now() + DRAIN_PERIOD;
    let mut drained = 0usize;

    loop {
        tokio::select! {
            accept_result = old_listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        drained += 1;
                        accept_connection(stream, peer_addr, &state, &conn_counter, false, "OLD");
                    }
                    Err(e) => {
                        logger::log_error(&format!("[OLD] Accept error: {e}"));
                        break;
                    }
                }
            }

            () = tokio::time::sleep_until(drain_deadline) => break,
        }
    }

    drop(old_listener);
    logger::log_info(&format!(
        "[Restart] Old listener closed after draining {drained} connection(s)"
    ));
}
