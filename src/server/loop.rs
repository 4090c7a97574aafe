// Server loop module
// Accepts connections until shutdown and rebinds when a reload moves the server

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::listener::create_reusable_listener;
use super::restart::drain_old_listener;
use crate::config;
use crate::logger;

/// Run the accept loop.
///
/// Returns `Ok(())` once the shutdown signal fires. A rebind that fails to
/// bind keeps the current listener.
pub async fn start_server_loop(
    mut listener: TcpListener,
    state: Arc<config::AppState>,
    active_connections: Arc<AtomicUsize>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            true,
                            "",
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = state.restart_signal.notified() => {
                if let Some(new_listener) = rebind(&listener, &state).await? {
                    let old_listener = std::mem::replace(&mut listener, new_listener);
                    tokio::spawn(drain_old_listener(
                        old_listener,
                        Arc::clone(&state),
                        Arc::clone(&active_connections),
                    ));
                }
            }

            () = state.shutdown_signal.notified() => {
                logger::log_shutdown(active_connections.load(Ordering::SeqCst));
                return Ok(());
            }
        }
    }
}

/// Bind the pending listen address, if any.
///
/// `Ok(None)` means the current listener stays in place.
async fn rebind(
    listener: &TcpListener,
    state: &config::AppState,
) -> std::io::Result<Option<TcpListener>> {
    logger::log_restart_triggered();

    let Some(target) = state.new_listen_address.read().await.clone() else {
        logger::log_error("No new listen address available for rebind");
        return Ok(None);
    };

    let old_addr = listener.local_addr()?;
    let resolved = tokio::net::lookup_host((target.host.as_str(), target.port))
        .await
        .map(|mut addrs| addrs.next());
    let new_addr = match resolved {
        Ok(Some(addr)) => addr,
        Ok(None) => {
            logger::log_error(&format!("No address found for '{target}'"));
            state.clear_pending_address().await;
            return Ok(None);
        }
        Err(e) => {
            logger::log_error(&format!("Invalid server address '{target}': {e}"));
            state.clear_pending_address().await;
            return Ok(None);
        }
    };

    logger::log_binding_new_address(&new_addr);
    let new_listener = match create_reusable_listener(new_addr) {
        Ok(l) => {
            logger::log_new_listener_bound(&new_addr);
            l
        }
        Err(e) => {
            logger::log_bind_failed(&new_addr, &e);
            state.clear_pending_address().await;
            return Ok(None);
        }
    };

    state.commit_listen_address(target).await;
    logger::log_info(&format!("Switched from {old_addr} to http://{new_addr}"));
    Ok(Some(new_listener))
}
