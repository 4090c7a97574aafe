// Signal handling module
//
// Supported signals:
// - SIGHUP:  Reload configuration (when dev.reload is on)
// - SIGTERM: Graceful shutdown, a second one exits immediately
// - SIGINT:  Same as SIGTERM (Ctrl+C)

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::{AppState, Config};
use crate::logger;

/// Exit status used when a second stop signal cuts shutdown short
const FORCED_EXIT_CODE: i32 = 130;

/// What a stop signal should do
#[derive(Debug, PartialEq, Eq)]
pub enum StopAction {
    Graceful,
    Immediate,
}

/// Start a graceful shutdown on the first stop signal; later ones ask for
/// an immediate exit
pub fn stop_requested(state: &AppState, shutting_down: &mut bool) -> StopAction {
    if *shutting_down {
        return StopAction::Immediate;
    }
    *shutting_down = true;
    state.request_shutdown();
    StopAction::Graceful
}

fn handle_stop(state: &AppState, shutting_down: &mut bool, name: &str) {
    match stop_requested(state, shutting_down) {
        StopAction::Graceful => logger::log_info(&format!(
            "[Signal] {name} received, shutting down (send again to exit now)"
        )),
        StopAction::Immediate => {
            logger::log_warning(&format!("[Signal] {name} received again, exiting now"));
            std::process::exit(FORCED_EXIT_CODE);
        }
    }
}

/// Re-read the configuration file and apply it to the running server.
///
/// `dev.reload` is read from the most recently applied configuration, so a
/// reload that turns it off disables further reloads.
pub async fn reload_config(state: &AppState, config_path: &str) {
    if !state.reload_enabled.load(Ordering::Relaxed) {
        logger::log_info("[Signal] Reload requested but dev.reload is off, ignoring");
        return;
    }

    match Config::load(config_path) {
        Ok(reloaded) => {
            if state.apply_reload(&reloaded).await {
                logger::log_info(&format!(
                    "[Signal] Configuration reloaded, moving to {}",
                    reloaded.listen_address()
                ));
            } else {
                logger::log_info("[Signal] Configuration reloaded");
            }
        }
        Err(e) => logger::log_error(&format!(
            "[Signal] Reload failed, keeping current configuration: {e}"
        )),
    }
}

/// Register signal handlers and spawn the task that services them.
///
/// Registration happens before spawning so failures surface at startup.
#[cfg(unix)]
pub fn start_signal_handler(state: Arc<AppState>, config_path: String) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    logger::log_debug(&format!(
        "[Signal] Handlers registered (HUP reload, TERM/INT shutdown), pid {}",
        std::process::id()
    ));

    tokio::spawn(async move {
        let mut shutting_down = false;
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    logger::log_info("[Signal] SIGHUP received");
                    reload_config(&state, &config_path).await;
                }

                _ = sigterm.recv() => handle_stop(&state, &mut shutting_down, "SIGTERM"),

                _ = sigint.recv() => handle_stop(&state, &mut shutting_down, "SIGINT"),
            }
        }
    });

    Ok(())
}

/// Non-Unix fallback: only Ctrl+C is supported
#[cfg(not(unix))]
pub fn start_signal_handler(state: Arc<AppState>, _config_path: String) -> std::io::Result<()> {
    tokio::spawn(async move {
        let mut shutting_down = false;
        while let Ok(()) = tokio::signal::ctrl_c().await {
            handle_stop(&state, &mut shutting_down, "Ctrl+C");
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.toml", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_reload_applies_file_changes() {
        let path = write_config("placeholder-reload", "[logging]\naccess_log = true\n");
        let path_str = path.to_str().unwrap().to_string();

        let cfg = Config::load_from(&path_str).unwrap();
        let state = AppState::new(&cfg);
        assert!(state.live.read().await.access_log);

        std::fs::write(&path, "[logging]\naccess_log = false\naccess_log_format = \"json\"\n")
            .unwrap();
        reload_config(&state, &path_str).await;
        std::fs::remove_file(&path).unwrap();

        let live = state.live.read().await;
        assert!(!live.access_log);
        assert_eq!(live.access_log_format, "json");
    }

    #[tokio::test]
    async fn test_reload_disabled_keeps_settings() {
        let path = write_config(
            "placeholder-noreload",
            "[dev]\nreload = false\n\n[logging]\naccess_log = true\n",
        );
        let path_str = path.to_str().unwrap().to_string();

        let cfg = Config::load_from(&path_str).unwrap();
        let state = AppState::new(&cfg);

        std::fs::write(&path, "[logging]\naccess_log = false\n").unwrap();
        reload_config(&state, &path_str).await;
        std::fs::remove_file(&path).unwrap();

        assert!(state.live.read().await.access_log);
    }

    #[tokio::test]
    async fn test_reload_that_disables_reload_sticks() {
        let path = write_config("placeholder-reload-off", "[logging]\naccess_log = true\n");
        let path_str = path.to_str().unwrap().to_string();

        let cfg = Config::load_from(&path_str).unwrap();
        let state = AppState::new(&cfg);

        std::fs::write(&path, "[dev]\nreload = false\n\n[logging]\naccess_log = true\n")
            .unwrap();
        reload_config(&state, &path_str).await;
        assert!(!state.reload_enabled.load(Ordering::Relaxed));

        std::fs::write(&path, "[logging]\naccess_log = false\n").unwrap();
        reload_config(&state, &path_str).await;
        std::fs::remove_file(&path).unwrap();

        assert!(state.live.read().await.access_log);
    }

    #[tokio::test]
    async fn test_second_stop_signal_is_immediate() {
        let path = std::env::temp_dir().join("placeholder-stop-missing");
        let state = AppState::new(&Config::load_from(path.to_str().unwrap()).unwrap());
        let mut shutting_down = false;

        assert_eq!(stop_requested(&state, &mut shutting_down), StopAction::Graceful);
        assert!(*state.connection_shutdown.borrow());
        assert_eq!(stop_requested(&state, &mut shutting_down), StopAction::Immediate);
    }
}
