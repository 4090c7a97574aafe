// Application state module
// Manages runtime state and configuration cache

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify, RwLock};

use super::types::{Config, ListenAddress, LiveSettings};
use crate::logger;

/// Application state
pub struct AppState {
    pub config: Config,
    pub live: RwLock<LiveSettings>,
    pub restart_signal: Arc<Notify>,
    pub shutdown_signal: Arc<Notify>,
    /// Flips to `true` once; open connections finish their current
    /// request and close
    pub connection_shutdown: watch::Sender<bool>,
    pub listen_address: RwLock<ListenAddress>,
    pub new_listen_address: Arc<RwLock<Option<ListenAddress>>>,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,
    pub reload_enabled: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let live = config.live_settings();
        logger::set_level(&live.level);

        Self {
            config: config.clone(),
            cached_access_log: Arc::new(AtomicBool::new(live.access_log)),
            live: RwLock::new(live),
            restart_signal: Arc::new(Notify::new()),
            shutdown_signal: Arc::new(Notify::new()),
            connection_shutdown: watch::Sender::new(false),
            listen_address: RwLock::new(config.listen_address()),
            new_listen_address: Arc::new(RwLock::new(None)),
            reload_enabled: AtomicBool::new(config.dev.reload),
        }
    }

    /// Apply a freshly loaded configuration.
    ///
    /// Live settings, including `dev.reload` itself, take effect immediately.
    /// Returns `true` when the listen address changed and a rebind was
    /// requested.
    pub async fn apply_reload(&self, reloaded: &Config) -> bool {
        self.reload_enabled
            .store(reloaded.dev.reload, Ordering::Relaxed);
        let live = reloaded.live_settings();
        logger::set_level(&live.level);
        self.cached_access_log
            .store(live.access_log, Ordering::Relaxed);
        *self.live.write().await = live;

        let current = match self.new_listen_address.read().await.clone() {
            Some(pending) => pending,
            None => self.listen_address.read().await.clone(),
        };
        let requested = reloaded.listen_address();
        if requested == current {
            return false;
        }

        *self.new_listen_address.write().await = Some(requested);
        self.restart_signal.notify_one();
        true
    }

    /// Stop the accept loop and ask open connections to close
    pub fn request_shutdown(&self) {
        self.shutdown_signal.notify_one();
        self.connection_shutdown.send_replace(true);
    }

    /// Record that the listener now runs on `addr`
    pub async fn commit_listen_address(&self, addr: ListenAddress) {
        *self.listen_address.write().await = addr;
        *self.new_listen_address.write().await = None;
    }

    /// Clear a pending rebind after the new address failed to bind
    pub async fn clear_pending_address(&self) {
        *self.new_listen_address.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        let path = std::env::temp_dir().join("placeholder-state-missing");
        Config::load_from(path.to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_reload_updates_live_settings() {
        let cfg = base_config();
        let state = AppState::new(&cfg);
        assert!(state.cached_access_log.load(Ordering::Relaxed));

        let mut reloaded = cfg.clone();
        reloaded.logging.access_log = false;
        reloaded.logging.access_log_format = "json".to_string();

        let rebind = state.apply_reload(&reloaded).await;
        assert!(!rebind);
        assert!(!state.cached_access_log.load(Ordering::Relaxed));
        assert_eq!(state.live.read().await.access_log_format, "json");
        assert!(state.new_listen_address.read().await.is_none());
    }

    #[tokio::test]
    async fn test_reload_requests_rebind_on_port_change() {
        let cfg = base_config();
        let state = AppState::new(&cfg);

        let mut reloaded = cfg.clone();
        reloaded.server.port = 5001;

        assert!(state.apply_reload(&reloaded).await);
        assert_eq!(
            state.new_listen_address.read().await.clone(),
            Some(ListenAddress {
                host: "127.0.0.1".to_string(),
                port: 5001,
            })
        );

        // Same pending address again is not a new rebind
        assert!(!state.apply_reload(&reloaded).await);

        state.clear_pending_address().await;
        assert!(state.new_listen_address.read().await.is_none());
    }

    #[tokio::test]
    async fn test_reload_can_turn_reload_off() {
        let cfg = base_config();
        let state = AppState::new(&cfg);
        assert!(state.reload_enabled.load(Ordering::Relaxed));

        let mut reloaded = cfg.clone();
        reloaded.dev.reload = false;
        state.apply_reload(&reloaded).await;
        assert!(!state.reload_enabled.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_request_shutdown_reaches_connections() {
        let state = AppState::new(&base_config());
        let mut rx = state.connection_shutdown.subscribe();
        assert!(!*rx.borrow());

        state.request_shutdown();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        // Subscribers created after shutdown see it straight away
        let late = state.connection_shutdown.subscribe();
        assert!(*late.borrow());
    }

    #[tokio::test]
    async fn test_commit_moves_current_address() {
        let cfg = base_config();
        let state = AppState::new(&cfg);

        let mut reloaded = cfg.clone();
        reloaded.server.port = 5002;
        assert!(state.apply_reload(&reloaded).await);

        state.commit_listen_address(reloaded.listen_address()).await;
        assert!(state.new_listen_address.read().await.is_none());
        assert_eq!(state.listen_address.read().await.port, 5002);

        // Reloading the committed address is a no-op
        assert!(!state.apply_reload(&reloaded).await);
        // Going back to the starting port is a rebind again
        assert!(state.apply_reload(&cfg).await);
    }
}
