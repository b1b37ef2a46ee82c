use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use maproom::dashboard::Dashboard;
use parking_lot::Mutex;
use runtime::dispatch::LiveState;
use runtime::metrics::Metrics;
use uuid::Uuid;

use crate::config::Config;

/// One open view. The live state sits behind a fair lock so input events
/// apply in arrival order.
#[derive(Debug)]
pub struct View {
    pub live: Arc<tokio::sync::Mutex<LiveState>>,
    touched: Mutex<Instant>,
}

impl View {
    pub fn new(live: LiveState) -> Self {
        Self {
            live: Arc::new(tokio::sync::Mutex::new(live)),
            touched: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.touched.lock() = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.touched.lock())
    }
}

pub type Views = DashMap<Uuid, Arc<View>>;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub views: Arc<Views>,
    pub metrics: Arc<Mutex<Metrics>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(dashboard: Dashboard, config: Config) -> Self {
        Self {
            dashboard: Arc::new(dashboard),
            views: Arc::new(DashMap::new()),
            metrics: Arc::new(Mutex::new(Metrics::new())),
            config: Arc::new(config),
        }
    }

    /// Drops views untouched for longer than the configured idle time and
    /// returns how many went.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let idle = self.config.view_idle();
        let before = self.views.len();
        self.views.retain(|_, view| view.idle_for(now) <= idle);
        before.saturating_sub(self.views.len())
    }
}
