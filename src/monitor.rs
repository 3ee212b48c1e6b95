//! Idle-shutdown heartbeat
//!
//! The monitor periodically asks the server for its player list and stops the
//! server once nobody has been online for the configured period.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::ServerEvent;
use crate::subprocess::{ProcessError, ProcessState, ServerProcess};

/// Player presence as observed from server events
#[derive(Debug)]
pub struct PlayerActivity {
    state: Mutex<ActivityState>,
}

#[derive(Debug)]
struct ActivityState {
    ready: bool,
    online: BTreeSet<String>,
    last_active: Instant,
}

impl PlayerActivity {
    pub fn new(now: Instant) -> Self {
        Self {
            state: Mutex::new(ActivityState {
                ready: false,
                online: BTreeSet::new(),
                last_active: now,
            }),
        }
    }

    /// Update presence from one event
    pub fn record(&self, event: &ServerEvent, now: Instant) {
        let mut state = self.lock();
        match event {
            ServerEvent::ServerReady { .. } => {
                state.ready = true;
                state.last_active = now;
            }
            ServerEvent::ServerStopping => state.ready = false,
            ServerEvent::PlayerJoined { username } => {
                state.online.insert(username.clone());
                state.last_active = now;
            }
            ServerEvent::PlayerLeft { username } => {
                state.online.remove(username);
                state.last_active = now;
            }
            ServerEvent::PlayerList { players } => {
                state.online = players.iter().cloned().collect();
                if !state.online.is_empty() {
                    state.last_active = now;
                }
            }
            _ => {}
        }
    }

    /// Whether the server has finished starting and is not shutting down
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    pub fn online(&self) -> Vec<String> {
        self.lock().online.iter().cloned().collect()
    }

    /// How long the server has been empty, or `None` while players are online
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        let state = self.lock();
        state
            .online
            .is_empty()
            .then(|| now.saturating_duration_since(state.last_active))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ActivityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Heartbeat that polls `list` and stops an empty server
pub struct IdleMonitor {
    process: Arc<ServerProcess>,
    activity: Arc<PlayerActivity>,
    list_interval: Duration,
    idle_limit: Duration,
}

impl IdleMonitor {
    pub fn new(
        process: Arc<ServerProcess>,
        activity: Arc<PlayerActivity>,
        list_interval: Duration,
        idle_limit: Duration,
    ) -> Self {
        Self {
            process,
            activity,
            list_interval,
            idle_limit,
        }
    }

    /// Run until the server exits or a stop has been issued
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.list_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if matches!(self.process.state(), ProcessState::Exited { .. }) {
                debug!("Server exited, idle monitor stopping");
                return;
            }
            if !self.activity.is_ready() {
                continue;
            }

            match self.process.write("list").await {
                Ok(()) => {}
                Err(ProcessError::NotRunning) => continue,
                Err(e) => warn!(error = %e, "Failed to request player list"),
            }

            let idle = self.activity.idle_for(Instant::now());
            if should_stop(idle, self.idle_limit) {
                info!(idle = ?idle, limit = ?self.idle_limit, "No players online, stopping server");
                if let Err(e) = self.process.write("stop").await {
                    warn!(error = %e, "Failed to stop idle server");
                }
                return;
            }
        }
    }
}

fn should_stop(idle: Option<Duration>, limit: Duration) -> bool {
    idle.is_some_and(|idle| idle >= limit)
}
