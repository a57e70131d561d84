mod hub;
pub mod normalize;
pub mod operations;
pub mod phase_engine;
pub mod room;
pub mod room_code;
pub mod scoring;
pub mod state_machine;
#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::room_store::RoomStore, error::ServiceError};

pub use self::hub::RoomHub;

pub type SharedState = Arc<AppState>;

/// Central application state: the room store handle, the per-room event hub and config.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    hub: RoomHub,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a room store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            hub: RoomHub::new(config.broadcast_capacity),
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Room store handle, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn install_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Per-room broadcast hub feeding the SSE streams.
    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
