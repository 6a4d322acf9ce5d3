use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio::select;
use tokio::sync::{Notify, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::QueryKind;
use crate::error::ApiError;
use crate::events::{RefreshState, RotationState, SlideAttributes};
use crate::immich::assets::AssetRecord;
use crate::immich::client::ImmichClient;

/// Walks a cursor through the most recently published asset list and keeps
/// the preview bytes for whichever asset it points at.
///
/// Rules:
/// - Each rotation tick moves the cursor one step, wrapping at the end.
/// - An empty list freezes the cursor; the last good image stays on show.
/// - A new list keeps the current asset when it is still present, otherwise
///   the index is clamped to the new tail.
/// - A failed download leaves the previous bytes in place.
pub struct RotationController {
    client: ImmichClient,
    refresh: watch::Receiver<Arc<RefreshState>>,
    state: watch::Sender<RotationState>,
    mode: QueryKind,
    fetch_timeout: Duration,
    reload: Notify,
    cancel: CancellationToken,
}

impl RotationController {
    pub fn new(
        client: ImmichClient,
        refresh: watch::Receiver<Arc<RefreshState>>,
        mode: QueryKind,
        fetch_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(RotationState::default());
        Self {
            client,
            refresh,
            state,
            mode,
            fetch_timeout,
            reload: Notify::new(),
            cancel,
        }
    }

    pub fn snapshot(&self) -> RotationState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RotationState> {
        self.state.subscribe()
    }

    pub fn current_image(&self) -> Option<Bytes> {
        self.state.borrow().current_image.clone()
    }

    /// Attributes of the slide at the current (clamped) index, derived fresh
    /// from the published list on every call.
    pub fn attributes(&self) -> Option<SlideAttributes> {
        let assets = self.published();
        let index = self.state.borrow().current_index;
        SlideAttributes::describe(&assets, index, self.mode)
    }

    fn published(&self) -> Arc<Vec<AssetRecord>> {
        Arc::clone(&self.refresh.borrow().assets)
    }

    fn replace(&self, next: impl FnOnce(&RotationState) -> RotationState) {
        self.state.send_modify(|current| *current = next(current));
    }

    /// Re-synchronise the cursor with a freshly published list and schedule
    /// a download for the asset it lands on.
    pub fn on_publish(&self, published: &RefreshState) {
        if published.is_empty() {
            debug!("published list is empty; keeping current image");
            return;
        }
        let assets = &published.assets;
        self.replace(|current| {
            let index = resync_index(
                current.current_index,
                current.current_asset_id.as_deref(),
                assets,
            );
            if index != current.current_index {
                debug!(from = current.current_index, to = index, "cursor resynced");
            }
            RotationState {
                current_index: index,
                current_asset_id: Some(assets[index].id.clone()),
                current_image: current.current_image.clone(),
            }
        });
        self.reload.notify_one();
    }

    /// Step to the next asset and download it. No-op on an empty list.
    pub async fn advance(&self) {
        // the list is read under the rotation lock so a concurrent
        // `on_publish` lands either fully before or fully after this step
        let stepped = self.state.send_if_modified(|current| {
            let assets = self.published();
            if assets.is_empty() {
                return false;
            }
            let index = (current.current_index + 1) % assets.len();
            *current = RotationState {
                current_index: index,
                current_asset_id: Some(assets[index].id.clone()),
                current_image: current.current_image.clone(),
            };
            true
        });
        if stepped {
            self.load_current().await;
        }
    }

    /// Download the preview for the asset under the cursor.
    pub async fn load_current(&self) {
        let assets = self.published();
        let Some(last) = assets.len().checked_sub(1) else {
            return;
        };
        let index = self.state.borrow().current_index.min(last);
        let asset_id = assets[index].id.as_str();

        let fetched = select! {
            biased;
            _ = self.cancel.cancelled() => return,
            res = self.client.preview(asset_id, self.fetch_timeout) => res,
        };
        match fetched {
            Ok(bytes) => {
                debug!(asset_id, size = bytes.len(), "preview loaded");
                self.replace(|current| RotationState {
                    current_image: Some(bytes),
                    ..current.clone()
                });
            }
            Err(ApiError::Status(status)) => {
                warn!(asset_id, %status, "preview request rejected; keeping previous image");
            }
            Err(err) => {
                debug!(asset_id, error = %err, "preview download failed; keeping previous image");
            }
        }
    }

    /// Load the first image, then advance every `interval` and reload on
    /// every publish, until cancelled.
    #[instrument(skip_all, fields(mode = %self.mode, interval = %humantime::format_duration(interval)))]
    pub async fn run(self: Arc<Self>, interval: Duration) -> Result<()> {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.load_current().await;
        loop {
            select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.advance().await,
                _ = self.reload.notified() => self.load_current().await,
            }
        }

        info!("cancel received; exiting rotation task");
        Ok(())
    }
}

/// Where the cursor should sit in `assets` after a publish.
///
/// Follows `current_id` if it is still listed; otherwise keeps `index`,
/// clamped to the last entry.
pub fn resync_index(index: usize, current_id: Option<&str>, assets: &[AssetRecord]) -> usize {
    let Some(last) = assets.len().checked_sub(1) else {
        return index;
    };
    if let Some(id) = current_id {
        if let Some(pos) = assets.iter().position(|a| a.id == id) {
            return pos;
        }
    }
    index.min(last)
}
