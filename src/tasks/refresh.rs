use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::select;
use tokio::sync::{Notify, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{Configuration, QueryMode};
use crate::error::{QueryError, UpdateFailed};
use crate::events::RefreshState;
use crate::immich::assets::AssetRecord;
use crate::immich::client::ImmichClient;
use crate::immich::query;
use crate::subscription::{Observer, Subscribers, Subscription};

/// Owns the candidate asset list.
///
/// Each cycle asks the server for the configured query, keeps only images and
/// publishes the result as a fresh [`RefreshState`]. Failed cycles keep the
/// previous list and only record the error.
pub struct RefreshCoordinator {
    client: ImmichClient,
    query: QueryMode,
    default_count: u32,
    state: watch::Sender<Arc<RefreshState>>,
    subscribers: Subscribers<Arc<RefreshState>>,
    wake: Notify,
}

impl RefreshCoordinator {
    pub fn new(client: ImmichClient, query: QueryMode, default_count: u32) -> Self {
        let (state, _) = watch::channel(Arc::new(RefreshState::default()));
        Self {
            client,
            query,
            default_count,
            state,
            subscribers: Subscribers::new(),
            wake: Notify::new(),
        }
    }

    pub fn from_config(client: ImmichClient, cfg: &Configuration) -> Self {
        Self::new(client, cfg.query.clone(), cfg.asset_count)
    }

    pub fn query(&self) -> &QueryMode {
        &self.query
    }

    /// Currently published state.
    pub fn snapshot(&self) -> Arc<RefreshState> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<RefreshState>> {
        self.state.subscribe()
    }

    /// Register `observer` for every successful publish.
    pub fn subscribe(
        &self,
        observer: impl Observer<Arc<RefreshState>> + 'static,
    ) -> Subscription<Arc<RefreshState>> {
        self.subscribers.subscribe(observer)
    }

    pub fn subscribers(&self) -> &Subscribers<Arc<RefreshState>> {
        &self.subscribers
    }

    /// Ask the running task for an out-of-cycle refresh.
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }

    /// Run one cycle. Returns the number of published assets.
    ///
    /// A configuration problem publishes an empty list and records the
    /// diagnostic; a remote failure keeps the previous list and yields
    /// [`UpdateFailed`].
    #[instrument(skip(self), fields(mode = %self.query.kind()))]
    pub async fn refresh(&self) -> Result<usize, UpdateFailed> {
        match query::fetch(&self.client, &self.query, self.default_count).await {
            Ok(assets) => {
                let fetched = assets.len();
                let images = displayable(assets);
                if images.is_empty() {
                    warn!(fetched, "server returned no image assets");
                } else {
                    debug!(fetched, images = images.len(), "filtered asset list");
                }
                Ok(self.publish(images, None))
            }
            Err(err @ QueryError::Configuration(_)) => {
                warn!(error = %err, "query not issued; publishing empty list");
                Ok(self.publish(Vec::new(), Some(Arc::new(err))))
            }
            Err(err) => {
                let err = Arc::new(err);
                warn!(error = %err, "refresh failed; keeping previous asset list");
                self.state.send_modify(|current| {
                    *current = Arc::new(RefreshState {
                        assets: Arc::clone(&current.assets),
                        last_error: Some(Arc::clone(&err)),
                        last_updated: current.last_updated,
                    });
                });
                Err(UpdateFailed(err))
            }
        }
    }

    fn publish(&self, assets: Vec<AssetRecord>, diagnostic: Option<Arc<QueryError>>) -> usize {
        let count = assets.len();
        let next = Arc::new(RefreshState {
            assets: Arc::new(assets),
            last_error: diagnostic,
            last_updated: Some(Utc::now()),
        });
        // state is assigned before any observer hears about it
        self.state.send_replace(Arc::clone(&next));
        self.subscribers.notify(&next);
        count
    }

    /// Refresh once immediately, then every `interval` and whenever
    /// [`request_refresh`](Self::request_refresh) is called, until cancelled.
    #[instrument(skip_all, fields(mode = %self.query.kind(), interval = %humantime::format_duration(interval)))]
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> Result<()> {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {
                    debug!("manual refresh requested");
                    ticker.reset();
                }
            }

            // dropping the in-flight fetch on cancel means nothing is published after teardown
            let outcome = select! {
                _ = cancel.cancelled() => break,
                outcome = self.refresh() => outcome,
            };
            match outcome {
                Ok(count) => info!(count, "asset list published"),
                Err(err) => warn!(error = %err, "asset list update failed; will retry next cycle"),
            }
        }

        info!("cancel received; exiting refresh task");
        Ok(())
    }
}

/// Keep only records that can be shown as a still frame.
pub fn displayable(assets: Vec<AssetRecord>) -> Vec<AssetRecord> {
    assets.into_iter().filter(AssetRecord::is_image).collect()
}
