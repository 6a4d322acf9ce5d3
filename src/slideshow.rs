use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Configuration;
use crate::events::{RefreshState, SlideAttributes};
use crate::immich::client::ImmichClient;
use crate::subscription::Subscription;
use crate::tasks::refresh::RefreshCoordinator;
use crate::tasks::rotation::RotationController;

/// One configured slideshow: a refresh task and a rotation task wired
/// together through a publish subscription.
pub struct Slideshow {
    refresh: Arc<RefreshCoordinator>,
    rotation: Arc<RotationController>,
    subscription: Subscription<Arc<RefreshState>>,
    cancel: CancellationToken,
    tasks: JoinSet<Result<()>>,
}

impl Slideshow {
    /// Spawn both timers onto the current runtime.
    ///
    /// `http` is shared with the caller; `parent` cancels this instance along
    /// with everything else hanging off it.
    pub fn start(
        cfg: &Configuration,
        http: reqwest::Client,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let client =
            ImmichClient::from_config(http, cfg).context("building photo server client")?;
        let cancel = parent.child_token();

        let refresh = Arc::new(RefreshCoordinator::from_config(client.clone(), cfg));
        let rotation = Arc::new(RotationController::new(
            client,
            refresh.watch(),
            cfg.query.kind(),
            cfg.thumbnail_timeout,
            cancel.clone(),
        ));

        let subscription = {
            let rotation = Arc::clone(&rotation);
            refresh.subscribe(move |published: &Arc<RefreshState>| -> Result<()> {
                rotation.on_publish(published);
                Ok(())
            })
        };

        let mut tasks = JoinSet::new();

        // Refresh
        tasks.spawn({
            let refresh = Arc::clone(&refresh);
            let interval = cfg.refresh_interval;
            let cancel = cancel.clone();
            async move {
                refresh
                    .run(interval, cancel)
                    .await
                    .context("refresh task failed")
            }
        });

        // Rotation
        tasks.spawn({
            let rotation = Arc::clone(&rotation);
            let interval = cfg.rotation_interval;
            async move { rotation.run(interval).await.context("rotation task failed") }
        });

        info!(
            host = %cfg.host,
            mode = %cfg.query.kind(),
            rotation = %humantime::format_duration(cfg.rotation_interval),
            refresh = %humantime::format_duration(cfg.refresh_interval),
            "slideshow started"
        );

        Ok(Self {
            refresh,
            rotation,
            subscription,
            cancel,
            tasks,
        })
    }

    pub fn refresh(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    pub fn rotation(&self) -> &Arc<RotationController> {
        &self.rotation
    }

    pub fn current_image(&self) -> Option<Bytes> {
        self.rotation.current_image()
    }

    pub fn attributes(&self) -> Option<SlideAttributes> {
        self.rotation.attributes()
    }

    pub fn request_refresh(&self) {
        self.refresh.request_refresh();
    }

    /// Stop both timers and wait for the tasks to finish. Nothing mutates
    /// either state once this returns.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        self.subscription.unsubscribe();
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("task error: {e:?}"),
                Err(e) => error!("join error: {e}"),
            }
        }
        info!("slideshow stopped");
    }
}
