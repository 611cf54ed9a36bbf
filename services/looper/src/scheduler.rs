//! Per-stream polling: one cycle per stream whenever its interval elapses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use pipeline::{run_cycle, CycleReport, StreamSettings, StreamState};
use storage::{ObjectStoreRemote, RemoteStore};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::StreamConfig;

/// Idle time between checks when no stream is due sooner.
const MAX_IDLE: Duration = Duration::from_secs(60);

/// A stream with everything it carries from cycle to cycle.
pub struct StreamRunner {
    pub settings: StreamSettings,
    pub state: StreamState,
    pub store: Arc<dyn RemoteStore>,
}

impl StreamRunner {
    pub fn new(settings: StreamSettings, store: Arc<dyn RemoteStore>) -> Result<Self> {
        let state = StreamState::open(&settings)
            .with_context(|| format!("Failed to open stream directories for {}", settings.name))?;
        info!(
            stream = %settings.name,
            base_dir = %settings.layout.base_dir.display(),
            raws_on_disk = state.inventory.len(),
            "Stream ready"
        );
        Ok(Self {
            settings,
            state,
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Run one cycle. Errors escaping the pipeline are fatal.
    pub async fn run(&mut self) -> Result<CycleReport> {
        run_cycle(&self.settings, &mut self.state, self.store.as_ref(), Utc::now())
            .await
            .with_context(|| format!("Cycle failed for stream {}", self.settings.name))
    }
}

pub struct Scheduler {
    streams: Vec<StreamRunner>,
}

impl Scheduler {
    pub fn new(streams: Vec<StreamRunner>) -> Self {
        Self { streams }
    }

    /// Validate every config and connect its bucket.
    pub fn from_configs(
        configs: &[StreamConfig],
        config_dir: &Path,
        force_download: bool,
        force_regen: bool,
    ) -> Result<Self> {
        let mut streams = Vec::with_capacity(configs.len());
        for config in configs {
            let mut settings = config.validate(config_dir)?;
            settings.force_download |= force_download;
            settings.force_regen |= force_regen;

            let remote = ObjectStoreRemote::from_config(&config.remote_store_config())
                .with_context(|| format!("Failed to connect bucket for {}", config.stream.name))?;
            info!(stream = %config.stream.name, store = %remote.label(), "Connected remote store");
            streams.push(StreamRunner::new(settings, Arc::new(remote))?);
        }
        Ok(Self::new(streams))
    }

    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name()).collect()
    }

    /// Run one cycle of every stream.
    pub async fn run_once(&mut self) -> Result<Vec<CycleReport>> {
        let mut reports = Vec::with_capacity(self.streams.len());
        for stream in &mut self.streams {
            reports.push(stream.run().await?);
        }
        Ok(reports)
    }

    /// Run continuously until `shutdown` fires.
    pub async fn run_forever(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        // Track last poll time per stream
        let mut last_poll: HashMap<String, Instant> = HashMap::new();

        loop {
            for stream in &mut self.streams {
                let interval = stream.settings.poll_interval;
                let should_poll = match last_poll.get(stream.name()) {
                    None => true,
                    Some(t) => t.elapsed() >= interval,
                };

                if should_poll {
                    // the interval is measured start to start
                    last_poll.insert(stream.name().to_string(), Instant::now());
                    stream.run().await?;
                }
            }

            let idle = self.next_due(&last_poll);
            debug!(idle_secs = idle.as_secs_f64(), "Sleeping until next stream is due");

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(idle) => {}
            }
        }

        Ok(())
    }

    fn next_due(&self, last_poll: &HashMap<String, Instant>) -> Duration {
        self.streams
            .iter()
            .map(|s| match last_poll.get(s.name()) {
                Some(t) => s.settings.poll_interval.saturating_sub(t.elapsed()),
                None => Duration::ZERO,
            })
            .min()
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE)
    }
}
