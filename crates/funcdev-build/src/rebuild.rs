//! The Cold/Warm rebuild state machine.
//!
//! A [`Rebuilder`] owns the staging workspace and the current digest, and
//! drives complete passes: Cold (full reset plus dependency install,
//! falling through to Warm) and Warm (sync, compile, load, publish). The
//! event loop in [`Rebuilder::run`] is the single consumer of the watcher
//! channel, which is what serializes passes: events arriving during a pass
//! queue up and are coalesced into at most one follow-up pass once the
//! current one completes.
//!
//! A failed pass leaves the previously published route table serving and
//! reports the failure; only the mandatory initial cold pass (driven by
//! the binary before the loop starts) escalates to process exit.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::command::{run_compile, run_install};
use crate::staging::StagingWorkspace;
use funcdev_common::{BuildConfig, DevServerError, Digest};
use funcdev_core::{ModuleLoader, RoutePublisher};

/// A classified filesystem change.
///
/// Digest changes may alter the dependency set, so they trigger a cold
/// pass; everything else under the function source tree is warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The dependency manifest changed; cold-triggering.
    Digest,
    /// A function source changed; warm-triggering.
    Source,
}

/// Drives Cold and Warm rebuild passes against an injected publisher.
pub struct Rebuilder<P> {
    functions_dir: PathBuf,
    staging: StagingWorkspace,
    loader: ModuleLoader,
    publisher: P,
    digest: Digest,
}

impl<P: RoutePublisher> Rebuilder<P> {
    /// Create a rebuilder for the given functions directory.
    pub fn new(
        functions_dir: impl Into<PathBuf>,
        config: BuildConfig,
        loader: ModuleLoader,
        publisher: P,
    ) -> Self {
        let functions_dir = functions_dir.into();
        let staging = StagingWorkspace::new(&functions_dir, config);

        Self {
            functions_dir,
            staging,
            loader,
            publisher,
            digest: Digest::default(),
        }
    }

    /// Run one Cold pass: full staging reset, dependency install, then a
    /// Warm pass.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the pass is aborted and no table is
    /// published.
    pub async fn cold(&mut self) -> Result<(), DevServerError> {
        info!("cold pass: rebuilding staging workspace");

        self.digest = Digest::load(&self.functions_dir)?;
        self.staging.recreate()?;
        self.staging.write_descriptor(&self.digest)?;

        // Dependencies install in digest order, before any sources land
        let staging_root = self.staging.root();
        for module in &self.digest.modules {
            run_install(self.staging.config(), &staging_root, module).await?;
        }

        self.warm().await
    }

    /// Run one Warm pass: sync sources, recompile, reload routes, publish.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the previously published table stays
    /// live.
    pub async fn warm(&mut self) -> Result<(), DevServerError> {
        let copied = self.staging.sync_sources()?;
        info!(files = copied, "synced function sources into staging");

        self.staging.clear_artifacts()?;
        run_compile(self.staging.config(), &self.staging.root()).await?;

        let outcome = self
            .loader
            .load_dir(&self.staging.artifact_dir(), &self.digest)
            .await?;

        self.publisher.publish(outcome.table).await
    }

    /// Apply one classified change as a pass.
    ///
    /// # Errors
    ///
    /// Propagates the pass failure.
    pub async fn apply(&mut self, change: Change) -> Result<(), DevServerError> {
        match change {
            Change::Digest => self.cold().await,
            Change::Source => self.warm().await,
        }
    }

    /// Consume watcher events until the channel closes.
    ///
    /// Exactly one pass runs at a time. Events that queued up during a
    /// pass are drained and coalesced into a single follow-up pass, with
    /// a digest change outranking source changes.
    pub async fn run(mut self, mut events: mpsc::Receiver<Change>) {
        while let Some(first) = events.recv().await {
            let mut change = first;
            while let Ok(queued) = events.try_recv() {
                if queued == Change::Digest {
                    change = Change::Digest;
                }
            }

            info!(?change, "rebuild triggered");
            if let Err(e) = self.apply(change).await {
                error!(error = %e, "rebuild pass failed; previous routes remain active");
            }
        }
    }
}
