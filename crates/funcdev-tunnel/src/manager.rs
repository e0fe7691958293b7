//! Lease lifecycle on top of the wire client.
//!
//! Registration failure at startup is fatal for the caller. Renewal
//! failures are not: the lease survives roughly thirty minutes, so one
//! missed renewal still leaves later attempts inside the window, and a
//! lapsed tunnel only affects remote access while local serving continues.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::TunnelClient;
use funcdev_common::TunnelError;

/// Owns the tunnel lease: registered on construction, renewed on a timer,
/// released by [`TunnelManager::shutdown`].
pub struct TunnelManager {
    client: TunnelClient,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TunnelManager {
    /// Register the tunnel and start the renewal timer.
    ///
    /// # Errors
    ///
    /// Returns the registration failure; no renewal task is started in
    /// that case.
    pub async fn start(
        client: TunnelClient,
        port: u16,
        renew_interval: Duration,
    ) -> Result<Self, TunnelError> {
        let message = client.announce(port).await?;
        info!(port, %message, "tunnel registered");

        let (stop, mut stop_rx) = oneshot::channel();
        let renew_client = client.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(renew_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The registration above already covers the first period
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => match renew_client.announce(port).await {
                        Ok(_) => debug!("tunnel lease renewed"),
                        Err(e) => {
                            warn!(error = %e, "tunnel lease renewal failed, retrying next period");
                        }
                    },
                }
            }
        });

        Ok(Self { client, stop, task })
    }

    /// Stop renewing and release the lease.
    ///
    /// A failed release is logged and swallowed; the lease lapses on its
    /// own shortly after.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;

        if let Err(e) = self.client.deregister().await {
            warn!(error = %e, "failed to release tunnel lease");
        }
    }
}
