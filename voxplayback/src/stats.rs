//! Statistics collaborator seam
//!
//! Everything here is fire-and-forget: reporting runs on a spawned task and
//! failures are logged, never surfaced to playback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use voxresolve::Platform;

use crate::types::UserId;

/// Usage-statistics collaborator (flat-file persistence lives behind it).
#[async_trait]
pub trait StatsSink: Send + Sync {
    /// A track ran at least the configured ratio of its duration.
    async fn record_played(
        &self,
        user: UserId,
        reference: &str,
        minutes: u64,
        platform: Platform,
        title: &str,
    ) -> anyhow::Result<()>;

    /// A track was abandoned before the ratio.
    async fn record_skipped(&self, user: UserId, reference: &str, title: &str)
        -> anyhow::Result<()>;

    /// A user spent `minutes` listening in a voice room.
    async fn record_listening(&self, user: UserId, minutes: u64) -> anyhow::Result<()>;
}

/// Discards everything; for embedders that do not collect statistics.
pub struct NullStats;

#[async_trait]
impl StatsSink for NullStats {
    async fn record_played(
        &self,
        _user: UserId,
        _reference: &str,
        _minutes: u64,
        _platform: Platform,
        _title: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn record_skipped(
        &self,
        _user: UserId,
        _reference: &str,
        _title: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn record_listening(&self, _user: UserId, _minutes: u64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Spawn a played report; errors are logged and dropped.
pub fn report_played(
    stats: Arc<dyn StatsSink>,
    user: UserId,
    reference: String,
    minutes: u64,
    platform: Platform,
    title: String,
) {
    tokio::spawn(async move {
        if let Err(e) = stats
            .record_played(user, &reference, minutes, platform, &title)
            .await
        {
            warn!(%user, reference, error = %e, "failed to record played track");
        }
    });
}

/// Spawn a skipped report; errors are logged and dropped.
pub fn report_skipped(stats: Arc<dyn StatsSink>, user: UserId, reference: String, title: String) {
    tokio::spawn(async move {
        if let Err(e) = stats.record_skipped(user, &reference, &title).await {
            warn!(%user, reference, error = %e, "failed to record skipped track");
        }
    });
}

/// Spawn a listening-time report; errors are logged and dropped.
pub fn report_listening(stats: Arc<dyn StatsSink>, user: UserId, minutes: u64) {
    tokio::spawn(async move {
        if let Err(e) = stats.record_listening(user, minutes).await {
            warn!(%user, minutes, error = %e, "failed to record listening time");
        }
    });
}
