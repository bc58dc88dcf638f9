use std::sync::Arc;

use crate::db::{FilterStore, TenderStore};
use crate::dispatcher::dispatch;
use crate::error::{AppError, Result};
use crate::feed::FeedSource;
use crate::notify::NotificationChannel;

/// Counters for one fetch -> dedup -> match -> notify run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub fetch_failures: usize,
    pub new: usize,
    pub duplicates: usize,
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Pipeline {
    source: Arc<dyn FeedSource>,
    tenders: TenderStore,
    filters: FilterStore,
    channel: Arc<dyn NotificationChannel>,
    send_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        tenders: TenderStore,
        filters: FilterStore,
        channel: Arc<dyn NotificationChannel>,
        send_concurrency: usize,
    ) -> Self {
        Self {
            source,
            tenders,
            filters,
            channel,
            send_concurrency,
        }
    }

    /// Run one cycle. Only records inserted during this cycle are matched,
    /// and each is persisted before any notification about it is attempted.
    /// Errors returned here come from storage; everything upstream or
    /// downstream is logged and counted instead.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let filters = self.filters.list_active().await?;
        let fetch = self.source.fetch_candidates(&filters).await;

        let mut report = CycleReport {
            fetched: fetch.records.len(),
            fetch_failures: fetch.failures.len(),
            ..Default::default()
        };
        if fetch.upstream_broken() {
            tracing::warn!(source = self.source.name(), "upstream returned no usable data this cycle");
        }

        let mut fresh = Vec::new();
        for record in fetch.records {
            if record.id.trim().is_empty() {
                report.fetch_failures += 1;
                tracing::warn!(title = %record.title, "dropping tender without an identifier");
                continue;
            }
            if self.tenders.has(&record.id).await? {
                report.duplicates += 1;
                continue;
            }
            match self.tenders.insert(&record).await {
                Ok(()) => fresh.push(record),
                Err(AppError::DuplicateKey(id)) => {
                    tracing::debug!(tender = %id, "already stored");
                    report.duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }
        report.new = fresh.len();

        let sent = dispatch(&fresh, &filters, self.channel.as_ref(), self.send_concurrency).await;
        report.matched = sent.matched;
        report.delivered = sent.delivered;
        report.failed = sent.failed;

        tracing::info!(
            source = self.source.name(),
            fetched = report.fetched,
            new = report.new,
            duplicates = report.duplicates,
            matched = report.matched,
            delivered = report.delivered,
            failed = report.failed,
            "cycle complete"
        );
        Ok(report)
    }
}
