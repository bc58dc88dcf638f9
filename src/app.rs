use std::sync::Arc;

use crate::config::{Config, SourceConfig};
use crate::db::{self, FilterStore, TenderStore};
use crate::error::{AppError, Result};
use crate::feed::{BulkSource, FeedSource, StreamSource};
use crate::models::{SubscriberFilter, SubscriberId};
use crate::notify::{NotificationChannel, TelegramChannel};
use crate::pipeline::{CycleReport, Pipeline};
use crate::scheduler::Scheduler;

/// Wires configuration, storage, the feed source and the messaging
/// transport together.
pub struct App {
    config: Config,
    pub tenders: TenderStore,
    pub filters: FilterStore,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let (tenders, filters) = db::open(&config.db_path).await?;
        Ok(Self {
            config,
            tenders,
            filters,
        })
    }

    fn build_source(&self) -> Result<Arc<dyn FeedSource>> {
        let timeout = self.config.http_timeout();
        let source: Arc<dyn FeedSource> = match &self.config.source {
            SourceConfig::Stream(stream) => Arc::new(StreamSource::new(stream, timeout)?),
            SourceConfig::Bulk(bulk) => Arc::new(BulkSource::new(bulk, timeout)?),
        };
        Ok(source)
    }

    fn build_channel(&self) -> Result<Arc<dyn NotificationChannel>> {
        let token = self
            .config
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(
                    "bot_token is not set (config file or TENDER_ALERT_BOT_TOKEN)".to_string(),
                )
            })?;
        Ok(Arc::new(TelegramChannel::new(token, self.config.http_timeout())?))
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.build_source()?,
            self.tenders.clone(),
            self.filters.clone(),
            self.build_channel()?,
            self.config.send_concurrency,
        ))
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        self.pipeline()?.run_cycle().await
    }

    /// Run cycles until a storage failure stops the scheduler.
    pub async fn run_forever(&self) -> Result<()> {
        let pipeline = self.pipeline()?;
        let scheduler = Scheduler::new(self.config.check_interval());
        tracing::info!(
            interval_minutes = self.config.check_interval_minutes,
            "scheduler started"
        );
        scheduler.run(|| pipeline.run_cycle()).await
    }

    pub async fn subscribe(&self, filter: SubscriberFilter) -> Result<()> {
        if !filter.is_active() {
            return Err(AppError::Config("at least one keyword is required".to_string()));
        }
        self.filters.upsert(filter.subscriber_id, &filter).await
    }

    pub async fn unsubscribe(&self, subscriber_id: SubscriberId) -> Result<()> {
        self.filters.delete(subscriber_id).await
    }

    pub async fn active_filters(&self) -> Result<Vec<SubscriberFilter>> {
        self.filters.list_active().await
    }
}
