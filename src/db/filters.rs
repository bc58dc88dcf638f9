use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{OnboardingState, SubscriberFilter, SubscriberId};

/// One filter row per subscriber. Written by the command surface, read by
/// the pipeline.
#[derive(Clone)]
pub struct FilterStore {
    conn: Connection,
}

impl FilterStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Replace whatever filter the subscriber had with `filter`.
    pub async fn upsert(&self, subscriber_id: SubscriberId, filter: &SubscriberFilter) -> Result<()> {
        let keywords_json = serde_json::to_string(&filter.keywords)?;
        let region = filter.region.clone();
        let max_price = filter.max_price;
        let onboarding = filter.onboarding.as_str();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO subscriber_filters (subscriber_id, keywords, region, max_price, onboarding)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(subscriber_id) DO UPDATE SET
                           keywords = excluded.keywords,
                           region = excluded.region,
                           max_price = excluded.max_price,
                           onboarding = excluded.onboarding,
                           updated_at = datetime('now')"#,
                    params![subscriber_id, keywords_json, region, max_price, onboarding],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete(&self, subscriber_id: SubscriberId) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM subscriber_filters WHERE subscriber_id = ?1",
                    params![subscriber_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get(&self, subscriber_id: SubscriberId) -> Result<Option<SubscriberFilter>> {
        let filter = self
            .conn
            .call(move |conn| {
                let filter = conn
                    .query_row(
                        "SELECT subscriber_id, keywords, region, max_price, onboarding FROM subscriber_filters WHERE subscriber_id = ?1",
                        params![subscriber_id],
                        filter_from_row,
                    )
                    .optional()?;
                Ok(filter)
            })
            .await?;
        Ok(filter)
    }

    /// Filters with at least one keyword, ordered by subscriber id.
    pub async fn list_active(&self) -> Result<Vec<SubscriberFilter>> {
        let filters = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT subscriber_id, keywords, region, max_price, onboarding
                       FROM subscriber_filters
                       WHERE keywords != '[]'
                       ORDER BY subscriber_id"#,
                )?;
                let filters = stmt
                    .query_map([], filter_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(filters)
            })
            .await?;
        Ok(filters.into_iter().filter(|f| f.is_active()).collect())
    }

    /// Record where the subscriber is in the onboarding dialogue, creating
    /// an empty (inactive) filter row if none exists yet.
    pub async fn set_onboarding(&self, subscriber_id: SubscriberId, state: OnboardingState) -> Result<()> {
        let state = state.as_str();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO subscriber_filters (subscriber_id, onboarding)
                       VALUES (?1, ?2)
                       ON CONFLICT(subscriber_id) DO UPDATE SET
                           onboarding = excluded.onboarding,
                           updated_at = datetime('now')"#,
                    params![subscriber_id, state],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn filter_from_row(row: &Row) -> rusqlite::Result<SubscriberFilter> {
    let keywords_json: String = row.get(1)?;
    let keywords: Vec<String> = serde_json::from_str(&keywords_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let onboarding: String = row.get(4)?;

    Ok(SubscriberFilter {
        subscriber_id: row.get(0)?,
        keywords,
        region: row.get(2)?,
        max_price: row.get(3)?,
        onboarding: OnboardingState::parse(&onboarding).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[tokio::test]
    async fn upsert_replaces_previous_filter() {
        let (_, filters) = open_in_memory().await.unwrap();
        let first = SubscriberFilter::new(7, vec!["ноутбук".into()])
            .with_region("Москва")
            .with_max_price(1_500_000.0);
        filters.upsert(7, &first).await.unwrap();

        let second = SubscriberFilter::new(7, vec!["принтер".into()]);
        filters.upsert(7, &second).await.unwrap();

        let active = filters.list_active().await.unwrap();
        assert_eq!(active, vec![second]);
    }

    #[tokio::test]
    async fn empty_keywords_are_not_listed() {
        let (_, filters) = open_in_memory().await.unwrap();
        filters
            .upsert(1, &SubscriberFilter::new(1, vec!["бумага".into()]))
            .await
            .unwrap();
        filters.upsert(2, &SubscriberFilter::new(2, vec![])).await.unwrap();

        let ids: Vec<_> = filters
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.subscriber_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn delete_removes_subscriber() {
        let (_, filters) = open_in_memory().await.unwrap();
        filters
            .upsert(3, &SubscriberFilter::new(3, vec!["мебель".into()]))
            .await
            .unwrap();
        filters.delete(3).await.unwrap();

        assert!(filters.get(3).await.unwrap().is_none());
        assert!(filters.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn onboarding_state_lives_next_to_the_filter() {
        let (_, filters) = open_in_memory().await.unwrap();
        filters
            .set_onboarding(9, OnboardingState::AwaitingRegion)
            .await
            .unwrap();

        let stored = filters.get(9).await.unwrap().unwrap();
        assert_eq!(stored.onboarding, OnboardingState::AwaitingRegion);
        assert!(stored.keywords.is_empty());
        assert!(filters.list_active().await.unwrap().is_empty());
    }
}
