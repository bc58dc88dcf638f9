use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::TenderRecord;

/// Durable ledger of every tender ever ingested. Its key space is the
/// seen-set used for deduplication; rows are never updated or deleted.
#[derive(Clone)]
pub struct TenderStore {
    conn: Connection,
}

impl TenderStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn has(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let found = conn
                    .query_row("SELECT 1 FROM tenders WHERE id = ?1", params![id], |_| Ok(()))
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(exists)
    }

    /// Persist a tender seen for the first time. Fails with
    /// [`AppError::DuplicateKey`] when the id is already stored.
    pub async fn insert(&self, record: &TenderRecord) -> Result<()> {
        let record = record.clone();
        let id = record.id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let res = conn.execute(
                    r#"INSERT INTO tenders (id, title, price, region, url, published_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        record.id,
                        record.title,
                        record.price,
                        record.region,
                        record.url,
                        record.published_at.map(|dt| dt.to_rfc3339()),
                    ],
                );
                match res {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        if inserted {
            Ok(())
        } else {
            Err(AppError::DuplicateKey(id))
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<TenderRecord>> {
        let id = id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT id, title, price, region, url, published_at FROM tenders WHERE id = ?1",
                        params![id],
                        tender_from_row,
                    )
                    .optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    pub async fn count(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM tenders", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn tender_from_row(row: &Row) -> rusqlite::Result<TenderRecord> {
    Ok(TenderRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        region: row.get(3)?,
        url: row.get(4)?,
        published_at: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s)),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::open_in_memory;

    fn tender(id: &str) -> TenderRecord {
        TenderRecord {
            id: id.to_string(),
            title: "Поставка ноутбуков".to_string(),
            price: 900_000.0,
            region: "Москва".to_string(),
            url: format!("https://zakupki.gov.ru/notice?regNumber={id}"),
            published_at: Some(Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn insert_makes_record_visible() {
        let (tenders, _) = open_in_memory().await.unwrap();
        assert!(!tenders.has("0373100000126000001").await.unwrap());

        tenders.insert(&tender("0373100000126000001")).await.unwrap();

        assert!(tenders.has("0373100000126000001").await.unwrap());
        let stored = tenders.get("0373100000126000001").await.unwrap().unwrap();
        assert_eq!(stored, tender("0373100000126000001"));
        assert_eq!(tenders.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_insert_is_a_duplicate_key() {
        let (tenders, _) = open_in_memory().await.unwrap();
        tenders.insert(&tender("42")).await.unwrap();

        let err = tenders.insert(&tender("42")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(ref id) if id == "42"));
        assert_eq!(tenders.count().await.unwrap(), 1);
    }

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        assert!(parse_datetime("2026-10-01T09:30:00+03:00").is_some());
        assert!(parse_datetime("2026-10-01 09:30:00").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }
}
