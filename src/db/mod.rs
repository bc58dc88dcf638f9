mod filters;
mod schema;
mod tenders;

pub use filters::FilterStore;
pub use tenders::TenderStore;

use tokio_rusqlite::Connection;

use crate::error::Result;
use schema::SCHEMA;

/// Opens the database file, applies the schema and hands out both stores
/// over the same connection.
pub async fn open(db_path: &str) -> Result<(TenderStore, FilterStore)> {
    let conn = Connection::open(db_path).await?;
    init(conn).await
}

pub async fn open_in_memory() -> Result<(TenderStore, FilterStore)> {
    let conn = Connection::open_in_memory().await?;
    init(conn).await
}

async fn init(conn: Connection) -> Result<(TenderStore, FilterStore)> {
    conn.call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await?;

    Ok((TenderStore::new(conn.clone()), FilterStore::new(conn)))
}
