//! Staging SQLite store used to assemble the output transactionally.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};

use crate::error_handling::types::StorageError;
use crate::records::{ParsedRecord, SCALAR_COLUMNS};

/// Schema of the output table, matching the original collector's database so
/// existing analysis tooling keeps working. Scalars are bound as received
/// text; column affinity coerces the numeric ones.
const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS csi_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT, scenario TEXT, seq INTEGER, mac TEXT, rssi INTEGER, rate REAL,
    sig_mode INTEGER, mcs INTEGER, bandwidth INTEGER, smoothing INTEGER,
    not_sounding INTEGER, aggregation INTEGER, stbc INTEGER, fec_coding INTEGER,
    sgi INTEGER, noise_floor INTEGER, ampdu_cnt INTEGER, channel INTEGER,
    secondary_channel INTEGER, local_timestamp INTEGER, ant INTEGER,
    sig_len INTEGER, rx_state INTEGER, len INTEGER, first_word INTEGER, data TEXT
)";

/// A single-file SQLite database under exclusive ownership of the committer.
///
/// Journal mode is forced to DELETE so that, once the transaction commits and
/// the pool closes, the whole database is exactly one file ready for a byte
/// transfer.
pub struct StagingStore {
    pool: Pool<Sqlite>,
    insert_sql: String,
}

impl StagingStore {
    pub async fn create(path: &Path) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str("sqlite://")
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let placeholders = vec!["?"; 2 + SCALAR_COLUMNS.len() + 1].join(", ");
        let insert_sql = format!(
            "INSERT INTO csi_data (timestamp, scenario, {}, data) VALUES ({})",
            SCALAR_COLUMNS.join(", "),
            placeholders
        );

        Ok(Self { pool, insert_sql })
    }

    pub async fn create_table(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, StorageError> {
        Ok(self.pool.begin().await?)
    }

    /// Inserts one parsed record inside the given transaction, tagged with
    /// the shared commit timestamp and the scenario label.
    pub async fn insert_record(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        recorded_at: &str,
        scenario: &str,
        record: &ParsedRecord,
    ) -> Result<(), StorageError> {
        let mut query = sqlx::query(&self.insert_sql).bind(recorded_at).bind(scenario);
        for scalar in &record.scalars {
            query = query.bind(scalar);
        }
        query = query.bind(&record.data);
        query.execute(&mut **tx).await?;
        Ok(())
    }

    /// Closes the pool, flushing everything to the single database file.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
