//! Transactional persistence of a drained record buffer.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use super::destination::Destination;
use super::staging::StagingStore;
use super::types::CommitReport;
use crate::error_handling::types::{CommitError, StorageError};
use crate::records::parse;

/// How many rejected lines are carried in the report for diagnosis.
pub const MAX_DISCARDED_SAMPLES: usize = 5;

/// Commits the drained records for one session.
///
/// An empty input yields a zero report and touches nothing. Otherwise the
/// records are parsed and inserted into a staging database inside one
/// transaction; a malformed record increments the discard counter and never
/// aborts the transaction. After the commit the staging file is transferred
/// byte-for-byte to the destination — the destination counts as written only
/// once the full transfer succeeds. The staging directory is temporary and
/// removed on every exit path, success or failure.
pub async fn commit(
    records: Vec<String>,
    scenario: &str,
    destination: Arc<dyn Destination>,
) -> Result<CommitReport, CommitError> {
    if records.is_empty() {
        info!("Nothing to save; buffer was empty");
        return Ok(CommitReport::empty());
    }

    let staging_dir = tempfile::tempdir().map_err(CommitError::Transfer)?;
    let staging_path = staging_dir.path().join("staging.sqlite3");
    let staging = StagingStore::create(&staging_path).await?;
    staging.create_table().await?;

    let mut report = CommitReport {
        total: records.len() as u64,
        ..CommitReport::empty()
    };
    let recorded_at = Utc::now().to_rfc3339();

    let mut tx = staging.begin().await?;
    for raw in &records {
        match parse(raw) {
            Ok(record) => {
                staging
                    .insert_record(&mut tx, &recorded_at, scenario, &record)
                    .await?;
                report.saved += 1;
            }
            Err(rejection) => {
                warn!("Discarding record: {}", rejection);
                report.discarded += 1;
                if report.discarded_samples.len() < MAX_DISCARDED_SAMPLES {
                    report.discarded_samples.push(rejection.line);
                }
            }
        }
    }
    tx.commit().await.map_err(StorageError::from)?;
    staging.close().await;

    let bytes = tokio::fs::read(&staging_path)
        .await
        .map_err(CommitError::Transfer)?;
    // Opening the destination belongs to the transfer phase: the staging
    // database is already complete at this point.
    let mut sink = destination
        .open_for_write()
        .map_err(|e| CommitError::Transfer(std::io::Error::other(e)))?;
    sink.write_all(&bytes).map_err(CommitError::Transfer)?;
    sink.flush().map_err(CommitError::Transfer)?;

    info!(
        "Committed {} of {} record(s) to {} ({} discarded)",
        report.saved,
        report.total,
        destination.describe(),
        report.discarded
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::StorageError as StoreErr;
    use crate::records::types::SCALAR_FIELD_COUNT;
    use crate::storage::destination::FileDestination;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn record_line(seq: u32) -> String {
        let mut fields = vec![seq.to_string()];
        fields.extend((1..SCALAR_FIELD_COUNT).map(|i| i.to_string()));
        format!("CSI_DATA,{},\"[9,8,7]\"", fields.join(","))
    }

    /// Destination that refuses to open, for transfer-failure paths.
    struct BrokenDestination;

    impl Destination for BrokenDestination {
        fn open_for_write(&self) -> Result<Box<dyn Write + Send>, StoreErr> {
            Err(StoreErr::WriteFailed("unwritable destination".into()))
        }

        fn describe(&self) -> String {
            "broken".into()
        }
    }

    /// Destination collecting bytes in memory.
    struct MemDestination {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    struct MemSink {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for MemSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Destination for MemDestination {
        fn open_for_write(&self) -> Result<Box<dyn Write + Send>, StoreErr> {
            Ok(Box::new(MemSink {
                bytes: Arc::clone(&self.bytes),
            }))
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    #[tokio::test]
    async fn test_empty_buffer_commits_zero_report() {
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let destination = Arc::new(MemDestination {
            bytes: Arc::clone(&bytes),
        });

        let report = commit(Vec::new(), "lab", destination).await.unwrap();
        assert_eq!(report, CommitReport::empty());
        // No staging artifact means nothing was ever transferred.
        assert!(bytes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_writes_readable_database() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("capture.db");
        let destination = Arc::new(FileDestination::new(&out));

        let records: Vec<String> = (0..10).map(record_line).collect();
        let report = commit(records, "walking", destination).await.unwrap();
        assert_eq!(report.saved, 10);
        assert_eq!(report.total, 10);
        assert_eq!(report.discarded, 0);

        // The destination file must itself be a complete SQLite database.
        let staging = StagingStore::create(&out).await.unwrap();
        let mut tx = staging.begin().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM csi_data")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(count.0, 10);
        drop(tx);
        staging.close().await;
    }

    #[tokio::test]
    async fn test_malformed_record_is_discarded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let destination = Arc::new(FileDestination::new(dir.path().join("capture.db")));

        let mut records: Vec<String> = (0..4).map(record_line).collect();
        records.insert(2, "CSI_DATA,only,three,fields".to_string());

        let report = commit(records, "lab", destination).await.unwrap();
        assert_eq!(report.total, 5);
        assert_eq!(report.saved, 4);
        assert_eq!(report.discarded, 1);
        assert_eq!(report.discarded_samples.len(), 1);
    }

    #[tokio::test]
    async fn test_unopenable_destination_is_a_transfer_failure() {
        let records = vec![record_line(1)];
        let result = commit(records, "lab", Arc::new(BrokenDestination)).await;
        assert!(matches!(result, Err(CommitError::Transfer(_))));
    }

    #[tokio::test]
    async fn test_discarded_samples_are_capped() {
        let dir = TempDir::new().unwrap();
        let destination = Arc::new(FileDestination::new(dir.path().join("capture.db")));

        let mut records = vec![record_line(0)];
        for i in 0..MAX_DISCARDED_SAMPLES + 3 {
            records.push(format!("CSI_DATA,bad,{}", i));
        }

        let report = commit(records, "lab", destination).await.unwrap();
        assert_eq!(report.discarded, (MAX_DISCARDED_SAMPLES + 3) as u64);
        assert_eq!(report.discarded_samples.len(), MAX_DISCARDED_SAMPLES);
    }
}
