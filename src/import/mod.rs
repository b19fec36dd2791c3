//! Topic archive import pipeline.
//!
//! Moves a directory of topic-export JSON files into the `topics`,
//! `messages` and `attachments` tables, copying attachment payloads along
//! the way.
//!
//! # Components
//!
//! - **`schema`**: Looks up each target table in `pg_tables`, creating it (with
//!   its identity sequence) when missing or truncating it when requested.
//! - **`scanner`**: Lists the input directory, filters out export side-files,
//!   and reads/parses the remaining `*.json` files one at a time.
//! - **`topics`**: Registers a topic the first time a non-reply message for
//!   its external id is seen.
//! - **`messages`**: Inserts one row per message, fields copied verbatim.
//! - **`attachments`**: Resolves attachment descriptors against the export
//!   layout, copies present payloads, and records them.
//!
//! # Data Flow
//!
//! 1. **Connect**: Open a single database connection (failure ends the run)
//! 2. **Schema**: Provision or truncate the three tables, each independently
//! 3. **Scan**: For each topic file, in filename order
//! 4. **Per message**: Register topic → insert message → link attachments
//! 5. **Disconnect**: Close the connection and log the run summary
//!
//! Everything is sequential and awaited. There are no transactions across
//! steps and nothing is retried: a failure is reported once and abandons
//! only the file, message or attachment it belongs to.

pub mod attachments;
pub mod messages;
pub mod outcome;
pub mod scanner;
pub mod schema;
pub mod stats;
pub mod topics;

pub use attachments::AttachmentLinker;
pub use messages::MessageIngestor;
pub use outcome::{AttachmentOutcome, MessageOutcome, TopicOutcome};
pub use scanner::{ArchiveFile, ArchiveScanner};
pub use schema::{SchemaProvisioner, SchemaReport, TableAction};
pub use stats::ImportStats;
pub use topics::TopicRegistrar;

use crate::config::ImportConfig;
use crate::db;
use crate::error::{ImportError, ImportResult};
use crate::models::ArchiveMessage;
use sqlx::PgPool;

/// Drives a complete import run for one [`ImportConfig`].
pub struct ArchiveImporter {
    config: ImportConfig,
}

impl ArchiveImporter {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Connect, import everything, disconnect.
    ///
    /// Only run-fatal errors (connection, unreadable input directory) are
    /// returned; everything else is logged and counted in the stats.
    pub async fn run(&self) -> ImportResult<ImportStats> {
        log::info!(
            "starting archive import from {}",
            self.config.input_dir.display()
        );

        let pool = db::connect(&self.config.database_url).await?;
        let result = self.run_with_pool(&pool).await;

        pool.close().await;
        log::info!("database connection closed");

        result
    }

    /// Run the pipeline over an already open pool.
    pub async fn run_with_pool(&self, pool: &PgPool) -> ImportResult<ImportStats> {
        let report = SchemaProvisioner::new(pool)
            .ensure_schema(self.config.truncate_tables)
            .await;
        if report.failures() > 0 {
            log::warn!(
                "schema step failed for {} of {} tables, continuing",
                report.failures(),
                report.tables.len()
            );
        }

        if self.config.process_attachments {
            self.prepare_output_dir().await;
        }

        let mut scan = ArchiveScanner::new(&self.config.input_dir).scan().await?;
        let mut stats = ImportStats::default();

        while let Some(next) = scan.next_file().await {
            match next {
                Ok(file) => stats.merge(self.import_file(pool, file).await),
                Err(err) => {
                    err.report();
                    stats.files_skipped += 1;
                }
            }
        }

        log::info!("import complete: {}", stats);
        Ok(stats)
    }

    async fn prepare_output_dir(&self) {
        let dir = &self.config.attachment_output_dir;
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            log::error!(
                "failed to create attachment output directory {}: {}",
                dir.display(),
                err
            );
        }
    }

    /// Import every message of one parsed file.
    pub async fn import_file(&self, pool: &PgPool, file: ArchiveFile) -> ImportStats {
        log::info!(
            "importing {} ({} messages)",
            file.file_name,
            file.document.messages.len()
        );

        let mut stats = ImportStats {
            files_imported: 1,
            ..Default::default()
        };
        for value in file.document.messages {
            let outcome = self.import_message(pool, value).await;
            stats.record_message(&outcome);
        }

        log::debug!("{}: {}", file.file_name, stats);
        stats
    }

    /// Import a single raw message object.
    pub async fn import_message(&self, pool: &PgPool, value: serde_json::Value) -> MessageOutcome {
        let result = match ArchiveMessage::from_value(value) {
            Ok(message) => self.ingest(pool, &message).await,
            Err(err) => Err(ImportError::InvalidMessage(err)),
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                err.report();
                MessageOutcome::Skipped(err)
            }
        }
    }

    async fn ingest(&self, pool: &PgPool, message: &ArchiveMessage) -> ImportResult<MessageOutcome> {
        let topic_id = message
            .topic_id_text()
            .ok_or_else(|| ImportError::MissingTopicId {
                msg_id: message.msg_id_text(),
            })?;

        let topic = TopicRegistrar::new(pool)
            .register_if_new(&topic_id, message.subject_text().as_deref())
            .await?;

        let internal_id = MessageIngestor::new(pool).insert(message).await?;

        let attachments = if self.config.process_attachments {
            let linker = AttachmentLinker::new(
                pool,
                &self.config.input_dir,
                &self.config.attachment_output_dir,
            );
            let outcomes = linker.link(message).await;
            for outcome in &outcomes {
                if let AttachmentOutcome::Skipped(err) = outcome {
                    err.report();
                }
            }
            outcomes
        } else {
            log::debug!("skipping attachments for message {:?}", message.msg_id_text());
            Vec::new()
        };

        Ok(MessageOutcome::Ingested {
            internal_id,
            topic,
            attachments,
        })
    }
}
