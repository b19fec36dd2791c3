//! Import statistics tracking.
//!
//! Counts what an import run wrote and what it had to skip, per scope.

use crate::import::outcome::{AttachmentOutcome, MessageOutcome, TopicOutcome};
use crate::error::ImportError;
use std::fmt;

/// Statistics for an import run or a single file within it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Topic files that were read and parsed
    pub files_imported: usize,
    /// Topic files skipped because they could not be read or parsed
    pub files_skipped: usize,
    pub messages_ingested: usize,
    pub messages_skipped: usize,
    pub topics_registered: usize,
    pub attachments_linked: usize,
    /// Descriptors whose payload was not found on disk
    pub attachments_missing: usize,
    /// Descriptors that failed for any other reason
    pub attachments_failed: usize,
}

impl ImportStats {
    /// Fold one file's counts into the run total.
    pub fn merge(&mut self, other: ImportStats) {
        self.files_imported += other.files_imported;
        self.files_skipped += other.files_skipped;
        self.messages_ingested += other.messages_ingested;
        self.messages_skipped += other.messages_skipped;
        self.topics_registered += other.topics_registered;
        self.attachments_linked += other.attachments_linked;
        self.attachments_missing += other.attachments_missing;
        self.attachments_failed += other.attachments_failed;
    }

    pub fn record_message(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Ingested {
                topic, attachments, ..
            } => {
                self.messages_ingested += 1;
                if matches!(topic, TopicOutcome::Registered { .. }) {
                    self.topics_registered += 1;
                }
                for attachment in attachments {
                    self.record_attachment(attachment);
                }
            }
            MessageOutcome::Skipped(_) => self.messages_skipped += 1,
        }
    }

    fn record_attachment(&mut self, outcome: &AttachmentOutcome) {
        match outcome {
            AttachmentOutcome::Linked { .. } => self.attachments_linked += 1,
            AttachmentOutcome::Skipped(ImportError::AttachmentMissing { .. }) => {
                self.attachments_missing += 1
            }
            AttachmentOutcome::Skipped(_) => self.attachments_failed += 1,
        }
    }
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files ({} skipped), {} messages ({} skipped), {} topics, {} attachments ({} missing, {} failed)",
            self.files_imported,
            self.files_skipped,
            self.messages_ingested,
            self.messages_skipped,
            self.topics_registered,
            self.attachments_linked,
            self.attachments_missing,
            self.attachments_failed
        )
    }
}
