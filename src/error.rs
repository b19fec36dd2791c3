use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Granularity at which an [`ImportError`] is contained.
///
/// Every failure is terminal for its own scope only: a `File` error skips one
/// file, a `Message` error skips one message, and so on. Only `Run` errors end
/// the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Run,
    Table,
    File,
    Message,
    Attachment,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to read archive directory {}: {source}", .path.display())]
    ReadDirectory { path: PathBuf, source: io::Error },
    #[error("schema step failed for table {table}: {source}")]
    Schema {
        table: &'static str,
        source: sqlx::Error,
    },
    #[error("failed to read {file}: {source}")]
    ReadFile { file: String, source: io::Error },
    #[error("failed to parse {file}: {source}")]
    ParseFile {
        file: String,
        source: serde_json::Error,
    },
    #[error("malformed message: {0}")]
    InvalidMessage(#[source] serde_json::Error),
    #[error("message {} has no topic id", display_id(.msg_id))]
    MissingTopicId { msg_id: Option<String> },
    #[error("topic lookup failed for topic {topic_id}: {source}")]
    TopicLookup {
        topic_id: String,
        source: sqlx::Error,
    },
    #[error("topic insert failed for topic {topic_id}: {source}")]
    TopicInsert {
        topic_id: String,
        source: sqlx::Error,
    },
    #[error("message insert failed for message {}: {source}", display_id(.msg_id))]
    MessageInsert {
        msg_id: Option<String>,
        source: sqlx::Error,
    },
    #[error("attachment descriptor on message {} is missing {field}", display_id(.msg_id))]
    IncompleteAttachment {
        msg_id: Option<String>,
        field: &'static str,
    },
    #[error("malformed attachment descriptor on message {}: {source}", display_id(.msg_id))]
    InvalidAttachment {
        msg_id: Option<String>,
        source: serde_json::Error,
    },
    #[error("attachment does not exist: {}", .path.display())]
    AttachmentMissing { path: PathBuf },
    #[error("failed to check attachment {}: {source}", .path.display())]
    AttachmentProbe { path: PathBuf, source: io::Error },
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    AttachmentCopy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("attachment insert failed for {internal_name}: {source}")]
    AttachmentInsert {
        internal_name: String,
        source: sqlx::Error,
    },
}

fn display_id(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("<unknown>")
}

impl ImportError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            ImportError::Connect(_) | ImportError::ReadDirectory { .. } => ErrorScope::Run,
            ImportError::Schema { .. } => ErrorScope::Table,
            ImportError::ReadFile { .. } | ImportError::ParseFile { .. } => ErrorScope::File,
            ImportError::InvalidMessage(_)
            | ImportError::MissingTopicId { .. }
            | ImportError::TopicLookup { .. }
            | ImportError::TopicInsert { .. }
            | ImportError::MessageInsert { .. } => ErrorScope::Message,
            ImportError::IncompleteAttachment { .. }
            | ImportError::InvalidAttachment { .. }
            | ImportError::AttachmentMissing { .. }
            | ImportError::AttachmentProbe { .. }
            | ImportError::AttachmentCopy { .. }
            | ImportError::AttachmentInsert { .. } => ErrorScope::Attachment,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Run
    }

    /// Emit the error at the severity its scope calls for.
    ///
    /// Nothing is ever retried, so this is the single place a failure is
    /// reported before the unit of work that produced it is abandoned.
    pub fn report(&self) {
        match self.scope() {
            ErrorScope::Run | ErrorScope::Table => log::error!("{}", self),
            ErrorScope::File | ErrorScope::Message => log::warn!("{}", self),
            ErrorScope::Attachment => match self {
                ImportError::AttachmentMissing { .. } => log::info!("{}", self),
                _ => log::warn!("{}", self),
            },
        }
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
