//! Tagged results of importing one message and its attachments.

use crate::error::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOutcome {
    Registered { internal_id: i32 },
    AlreadyRegistered,
    /// More than one row already carries this topic id. Left as is.
    Duplicated { rows: usize },
    /// First sighting was a reply, so no row is created.
    ReplySubject,
    MissingSubject,
}

#[derive(Debug)]
pub enum AttachmentOutcome {
    Linked {
        internal_id: i32,
        internal_name: String,
    },
    Skipped(ImportError),
}

impl AttachmentOutcome {
    pub fn is_linked(&self) -> bool {
        matches!(self, AttachmentOutcome::Linked { .. })
    }
}

#[derive(Debug)]
pub enum MessageOutcome {
    Ingested {
        internal_id: i32,
        topic: TopicOutcome,
        attachments: Vec<AttachmentOutcome>,
    },
    Skipped(ImportError),
}

impl MessageOutcome {
    pub fn is_ingested(&self) -> bool {
        matches!(self, MessageOutcome::Ingested { .. })
    }

    pub fn skip_reason(&self) -> Option<&ImportError> {
        match self {
            MessageOutcome::Skipped(reason) => Some(reason),
            MessageOutcome::Ingested { .. } => None,
        }
    }
}
