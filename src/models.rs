use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// ===== Source Export Models =====

/// One topic-export file: `{"messages": [...]}`.
///
/// Messages stay as raw JSON here so a single malformed entry can be rejected
/// on its own without discarding the rest of the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveDocument {
    pub messages: Vec<serde_json::Value>,
}

/// A message object as it appears in the export.
///
/// Every field is optional; anything missing is stored as NULL. Scalar fields
/// keep whatever JSON value the export holds, since the only typing they get
/// is the target column's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMessage {
    pub topic_id: Option<FieldValue>,
    pub subject: Option<FieldValue>,
    pub num_messages_in_topic: Option<FieldValue>,
    pub next_in_time: Option<FieldValue>,
    pub system_message: Option<FieldValue>,
    pub from: Option<FieldValue>,
    pub author_name: Option<FieldValue>,
    pub msg_snippet: Option<FieldValue>,
    pub msg_id: Option<FieldValue>,
    pub message_body: Option<FieldValue>,
    pub profile: Option<FieldValue>,
    pub user_id: Option<FieldValue>,
    pub prev_in_time: Option<FieldValue>,
    // The export really does spell it this way.
    pub content_trasformed: Option<FieldValue>,
    pub post_date: Option<FieldValue>,
    pub next_in_topic: Option<FieldValue>,
    pub prev_in_topic: Option<FieldValue>,
    pub attachments_info: Option<serde_json::Value>,
}

impl ArchiveMessage {
    /// Decode one entry of a file's `messages` array.
    ///
    /// Fails only when the entry is not a JSON object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn topic_id_text(&self) -> Option<String> {
        column_text(&self.topic_id)
    }

    pub fn msg_id_text(&self) -> Option<String> {
        column_text(&self.msg_id)
    }

    pub fn subject_text(&self) -> Option<String> {
        column_text(&self.subject)
    }

    /// Replies carry a case-sensitive `RE:` or `Re:` subject prefix.
    pub fn is_reply(&self) -> bool {
        self.subject_text().as_deref().is_some_and(is_reply_subject)
    }

    /// Decode `attachmentsInfo` one descriptor at a time.
    ///
    /// A missing or null list yields nothing. A value that is not a list
    /// yields a single error.
    pub fn attachment_descriptors(&self) -> Vec<Result<AttachmentDescriptor, serde_json::Error>> {
        match &self.attachments_info {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| serde_json::from_value(item.clone()))
                .collect(),
            Some(other) => vec![Err(serde::de::Error::custom(format!(
                "attachmentsInfo is not a list: {}",
                other
            )))],
        }
    }
}

pub fn is_reply_subject(subject: &str) -> bool {
    subject.starts_with("RE:") || subject.starts_with("Re:")
}

/// A scalar export field, kept as the JSON it arrived as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValue(pub serde_json::Value);

impl FieldValue {
    /// Text handed to PostgreSQL for this value; the column type parses it.
    ///
    /// Strings go through untouched, numbers and booleans in their literal
    /// form, and nested arrays or objects as JSON text. `null` has no text.
    pub fn to_column_text(&self) -> Option<String> {
        match &self.0 {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Number(n) => Some(number_text(n)),
            other => Some(other.to_string()),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_column_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

// Integral floats such as `5.0` render as `5`.
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

pub fn column_text(field: &Option<FieldValue>) -> Option<String> {
    field.as_ref().and_then(FieldValue::to_column_text)
}

/// One `attachmentsInfo` entry. `fileId` shows up as a number or a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub filename: Option<FieldValue>,
    pub file_id: Option<FieldValue>,
}

// ===== Target Table Rows =====

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TopicRow {
    pub internaltopicid: i32,
    pub topicid: i32,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MessageRow {
    pub internalmessageid: i32,
    pub nummessagesintopic: Option<i32>,
    pub nextintime: Option<i32>,
    pub systemmessage: Option<bool>,
    pub subject: Option<String>,
    pub messagefrom: Option<String>,
    pub authorname: Option<String>,
    pub msgsnippet: Option<String>,
    pub msgid: Option<i32>,
    pub rawemail: Option<String>,
    pub profile: Option<String>,
    pub userid: Option<i64>,
    pub previntime: Option<i32>,
    pub contenttrasformed: Option<bool>,
    pub postdate: Option<String>,
    pub nextintopic: Option<i32>,
    pub previntopic: Option<i32>,
    pub topicid: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AttachmentRow {
    pub internalattachmentid: i32,
    pub messageid: Option<i32>,
    pub attachmentfilename: Option<String>,
    pub attachmentinternalname: Option<String>,
}
