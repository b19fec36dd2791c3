use crate::error::{ImportError, ImportResult};
use crate::models::{ArchiveMessage, column_text};
use sqlx::PgPool;

/// Writes message rows exactly as they appear in the export.
///
/// No field is derived or normalized; column types are the only validation.
/// `msgId` is not unique, so importing the same files twice without a
/// truncate duplicates every row.
pub struct MessageIngestor<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageIngestor<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert one message, returning its generated `internalmessageid`.
    ///
    /// Every value is sent as text and cast to its column type by PostgreSQL,
    /// so whatever the column accepts is stored and whatever it rejects fails
    /// the insert.
    pub async fn insert(&self, message: &ArchiveMessage) -> ImportResult<i32> {
        let internal_id: i32 = sqlx::query_scalar(
            r#"INSERT INTO public.messages (
                nummessagesintopic, nextintime, systemmessage, subject, messagefrom,
                authorname, msgsnippet, msgid, rawemail, profile,
                userid, previntime, contenttrasformed, postdate, nextintopic,
                previntopic, topicid
               )
               VALUES (
                $1::integer, $2::integer, $3::boolean, $4, $5,
                $6, $7, $8::integer, $9, $10,
                $11::bigint, $12::integer, $13::boolean, $14, $15::integer,
                $16::integer, $17::integer
               )
               RETURNING internalmessageid"#,
        )
        .bind(column_text(&message.num_messages_in_topic))
        .bind(column_text(&message.next_in_time))
        .bind(column_text(&message.system_message))
        .bind(column_text(&message.subject))
        .bind(column_text(&message.from))
        .bind(column_text(&message.author_name))
        .bind(column_text(&message.msg_snippet))
        .bind(column_text(&message.msg_id))
        .bind(column_text(&message.message_body))
        .bind(column_text(&message.profile))
        .bind(column_text(&message.user_id))
        .bind(column_text(&message.prev_in_time))
        .bind(column_text(&message.content_trasformed))
        .bind(column_text(&message.post_date))
        .bind(column_text(&message.next_in_topic))
        .bind(column_text(&message.prev_in_topic))
        .bind(column_text(&message.topic_id))
        .fetch_one(self.pool)
        .await
        .map_err(|source| ImportError::MessageInsert {
            msg_id: message.msg_id_text(),
            source,
        })?;

        log::trace!("inserted message {:?} as {}", message.msg_id_text(), internal_id);
        Ok(internal_id)
    }
}
