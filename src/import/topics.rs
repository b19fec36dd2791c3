use crate::error::{ImportError, ImportResult};
use crate::import::outcome::TopicOutcome;
use crate::models::is_reply_subject;
use sqlx::PgPool;

/// Inserts a topic row the first time an original (non-reply) post for its
/// external id is seen.
///
/// Topics whose only messages are replies never get a row; their messages
/// still reference the topic id by value.
pub struct TopicRegistrar<'a> {
    pool: &'a PgPool,
}

impl<'a> TopicRegistrar<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// `topic_id` is the export's value in text form; the `topicid` column
    /// type decides whether it is usable.
    pub async fn register_if_new(
        &self,
        topic_id: &str,
        subject: Option<&str>,
    ) -> ImportResult<TopicOutcome> {
        let existing: Vec<i32> =
            sqlx::query_scalar("SELECT internaltopicid FROM public.topics WHERE topicid = $1::integer")
                .bind(topic_id)
                .fetch_all(self.pool)
                .await
                .map_err(|source| ImportError::TopicLookup {
                    topic_id: topic_id.to_string(),
                    source,
                })?;

        match existing.len() {
            0 => {}
            1 => return Ok(TopicOutcome::AlreadyRegistered),
            count => {
                log::warn!("multiple topics for {}: {} rows", topic_id, count);
                return Ok(TopicOutcome::Duplicated { rows: count });
            }
        }

        let Some(subject) = subject else {
            log::debug!("topic {} not registered: message has no subject", topic_id);
            return Ok(TopicOutcome::MissingSubject);
        };

        if is_reply_subject(subject) {
            return Ok(TopicOutcome::ReplySubject);
        }

        let internal_id: i32 = sqlx::query_scalar(
            "INSERT INTO public.topics (topicid, subject) VALUES ($1::integer, $2) RETURNING internaltopicid",
        )
        .bind(topic_id)
        .bind(subject)
        .fetch_one(self.pool)
        .await
        .map_err(|source| ImportError::TopicInsert {
            topic_id: topic_id.to_string(),
            source,
        })?;

        log::debug!("registered topic {} as {}", topic_id, internal_id);
        Ok(TopicOutcome::Registered { internal_id })
    }
}
