//! Attachment linking and payload copy.
//!
//! The export keeps attachment payloads next to the topic files as
//! `<input>/<msgId>_attachments/<fileId>-<filename>`, with whitespace in the
//! filename already replaced by hyphens. Payloads that are present are copied
//! flat into the output directory under the same `<fileId>-<filename>` name
//! and recorded in the `attachments` table.

use crate::error::{ImportError, ImportResult};
use crate::import::outcome::AttachmentOutcome;
use crate::models::{ArchiveMessage, AttachmentDescriptor, column_text};
use sqlx::PgPool;
use std::path::{Path, PathBuf};

/// Replace whitespace, byte-order marks and no-break spaces with `-`, one
/// hyphen per character.
///
/// "Whitespace" is the set the exporter used when naming files on disk,
/// which leaves out U+0085 (NEXT LINE).
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if is_export_space(c) { '-' } else { c })
        .collect()
}

fn is_export_space(c: char) -> bool {
    match c {
        '\u{85}' => false,
        '\u{feff}' | '\u{a0}' => true,
        c => c.is_whitespace(),
    }
}

/// Name an attachment is stored under, both in the export and the output.
pub fn internal_name(file_id: impl std::fmt::Display, sanitized_filename: &str) -> String {
    format!("{}-{}", file_id, sanitized_filename)
}

pub fn attachment_source_path(input_dir: &Path, msg_id: &str, internal_name: &str) -> PathBuf {
    input_dir
        .join(format!("{}_attachments", msg_id))
        .join(internal_name)
}

/// Where one descriptor resolves to on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    /// Export `msgId` in text form; `attachments.messageid` parses it.
    pub msg_id: String,
    pub filename: String,
    pub internal_name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
}

pub struct AttachmentLinker<'a> {
    pool: &'a PgPool,
    input_dir: &'a Path,
    output_dir: &'a Path,
}

impl<'a> AttachmentLinker<'a> {
    pub fn new(pool: &'a PgPool, input_dir: &'a Path, output_dir: &'a Path) -> Self {
        Self {
            pool,
            input_dir,
            output_dir,
        }
    }

    pub fn resolve(
        &self,
        msg_id: Option<&str>,
        descriptor: &AttachmentDescriptor,
    ) -> ImportResult<ResolvedAttachment> {
        let incomplete = |field| ImportError::IncompleteAttachment {
            msg_id: msg_id.map(str::to_string),
            field,
        };

        let msg_id = msg_id.ok_or_else(|| incomplete("msgId"))?;
        let filename = column_text(&descriptor.filename).ok_or_else(|| incomplete("filename"))?;
        let file_id = column_text(&descriptor.file_id).ok_or_else(|| incomplete("fileId"))?;

        let filename = sanitize_filename(&filename);
        let internal_name = internal_name(&file_id, &filename);
        let source = attachment_source_path(self.input_dir, msg_id, &internal_name);
        let destination = self.output_dir.join(&internal_name);

        Ok(ResolvedAttachment {
            msg_id: msg_id.to_string(),
            filename,
            internal_name,
            source,
            destination,
        })
    }

    /// Link every attachment the message describes.
    ///
    /// Each descriptor is handled on its own; a failure only skips that one
    /// attachment.
    pub async fn link(&self, message: &ArchiveMessage) -> Vec<AttachmentOutcome> {
        let descriptors = message.attachment_descriptors();
        let msg_id = message.msg_id_text();

        let mut outcomes = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let result = match descriptor {
                Ok(descriptor) => self.link_one(msg_id.as_deref(), &descriptor).await,
                Err(source) => Err(ImportError::InvalidAttachment {
                    msg_id: msg_id.clone(),
                    source,
                }),
            };
            let outcome = match result {
                Ok((internal_id, internal_name)) => AttachmentOutcome::Linked {
                    internal_id,
                    internal_name,
                },
                Err(err) => AttachmentOutcome::Skipped(err),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn link_one(
        &self,
        msg_id: Option<&str>,
        descriptor: &AttachmentDescriptor,
    ) -> ImportResult<(i32, String)> {
        let attachment = self.resolve(msg_id, descriptor)?;

        let exists = tokio::fs::try_exists(&attachment.source)
            .await
            .map_err(|source| ImportError::AttachmentProbe {
                path: attachment.source.clone(),
                source,
            })?;
        if !exists {
            return Err(ImportError::AttachmentMissing {
                path: attachment.source,
            });
        }

        log::info!(
            "attachment exists for message {}: {}",
            attachment.msg_id,
            attachment.source.display()
        );

        // Copy before inserting so a row never points at a file that is not there.
        tokio::fs::copy(&attachment.source, &attachment.destination)
            .await
            .map_err(|source| ImportError::AttachmentCopy {
                from: attachment.source.clone(),
                to: attachment.destination.clone(),
                source,
            })?;
        log::debug!(
            "{} was copied to {}",
            attachment.internal_name,
            self.output_dir.display()
        );

        let internal_id: i32 = sqlx::query_scalar(
            r#"INSERT INTO public.attachments (messageid, attachmentfilename, attachmentinternalname)
               VALUES ($1::integer, $2, $3)
               RETURNING internalattachmentid"#,
        )
        .bind(&attachment.msg_id)
        .bind(&attachment.filename)
        .bind(&attachment.internal_name)
        .fetch_one(self.pool)
        .await
        .map_err(|source| ImportError::AttachmentInsert {
            internal_name: attachment.internal_name.clone(),
            source,
        })?;

        Ok((internal_id, attachment.internal_name))
    }
}
