use std::path::PathBuf;

use clap::Parser;

use archive_importer::{ArchiveImporter, ImportConfig};

#[derive(Parser, Debug)]
#[command(
    name = "archive-importer",
    about = "Import a topic archive export into PostgreSQL"
)]
struct Args {
    /// PostgreSQL connection string (defaults to `DATABASE_URL`).
    #[arg(long)]
    database_url: Option<String>,

    /// Directory holding the exported topic `*.json` files
    /// (defaults to `ARCHIVE_INPUT_DIR`).
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory attachment payloads are copied into
    /// (defaults to `ARCHIVE_ATTACHMENT_OUTPUT_DIR`).
    #[arg(long)]
    attachment_output_dir: Option<PathBuf>,

    /// Keep existing rows instead of truncating the tables first.
    #[arg(long)]
    no_truncate: bool,

    /// Ignore attachment metadata entirely.
    #[arg(long)]
    skip_attachments: bool,
}

impl Args {
    fn into_config(self, mut config: ImportConfig) -> ImportConfig {
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(dir) = self.input_dir {
            config.input_dir = dir;
        }
        if let Some(dir) = self.attachment_output_dir {
            config.attachment_output_dir = dir;
        }
        if self.no_truncate {
            config.truncate_tables = false;
        }
        if self.skip_attachments {
            config.process_attachments = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    archive_importer::init_logger();

    let config = Args::parse().into_config(ImportConfig::from_env());
    log::info!(
        "truncate tables: {}, process attachments: {}",
        config.truncate_tables,
        config.process_attachments
    );

    let stats = ArchiveImporter::new(config).run().await?;
    log::info!("finished: {}", stats);
    Ok(())
}
