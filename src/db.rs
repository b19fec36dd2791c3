use crate::error::{ImportError, ImportResult};
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

/// Open the single connection an import run works through.
///
/// Per-row statement logging is pushed down to `trace`; at `info` it would
/// print every insert of a large archive.
pub async fn connect(database_url: &str) -> ImportResult<PgPool> {
    let options: PgConnectOptions = database_url.parse().map_err(ImportError::Connect)?;
    let options = options.log_statements(LevelFilter::Trace);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(ImportError::Connect)?;

    log::info!("connected to database");
    Ok(pool)
}
