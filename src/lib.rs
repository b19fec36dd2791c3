pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;

pub use config::ImportConfig;
pub use error::{ErrorScope, ImportError, ImportResult};
pub use import::{ArchiveImporter, ImportStats};

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Install the process logger once; `RUST_LOG` overrides the default filter.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn")).init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    pub use database::{TestDatabase, TestDatabaseError};

    pub mod database {
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database for integration tests.
        ///
        /// Every instance gets its own empty database, so tests can provision
        /// and truncate the archive schema without stepping on each other.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            database_url: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Use `TEST_DATABASE_URL` when set, otherwise launch a disposable
            /// Postgres container.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) => Self::with_admin_url(&url, None).await,
                    Err(_) => Self::new().await,
                }
            }

            /// Provision a fresh database inside a new Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag("16-alpine").start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::with_admin_url(&admin_url, Some(container)).await
            }

            async fn with_admin_url(
                admin_url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = admin_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(base_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let database_options = base_options.clone().database(&new_db_name);
                let database_url = database_url_for(admin_url, &base_name, &new_db_name);

                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(database_options)
                    .await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options: base_options,
                    database_name: new_db_name,
                    database_url,
                    container,
                })
            }

            /// Single-connection pool, matching what an import run uses.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Connection string for the ephemeral database, for driving a
            /// full run through `ArchiveImporter::run`.
            pub fn database_url(&self) -> &str {
                &self.database_url
            }

            /// Close the pool and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }
                discard_database(self.admin_options.clone(), &self.database_name).await?;
                Ok(())
            }
        }

        fn database_url_for(admin_url: &str, base_name: &str, database_name: &str) -> String {
            let suffix = format!("/{}", base_name);
            match admin_url.rfind(&suffix) {
                Some(index) => format!(
                    "{}/{}{}",
                    &admin_url[..index],
                    database_name,
                    &admin_url[index + suffix.len()..]
                ),
                None => format!("{}/{}", admin_url.trim_end_matches('/'), database_name),
            }
        }

        /// Drop a test database along with any session still attached to it.
        ///
        /// `WITH (FORCE)` only exists from PostgreSQL 13 on; older servers reject
        /// the clause and get a plain drop instead.
        async fn discard_database(
            admin_options: PgConnectOptions,
            name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let forced = format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", name);
            let result = match sqlx::query(&forced).execute(&admin).await {
                Err(sqlx::Error::Database(err))
                    if matches!(err.code().as_deref(), Some("42601") | Some("0A000")) =>
                {
                    let plain = format!("DROP DATABASE IF EXISTS \"{}\"", name);
                    sqlx::query(&plain).execute(&admin).await.map(|_| ())
                }
                other => other.map(|_| ()),
            };

            admin.close().await;
            result
        }

        impl Drop for TestDatabase {
            // Covers tests that panic before reaching `close`.
            fn drop(&mut self) {
                let Some(pool) = self.pool.take() else {
                    return;
                };
                let admin_options = self.admin_options.clone();
                let name = std::mem::take(&mut self.database_name);

                let teardown = async move {
                    pool.close().await;
                    if let Err(err) = discard_database(admin_options, &name).await {
                        eprintln!("failed to drop test database {}: {}", name, err);
                    }
                };

                match Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(teardown);
                    }
                    Err(_) => {
                        std::thread::spawn(move || {
                            if let Ok(runtime) = tokio::runtime::Runtime::new() {
                                runtime.block_on(teardown);
                            }
                        });
                    }
                }
            }
        }

    }
}
