//! Runtime schema provisioning for the three archive tables.
//!
//! There is no migrations directory: each table is looked up in `pg_tables`
//! and created on the spot when missing, or emptied when the run asks for a
//! clean slate. Tables are handled one at a time and a failure on one never
//! stops the others from being checked.

use crate::error::{ImportError, ImportResult};
use sqlx::PgPool;

/// Definition of one target table and its identity sequence.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub id_column: &'static str,
    /// Column list for `CREATE TABLE`, id column included.
    pub columns: &'static str,
    pub primary_key: bool,
}

impl TableSpec {
    pub fn sequence_name(&self) -> String {
        format!("{}_{}_seq", self.name, self.id_column)
    }

    fn create_statements(&self) -> Vec<String> {
        let sequence = self.sequence_name();
        let mut statements = vec![
            format!("CREATE TABLE public.{} ({})", self.name, self.columns),
            format!(
                "CREATE SEQUENCE public.{} AS integer START WITH 1 INCREMENT BY 1 NO MINVALUE NO MAXVALUE CACHE 1",
                sequence
            ),
            format!(
                "ALTER SEQUENCE public.{} OWNED BY public.{}.{}",
                sequence, self.name, self.id_column
            ),
            format!(
                "ALTER TABLE ONLY public.{} ALTER COLUMN {} SET DEFAULT nextval('public.{}'::regclass)",
                self.name, self.id_column, sequence
            ),
        ];
        if self.primary_key {
            statements.push(format!(
                "ALTER TABLE ONLY public.{} ADD CONSTRAINT {}_pkey PRIMARY KEY ({})",
                self.name, self.name, self.id_column
            ));
        }
        statements
    }

    fn truncate_statements(&self) -> [String; 2] {
        [
            format!("TRUNCATE public.{}", self.name),
            format!("ALTER SEQUENCE public.{} RESTART", self.sequence_name()),
        ]
    }
}

pub const MESSAGES_TABLE: TableSpec = TableSpec {
    name: "messages",
    id_column: "internalmessageid",
    columns: r#"
        internalmessageid integer NOT NULL,
        nummessagesintopic integer,
        nextintime integer,
        systemmessage boolean,
        subject character varying(256),
        messagefrom character varying(256),
        authorname character varying(256),
        msgsnippet character varying(10485759),
        msgid integer,
        rawemail character varying(10485759),
        profile character varying(256),
        userid bigint,
        previntime integer,
        contenttrasformed boolean,
        postdate character varying(256),
        nextintopic integer,
        previntopic integer,
        topicid integer"#,
    primary_key: true,
};

// Topics has never had a primary key; lookups go through topicid.
pub const TOPICS_TABLE: TableSpec = TableSpec {
    name: "topics",
    id_column: "internaltopicid",
    columns: r#"
        internaltopicid integer NOT NULL,
        topicid integer NOT NULL,
        subject character varying"#,
    primary_key: false,
};

pub const ATTACHMENTS_TABLE: TableSpec = TableSpec {
    name: "attachments",
    id_column: "internalattachmentid",
    columns: r#"
        internalattachmentid integer NOT NULL,
        messageid integer,
        attachmentfilename character varying,
        attachmentinternalname character varying"#,
    primary_key: true,
};

/// Provisioning order.
pub const ARCHIVE_TABLES: [TableSpec; 3] = [MESSAGES_TABLE, TOPICS_TABLE, ATTACHMENTS_TABLE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    Created,
    Truncated,
    Kept,
}

/// What happened to each table during [`SchemaProvisioner::ensure_schema`].
#[derive(Debug, Default)]
pub struct SchemaReport {
    pub tables: Vec<(&'static str, ImportResult<TableAction>)>,
}

impl SchemaReport {
    pub fn action(&self, table: &str) -> Option<TableAction> {
        self.tables
            .iter()
            .find(|(name, _)| *name == table)
            .and_then(|(_, result)| result.as_ref().ok().copied())
    }

    pub fn failures(&self) -> usize {
        self.tables.iter().filter(|(_, result)| result.is_err()).count()
    }
}

pub struct SchemaProvisioner<'a> {
    pool: &'a PgPool,
}

impl<'a> SchemaProvisioner<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Make sure every archive table exists, truncating existing ones when asked.
    pub async fn ensure_schema(&self, truncate: bool) -> SchemaReport {
        let mut report = SchemaReport::default();

        for spec in ARCHIVE_TABLES {
            let result = self.ensure_table(&spec, truncate).await;
            if let Err(err) = &result {
                err.report();
            }
            report.tables.push((spec.name, result));
        }

        report
    }

    async fn ensure_table(&self, spec: &TableSpec, truncate: bool) -> ImportResult<TableAction> {
        let schema_err = |source| ImportError::Schema {
            table: spec.name,
            source,
        };

        if !self.table_exists(spec.name).await.map_err(schema_err)? {
            log::info!("{} table does not exist, creating", spec.name);
            self.create_table(spec).await.map_err(schema_err)?;
            return Ok(TableAction::Created);
        }

        log::info!("{} table exists", spec.name);
        if !truncate {
            return Ok(TableAction::Kept);
        }

        log::info!("truncating {} table", spec.name);
        for statement in spec.truncate_statements() {
            sqlx::query(&statement)
                .execute(self.pool)
                .await
                .map_err(schema_err)?;
        }
        Ok(TableAction::Truncated)
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT FROM pg_tables WHERE schemaname = 'public' AND tablename = $1)",
        )
        .bind(table)
        .fetch_one(self.pool)
        .await
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for statement in spec.create_statements() {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
