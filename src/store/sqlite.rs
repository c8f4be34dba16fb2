//! SQLite-backed ledger store
//!
//! One connection behind an async mutex; every statement the worker runs is a
//! single-row select, upsert, or insert, so contention is not a concern at
//! this scale. Timestamps are stored as RFC 3339 text.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tokio::sync::Mutex;

use super::{
    Company, InsertOutcome, LedgerStore, LedgerVariant, LinkOutcome, MasterRow, NewTransaction,
};
use crate::types::{Result, TellerError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS company (
    company_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    company_code  TEXT NOT NULL UNIQUE,
    company_name  TEXT NOT NULL,
    last_updated  TEXT
);

CREATE TABLE IF NOT EXISTS donation_master (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id         INTEGER NOT NULL REFERENCES company(company_id),
    counterparty_id    INTEGER NOT NULL,
    counterparty_name  TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    total_contributed  INTEGER,
    total_returned     INTEGER,
    UNIQUE(company_id, counterparty_id)
);

CREATE TABLE IF NOT EXISTS investment_master (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id         INTEGER NOT NULL REFERENCES company(company_id),
    counterparty_id    INTEGER NOT NULL,
    counterparty_name  TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    total_contributed  INTEGER,
    total_returned     INTEGER,
    UNIQUE(company_id, counterparty_id)
);

CREATE TABLE IF NOT EXISTS donation_transaction (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    master_id       INTEGER NOT NULL REFERENCES donation_master(id),
    kind            TEXT NOT NULL,
    amount          INTEGER NOT NULL CHECK (amount > 0),
    note            TEXT NOT NULL,
    initiator_id    TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'confirmed',
    interaction_id  TEXT NOT NULL UNIQUE,
    message_id      TEXT,
    recorded_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS investment_transaction (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    master_id       INTEGER NOT NULL REFERENCES investment_master(id),
    kind            TEXT NOT NULL,
    amount          INTEGER NOT NULL CHECK (amount > 0),
    note            TEXT NOT NULL,
    initiator_id    TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'confirmed',
    interaction_id  TEXT NOT NULL UNIQUE,
    message_id      TEXT,
    recorded_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS company_channel (
    company_id    INTEGER NOT NULL,
    channel_id    TEXT NOT NULL,
    channel_name  TEXT,
    UNIQUE(company_id, channel_id)
);
"#;

/// SQLite implementation of [`LedgerStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-process database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn db_err(e: rusqlite::Error) -> TellerError {
    TellerError::Database(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_company(row: &rusqlite::Row<'_>) -> rusqlite::Result<Company> {
    let last_updated: Option<String> = row.get(3)?;
    Ok(Company {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        last_updated: last_updated.map(parse_ts),
    })
}

fn row_to_master(row: &rusqlite::Row<'_>) -> rusqlite::Result<MasterRow> {
    let created_at: String = row.get(4)?;
    Ok(MasterRow {
        id: row.get(0)?,
        company_id: row.get(1)?,
        counterparty_id: row.get(2)?,
        counterparty_name: row.get(3)?,
        created_at: parse_ts(created_at),
    })
}

#[async_trait::async_trait]
impl LedgerStore for SqliteStore {
    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT company_id, company_code, company_name, last_updated
             FROM company WHERE company_code = ?1",
            params![code],
            row_to_company,
        )
        .optional()
        .map_err(db_err)
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT company_id, company_code, company_name, last_updated
                 FROM company ORDER BY company_code ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], row_to_company)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    async fn upsert_company(&self, code: &str, name: &str) -> Result<Company> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "INSERT INTO company (company_code, company_name, last_updated)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(company_code) DO UPDATE SET
                 company_name = excluded.company_name,
                 last_updated = excluded.last_updated
             RETURNING company_id, company_code, company_name, last_updated",
            params![code, name, Utc::now().to_rfc3339()],
            row_to_company,
        )
        .map_err(db_err)
    }

    async fn upsert_master(
        &self,
        variant: LedgerVariant,
        company_id: i64,
        counterparty_id: i64,
        counterparty_name: &str,
    ) -> Result<MasterRow> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT INTO {stem}_master (company_id, counterparty_id, counterparty_name, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(company_id, counterparty_id) DO UPDATE SET
                 counterparty_name = excluded.counterparty_name
             RETURNING id, company_id, counterparty_id, counterparty_name, created_at",
            stem = variant.stem()
        );
        conn.query_row(
            &sql,
            params![
                company_id,
                counterparty_id,
                counterparty_name,
                Utc::now().to_rfc3339()
            ],
            row_to_master,
        )
        .map_err(db_err)
    }

    async fn find_master(
        &self,
        variant: LedgerVariant,
        company_id: i64,
        counterparty_id: i64,
    ) -> Result<Option<MasterRow>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT id, company_id, counterparty_id, counterparty_name, created_at
             FROM {stem}_master WHERE company_id = ?1 AND counterparty_id = ?2",
            stem = variant.stem()
        );
        conn.query_row(&sql, params![company_id, counterparty_id], row_to_master)
            .optional()
            .map_err(db_err)
    }

    async fn insert_transaction(
        &self,
        variant: LedgerVariant,
        txn: NewTransaction,
    ) -> Result<InsertOutcome> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT INTO {stem}_transaction
                 (master_id, kind, amount, note, initiator_id, status, interaction_id, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'confirmed', ?6, ?7)
             RETURNING id",
            stem = variant.stem()
        );
        let result = conn.query_row(
            &sql,
            params![
                txn.master_id,
                txn.kind.label(variant),
                txn.amount,
                txn.note,
                txn.initiator_id,
                txn.interaction_id,
                txn.recorded_at.to_rfc3339()
            ],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(id) => Ok(InsertOutcome::Inserted(id)),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn set_transaction_message_id(
        &self,
        variant: LedgerVariant,
        transaction_id: i64,
        message_id: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "UPDATE {stem}_transaction SET message_id = ?1 WHERE id = ?2",
            stem = variant.stem()
        );
        conn.execute(&sql, params![message_id, transaction_id])
            .map_err(db_err)?;
        Ok(())
    }

    async fn link_channel(
        &self,
        company_id: i64,
        channel_id: &str,
        channel_name: Option<&str>,
    ) -> Result<LinkOutcome> {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO company_channel (company_id, channel_id, channel_name)
             VALUES (?1, ?2, ?3)",
            params![company_id, channel_id, channel_name],
        );
        match result {
            Ok(_) => Ok(LinkOutcome::Linked),
            Err(e) if is_unique_violation(&e) => Ok(LinkOutcome::AlreadyLinked),
            Err(e) => Err(db_err(e)),
        }
    }
}
