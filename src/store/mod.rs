//! Relational ledger store
//!
//! The store is an external collaborator reached through the [`LedgerStore`]
//! trait: company lookup, master upsert/find per ledger variant, append-only
//! transaction inserts, and the company ↔ channel link table. Uniqueness
//! constraints live here: masters on (company id, counterparty id) and
//! transactions on the platform interaction id, which is what makes duplicate
//! queue delivery safe.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::Result;

/// Which of the two structurally identical ledgers a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerVariant {
    Donation,
    Investment,
}

impl LedgerVariant {
    /// Table-name stem for this variant.
    pub fn stem(self) -> &'static str {
        match self {
            LedgerVariant::Donation => "donation",
            LedgerVariant::Investment => "investment",
        }
    }
}

/// Transaction direction within a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Money into the company (donation / investment)
    Forward,
    /// Money back out (repayment / return)
    Reverse,
}

impl TransactionKind {
    /// Row label, matching the variant's vocabulary.
    pub fn label(self, variant: LedgerVariant) -> &'static str {
        match (variant, self) {
            (LedgerVariant::Donation, TransactionKind::Forward) => "donation",
            (LedgerVariant::Donation, TransactionKind::Reverse) => "repayment",
            (LedgerVariant::Investment, TransactionKind::Forward) => "investment",
            (LedgerVariant::Investment, TransactionKind::Reverse) => "return",
        }
    }
}

/// One registered company.
#[derive(Debug, Clone)]
pub struct Company {
    pub id: i64,
    /// Short code members type into commands, stored uppercase
    pub code: String,
    pub name: String,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Per-(company, counterparty) aggregate anchoring a transaction chain.
#[derive(Debug, Clone)]
pub struct MasterRow {
    pub id: i64,
    pub company_id: i64,
    pub counterparty_id: i64,
    pub counterparty_name: String,
    pub created_at: DateTime<Utc>,
}

/// A transaction to append. `interaction_id` is the delivery-dedup key.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub master_id: i64,
    pub kind: TransactionKind,
    pub amount: i64,
    pub note: String,
    pub initiator_id: String,
    pub interaction_id: String,
    pub recorded_at: DateTime<Utc>,
}

/// Result of attempting a transaction append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New row, with its id
    Inserted(i64),
    /// The interaction id was already recorded; nothing was written
    Duplicate,
}

/// Result of linking a company to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
}

/// Row-level store operations the ledger core needs.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>>;

    async fn list_companies(&self) -> Result<Vec<Company>>;

    /// Insert-or-keep a company row keyed on its short code. Used by seeding
    /// and ops tooling; the worker itself only reads companies.
    async fn upsert_company(&self, code: &str, name: &str) -> Result<Company>;

    /// Idempotent upsert on (company_id, counterparty_id). Safe under
    /// duplicate delivery; re-upserting returns the existing row.
    async fn upsert_master(
        &self,
        variant: LedgerVariant,
        company_id: i64,
        counterparty_id: i64,
        counterparty_name: &str,
    ) -> Result<MasterRow>;

    async fn find_master(
        &self,
        variant: LedgerVariant,
        company_id: i64,
        counterparty_id: i64,
    ) -> Result<Option<MasterRow>>;

    /// Append-only insert. A duplicate interaction id yields
    /// [`InsertOutcome::Duplicate`] and writes nothing.
    async fn insert_transaction(
        &self,
        variant: LedgerVariant,
        txn: NewTransaction,
    ) -> Result<InsertOutcome>;

    /// Attach the platform message id to a recorded transaction for
    /// traceability. Best-effort; the transaction is already committed.
    async fn set_transaction_message_id(
        &self,
        variant: LedgerVariant,
        transaction_id: i64,
        message_id: &str,
    ) -> Result<()>;

    async fn link_channel(
        &self,
        company_id: i64,
        channel_id: &str,
        channel_name: Option<&str>,
    ) -> Result<LinkOutcome>;
}
