//! In-memory ledger store, for tests
//!
//! Mirrors the SQLite implementation's constraints: master uniqueness on
//! (company id, counterparty id) and transaction uniqueness on interaction id.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    Company, InsertOutcome, LedgerStore, LedgerVariant, LinkOutcome, MasterRow, NewTransaction,
};
use crate::types::Result;

/// A recorded transaction, exposed so tests can assert on row contents.
#[derive(Debug, Clone)]
pub struct StoredTransaction {
    pub id: i64,
    pub master_id: i64,
    pub kind_label: &'static str,
    pub amount: i64,
    pub note: String,
    pub initiator_id: String,
    pub status: &'static str,
    pub interaction_id: String,
    pub message_id: Option<String>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    companies: Vec<Company>,
    /// (variant stem, company_id, counterparty_id) → master
    masters: HashMap<(&'static str, i64, i64), MasterRow>,
    /// (variant stem, interaction_id) → transaction
    transactions: Vec<(&'static str, StoredTransaction)>,
    links: Vec<(i64, String, Option<String>)>,
}

impl Tables {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Test double for [`LedgerStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transactions recorded for a variant, in insertion order.
    pub fn transactions(&self, variant: LedgerVariant) -> Vec<StoredTransaction> {
        let tables = self.tables.lock().unwrap();
        tables
            .transactions
            .iter()
            .filter(|(stem, _)| *stem == variant.stem())
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// Number of master rows for a variant.
    pub fn master_count(&self, variant: LedgerVariant) -> usize {
        let tables = self.tables.lock().unwrap();
        tables
            .masters
            .keys()
            .filter(|(stem, _, _)| *stem == variant.stem())
            .count()
    }

    pub fn links(&self) -> Vec<(i64, String, Option<String>)> {
        self.tables.lock().unwrap().links.clone()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryStore {
    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.companies.iter().find(|c| c.code == code).cloned())
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        let tables = self.tables.lock().unwrap();
        let mut companies = tables.companies.clone();
        companies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(companies)
    }

    async fn upsert_company(&self, code: &str, name: &str) -> Result<Company> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.companies.iter_mut().find(|c| c.code == code) {
            existing.name = name.to_string();
            existing.last_updated = Some(Utc::now());
            return Ok(existing.clone());
        }
        let id = tables.alloc_id();
        let company = Company {
            id,
            code: code.to_string(),
            name: name.to_string(),
            last_updated: Some(Utc::now()),
        };
        tables.companies.push(company.clone());
        Ok(company)
    }

    async fn upsert_master(
        &self,
        variant: LedgerVariant,
        company_id: i64,
        counterparty_id: i64,
        counterparty_name: &str,
    ) -> Result<MasterRow> {
        let mut tables = self.tables.lock().unwrap();
        let key = (variant.stem(), company_id, counterparty_id);
        if let Some(existing) = tables.masters.get_mut(&key) {
            existing.counterparty_name = counterparty_name.to_string();
            return Ok(existing.clone());
        }
        let id = tables.alloc_id();
        let master = MasterRow {
            id,
            company_id,
            counterparty_id,
            counterparty_name: counterparty_name.to_string(),
            created_at: Utc::now(),
        };
        tables.masters.insert(key, master.clone());
        Ok(master)
    }

    async fn find_master(
        &self,
        variant: LedgerVariant,
        company_id: i64,
        counterparty_id: i64,
    ) -> Result<Option<MasterRow>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .masters
            .get(&(variant.stem(), company_id, counterparty_id))
            .cloned())
    }

    async fn insert_transaction(
        &self,
        variant: LedgerVariant,
        txn: NewTransaction,
    ) -> Result<InsertOutcome> {
        let mut tables = self.tables.lock().unwrap();
        let duplicate = tables
            .transactions
            .iter()
            .any(|(stem, t)| *stem == variant.stem() && t.interaction_id == txn.interaction_id);
        if duplicate {
            return Ok(InsertOutcome::Duplicate);
        }
        let id = tables.alloc_id();
        tables.transactions.push((
            variant.stem(),
            StoredTransaction {
                id,
                master_id: txn.master_id,
                kind_label: txn.kind.label(variant),
                amount: txn.amount,
                note: txn.note,
                initiator_id: txn.initiator_id,
                status: "confirmed",
                interaction_id: txn.interaction_id,
                message_id: None,
            },
        ));
        Ok(InsertOutcome::Inserted(id))
    }

    async fn set_transaction_message_id(
        &self,
        variant: LedgerVariant,
        transaction_id: i64,
        message_id: &str,
    ) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some((_, t)) = tables
            .transactions
            .iter_mut()
            .find(|(stem, t)| *stem == variant.stem() && t.id == transaction_id)
        {
            t.message_id = Some(message_id.to_string());
        }
        Ok(())
    }

    async fn link_channel(
        &self,
        company_id: i64,
        channel_id: &str,
        channel_name: Option<&str>,
    ) -> Result<LinkOutcome> {
        let mut tables = self.tables.lock().unwrap();
        let duplicate = tables
            .links
            .iter()
            .any(|(cid, ch, _)| *cid == company_id && ch == channel_id);
        if duplicate {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        tables
            .links
            .push((company_id, channel_id.to_string(), channel_name.map(String::from)));
        Ok(LinkOutcome::Linked)
    }
}
