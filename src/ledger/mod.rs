//! Ledger service
//!
//! Sole owner of write access to the ledger masters and transactions. The
//! forward direction (donate / invest) creates its own master on first use;
//! the reverse direction (repay / return) requires the master to already
//! exist — a reverse transaction can never open an un-funded ledger line.
//!
//! Every write is keyed on the platform interaction id, so redelivered queue
//! messages land on the uniqueness constraint instead of double-recording.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::store::{
    Company, InsertOutcome, LedgerStore, LedgerVariant, NewTransaction, TransactionKind,
};
use crate::types::{Result, TellerError};

/// One record request, forward or reverse.
#[derive(Debug, Clone)]
pub struct RecordRequest {
    /// Company short code as typed (matched uppercase)
    pub company_code: String,
    /// Counterparty game id (issuer or resolved delegate)
    pub counterparty_id: i64,
    pub counterparty_name: String,
    /// Raw amount text, validated before any write
    pub amount: String,
    pub note: Option<String>,
    /// Platform user id of whoever issued the command
    pub initiator_id: String,
    /// Platform interaction id (delivery-dedup key)
    pub interaction_id: String,
}

/// What a record operation did.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded {
        transaction_id: i64,
        company: Company,
        amount: i64,
    },
    /// The same interaction was already recorded (queue redelivery); nothing written.
    AlreadyRecorded { company: Company },
}

/// Append-only ledger operations over a [`LedgerStore`].
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Record a contribution or investment. Upserts the master on
    /// (company, counterparty), then appends one confirmed transaction.
    pub async fn record_forward(
        &self,
        variant: LedgerVariant,
        req: RecordRequest,
    ) -> Result<RecordOutcome> {
        let amount = validate_amount(&req.amount)?;
        let company = self.lookup_company(&req.company_code).await?;

        let master = self
            .store
            .upsert_master(
                variant,
                company.id,
                req.counterparty_id,
                &req.counterparty_name,
            )
            .await?;

        self.append(variant, TransactionKind::Forward, master.id, amount, req, company)
            .await
    }

    /// Record a repayment or return. The master must already exist.
    pub async fn record_reverse(
        &self,
        variant: LedgerVariant,
        req: RecordRequest,
    ) -> Result<RecordOutcome> {
        let amount = validate_amount(&req.amount)?;
        let company = self.lookup_company(&req.company_code).await?;

        let master = self
            .store
            .find_master(variant, company.id, req.counterparty_id)
            .await?
            .ok_or_else(|| {
                TellerError::State(format!(
                    "No prior record found for `{}` under your ID. Cannot record {}.",
                    company.code,
                    TransactionKind::Reverse.label(variant)
                ))
            })?;

        self.append(variant, TransactionKind::Reverse, master.id, amount, req, company)
            .await
    }

    /// Read-only company projection.
    pub async fn companies(&self) -> Result<Vec<Company>> {
        self.store.list_companies().await
    }

    async fn lookup_company(&self, code: &str) -> Result<Company> {
        let code = code.to_uppercase();
        self.store
            .find_company_by_code(&code)
            .await?
            .ok_or_else(|| {
                TellerError::Validation(format!("`{code}` is invalid / company not found"))
            })
    }

    async fn append(
        &self,
        variant: LedgerVariant,
        kind: TransactionKind,
        master_id: i64,
        amount: i64,
        req: RecordRequest,
        company: Company,
    ) -> Result<RecordOutcome> {
        let outcome = self
            .store
            .insert_transaction(
                variant,
                NewTransaction {
                    master_id,
                    kind,
                    amount,
                    note: req.note.unwrap_or_else(|| kind.label(variant).to_string()),
                    initiator_id: req.initiator_id,
                    interaction_id: req.interaction_id.clone(),
                    recorded_at: Utc::now(),
                },
            )
            .await?;

        match outcome {
            InsertOutcome::Inserted(transaction_id) => {
                info!(
                    company = %company.code,
                    kind = kind.label(variant),
                    amount,
                    "ledger transaction recorded"
                );
                Ok(RecordOutcome::Recorded {
                    transaction_id,
                    company,
                    amount,
                })
            }
            InsertOutcome::Duplicate => {
                info!(
                    company = %company.code,
                    interaction = %req.interaction_id,
                    "duplicate delivery, transaction already recorded"
                );
                Ok(RecordOutcome::AlreadyRecorded { company })
            }
        }
    }
}

/// Parse and validate an amount: a positive integer in whole currency units.
///
/// Runs before any write; zero, negative, and non-numeric input never reach
/// the store.
pub fn validate_amount(raw: &str) -> Result<i64> {
    let amount: i64 = raw
        .trim()
        .parse()
        .map_err(|_| TellerError::Validation(format!("Invalid amount: `{raw}`. Must be a number.")))?;
    if amount <= 0 {
        return Err(TellerError::Validation(format!(
            "Invalid amount: `{amount}`. Must be greater than 0."
        )));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn req(interaction_id: &str, amount: &str) -> RecordRequest {
        RecordRequest {
            company_code: "abc".to_string(),
            counterparty_id: 3694180,
            counterparty_name: "pzero [3694180]".to_string(),
            amount: amount.to_string(),
            note: Some("Initial Funding".to_string()),
            initiator_id: "3694180".to_string(),
            interaction_id: interaction_id.to_string(),
        }
    }

    async fn service_with_company() -> (LedgerService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        (LedgerService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn forward_twice_one_master_two_transactions() {
        let (service, store) = service_with_company().await;

        service
            .record_forward(LedgerVariant::Donation, req("ix-1", "100"))
            .await
            .unwrap();
        service
            .record_forward(LedgerVariant::Donation, req("ix-2", "200"))
            .await
            .unwrap();

        assert_eq!(store.master_count(LedgerVariant::Donation), 1);
        let txns = store.transactions(LedgerVariant::Donation);
        assert_eq!(txns.len(), 2);
        assert!(txns.iter().all(|t| t.status == "confirmed"));
        assert!(txns.iter().all(|t| t.kind_label == "donation"));
    }

    #[tokio::test]
    async fn reverse_without_forward_rejected_with_no_rows() {
        let (service, store) = service_with_company().await;

        let err = service
            .record_reverse(LedgerVariant::Donation, req("ix-1", "50"))
            .await
            .unwrap_err();

        assert!(matches!(err, TellerError::State(_)));
        assert_eq!(store.master_count(LedgerVariant::Donation), 0);
        assert!(store.transactions(LedgerVariant::Donation).is_empty());
    }

    #[tokio::test]
    async fn reverse_after_forward_appends_to_existing_master() {
        let (service, store) = service_with_company().await;

        service
            .record_forward(LedgerVariant::Investment, req("ix-1", "1000"))
            .await
            .unwrap();
        service
            .record_reverse(LedgerVariant::Investment, req("ix-2", "400"))
            .await
            .unwrap();

        assert_eq!(store.master_count(LedgerVariant::Investment), 1);
        let txns = store.transactions(LedgerVariant::Investment);
        assert_eq!(txns[0].kind_label, "investment");
        assert_eq!(txns[1].kind_label, "return");
    }

    #[tokio::test]
    async fn bad_amounts_rejected_before_any_write() {
        let (service, store) = service_with_company().await;

        for bad in ["abc", "0", "-5"] {
            let err = service
                .record_forward(LedgerVariant::Donation, req("ix-1", bad))
                .await
                .unwrap_err();
            assert!(matches!(err, TellerError::Validation(_)), "{bad} accepted");
        }
        assert_eq!(store.master_count(LedgerVariant::Donation), 0);
        assert!(store.transactions(LedgerVariant::Donation).is_empty());

        let outcome = service
            .record_forward(LedgerVariant::Donation, req("ix-2", "250"))
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded { amount: 250, .. }));
    }

    #[tokio::test]
    async fn unknown_company_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = LedgerService::new(store.clone());

        let err = service
            .record_forward(LedgerVariant::Donation, req("ix-1", "100"))
            .await
            .unwrap_err();

        assert!(matches!(err, TellerError::Validation(_)));
        assert!(store.transactions(LedgerVariant::Donation).is_empty());
    }

    #[tokio::test]
    async fn redelivered_interaction_not_double_recorded() {
        let (service, store) = service_with_company().await;

        service
            .record_forward(LedgerVariant::Donation, req("ix-1", "100"))
            .await
            .unwrap();
        let outcome = service
            .record_forward(LedgerVariant::Donation, req("ix-1", "100"))
            .await
            .unwrap();

        assert!(matches!(outcome, RecordOutcome::AlreadyRecorded { .. }));
        assert_eq!(store.transactions(LedgerVariant::Donation).len(), 1);
    }

    #[test]
    fn amount_validation_edge_cases() {
        assert!(validate_amount("abc").is_err());
        assert!(validate_amount("0").is_err());
        assert!(validate_amount("-5").is_err());
        assert!(validate_amount("2.5").is_err());
        assert_eq!(validate_amount("250").unwrap(), 250);
        assert_eq!(validate_amount(" 250 ").unwrap(), 250);
    }
}
