use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use super::domain::{
    FinancialTransaction, Fund, FundId, LedgerReference, Money, TransactionCategory,
    TransactionId, TransactionKind,
};
use crate::clock::Clock;
use crate::store::Table;
use crate::workflows::WorkflowError;

/// A fund with its journal. The balance and the journal only change together,
/// under the account mutex.
struct FundAccount {
    id: FundId,
    name: String,
    created_at: DateTime<Utc>,
    books: Mutex<Books>,
}

#[derive(Default)]
struct Books {
    balance: Money,
    journal: Vec<FinancialTransaction>,
}

impl FundAccount {
    fn snapshot(&self) -> Fund {
        Fund {
            id: self.id.clone(),
            name: self.name.clone(),
            balance: self.books.lock().balance,
            created_at: self.created_at,
        }
    }
}

/// Cached balance next to the balance recomputed from the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundReconciliation {
    pub fund_id: FundId,
    pub cached_balance: Money,
    pub journal_balance: Money,
    pub transaction_count: usize,
}

impl FundReconciliation {
    pub fn is_balanced(&self) -> bool {
        self.cached_balance == self.journal_balance
    }
}

/// Ledger entry request shared by inflows and outflows.
#[derive(Debug, Clone)]
pub struct Posting {
    pub amount: Money,
    pub category: TransactionCategory,
    pub description: String,
    pub reference: Option<LedgerReference>,
}

/// Named funds and their append-only transaction log.
///
/// Operations on different funds never contend; operations on one fund run
/// one at a time.
pub struct LedgerEngine {
    clock: Arc<dyn Clock>,
    funds: Table<FundId, Arc<FundAccount>>,
    transaction_sequence: AtomicU64,
}

impl LedgerEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            funds: Table::new("fund", "fund"),
            transaction_sequence: AtomicU64::new(0),
        }
    }

    pub fn create_fund(&self, name: &str) -> Result<Fund, WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::bad_request("fund name is required"));
        }

        self.funds.mutate_all(|rows| {
            if rows.values().any(|account| account.name == name) {
                return Err(WorkflowError::conflict(format!(
                    "fund {name} already exists"
                )));
            }
            let account = Arc::new(FundAccount {
                id: FundId(self.funds.next_key()),
                name: name.to_string(),
                created_at: self.clock.now(),
                books: Mutex::new(Books::default()),
            });
            rows.insert(account.id.clone(), Arc::clone(&account));
            info!(fund_id = %account.id, fund = name, "fund created");
            Ok(account.snapshot())
        })
    }

    pub fn fund_by_name(&self, name: &str) -> Option<Fund> {
        self.funds
            .find(|account| account.name == name)
            .map(|account| account.snapshot())
    }

    pub fn find_fund_or_fail(&self, id: &FundId) -> Result<Fund, WorkflowError> {
        Ok(self.funds.require(id)?.snapshot())
    }

    pub fn funds(&self) -> Vec<Fund> {
        self.funds
            .filter(|_| true)
            .iter()
            .map(|account| account.snapshot())
            .collect()
    }

    pub fn record_inflow(
        &self,
        fund_id: &FundId,
        posting: Posting,
    ) -> Result<FinancialTransaction, WorkflowError> {
        self.post(fund_id, TransactionKind::Inflow, posting)
    }

    /// Fails with `Conflict` instead of taking the balance below zero.
    pub fn record_outflow(
        &self,
        fund_id: &FundId,
        posting: Posting,
    ) -> Result<FinancialTransaction, WorkflowError> {
        self.post(fund_id, TransactionKind::Outflow, posting)
    }

    fn post(
        &self,
        fund_id: &FundId,
        kind: TransactionKind,
        posting: Posting,
    ) -> Result<FinancialTransaction, WorkflowError> {
        if !posting.amount.is_positive() {
            return Err(WorkflowError::bad_request(format!(
                "ledger amounts must be positive, got {}",
                posting.amount
            )));
        }
        let account = self.funds.require(fund_id)?;

        let mut books = account.books.lock();
        if kind == TransactionKind::Outflow && books.balance < posting.amount {
            return Err(WorkflowError::conflict(format!(
                "insufficient funds in {}: balance {}, requested {}",
                account.name, books.balance, posting.amount
            )));
        }

        let delta = match kind {
            TransactionKind::Inflow => posting.amount,
            TransactionKind::Outflow => Money(-posting.amount.0),
        };
        let balance = books.balance.checked_add(delta).ok_or_else(|| {
            WorkflowError::bad_request(format!(
                "posting {} to {} overflows its balance of {}",
                posting.amount, account.name, books.balance
            ))
        })?;

        let id = self.transaction_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let transaction = FinancialTransaction {
            id: TransactionId(format!("txn-{id:06}")),
            kind,
            fund_id: fund_id.clone(),
            amount: posting.amount,
            category: posting.category,
            description: posting.description,
            reference: posting.reference,
            created_at: self.clock.now(),
        };
        books.balance = balance;
        books.journal.push(transaction.clone());

        info!(
            fund = %account.name,
            transaction_id = %transaction.id,
            kind = ?kind,
            amount = %transaction.amount,
            balance = %books.balance,
            "ledger posting"
        );
        Ok(transaction)
    }

    /// The fund's journal, oldest first.
    pub fn transactions(&self, fund_id: &FundId) -> Result<Vec<FinancialTransaction>, WorkflowError> {
        Ok(self.funds.require(fund_id)?.books.lock().journal.clone())
    }

    /// Every transaction, in any fund, that points at the given record.
    pub fn transactions_referencing(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> Vec<FinancialTransaction> {
        self.funds
            .filter(|_| true)
            .iter()
            .flat_map(|account| {
                account
                    .books
                    .lock()
                    .journal
                    .iter()
                    .filter(|transaction| {
                        transaction.reference.as_ref().is_some_and(|reference| {
                            reference.reference_type == reference_type
                                && reference.reference_id == reference_id
                        })
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Recomputes the balance from the journal and compares it with the cached
    /// one.
    pub fn reconcile(&self, fund_id: &FundId) -> Result<FundReconciliation, WorkflowError> {
        let account = self.funds.require(fund_id)?;
        let books = account.books.lock();
        let journal_balance =
            Money::checked_sum(books.journal.iter().map(FinancialTransaction::signed_amount))
                .ok_or_else(|| {
                    WorkflowError::conflict(format!(
                        "journal of fund {} does not sum to a representable balance",
                        account.name
                    ))
                })?;
        Ok(FundReconciliation {
            fund_id: fund_id.clone(),
            cached_balance: books.balance,
            journal_balance,
            transaction_count: books.journal.len(),
        })
    }
}
