//! Merge Engine Service
//!
//! Pure domain logic for reconciling two independently mutated snapshots.
//! This service has NO transport dependencies - it's pure Rust.

use crate::domain::entities::{
    now_millis, AccountRecord, ConversationRecord, FinanceSnapshot, HoldingRecord,
    TransactionRecord,
};
use std::collections::{HashMap, HashSet};

/// Merge engine for bidirectional sync.
///
/// Entity rules:
/// 1. Transactions: union by id, local copy wins, sorted by date descending
/// 2. Accounts: union by id; shared accounts reconcile holdings by
///    case-insensitive name, summing quantity and value
/// 3. Conversation history: union by id, sorted by timestamp descending
/// 4. Categories: union, local order first
///
/// Summing holdings double-counts when one side is a plain copy of the
/// other. Only the explicit merge flow calls this; clone flows replace.
pub struct MergeEngine;

impl MergeEngine {
    /// Merge `remote` into `local`, stamping the result with the current time.
    pub fn merge(local: &FinanceSnapshot, remote: &FinanceSnapshot) -> FinanceSnapshot {
        Self::merge_at(local, remote, now_millis())
    }

    /// Merge with an explicit `last_updated` stamp.
    pub fn merge_at(local: &FinanceSnapshot, remote: &FinanceSnapshot, now: i64) -> FinanceSnapshot {
        let transactions = Self::merge_transactions(&local.transactions, &remote.transactions);
        let accounts = Self::merge_accounts(&local.accounts, &remote.accounts);
        let conversation_history =
            Self::merge_conversations(&local.conversation_history, &remote.conversation_history);
        let transaction_categories =
            Self::merge_categories(&local.transaction_categories, &remote.transaction_categories);

        tracing::debug!(
            "merged snapshots: transactions {}+{}->{} accounts {}+{}->{}",
            local.transactions.len(),
            remote.transactions.len(),
            transactions.len(),
            local.accounts.len(),
            remote.accounts.len(),
            accounts.len()
        );

        FinanceSnapshot {
            settings: local.settings.clone(),
            transactions,
            accounts,
            conversation_history,
            transaction_categories,
            last_updated: now,
        }
    }

    /// Host credential wins; the remote one is adopted only when local has none.
    pub fn merge_credential(local: Option<&str>, remote: Option<&str>) -> Option<String> {
        local
            .filter(|c| !c.is_empty())
            .or(remote.filter(|c| !c.is_empty()))
            .map(str::to_string)
    }

    fn merge_transactions(
        local: &[TransactionRecord],
        remote: &[TransactionRecord],
    ) -> Vec<TransactionRecord> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + remote.len());
        let mut merged = Vec::with_capacity(local.len() + remote.len());

        for tx in local.iter().chain(remote.iter()) {
            if seen.insert(tx.id.as_str()) {
                merged.push(tx.clone());
            }
        }

        // Stable, so same-date entries keep local-then-remote order
        merged.sort_by(|a, b| b.date.cmp(&a.date));
        merged
    }

    fn merge_accounts(local: &[AccountRecord], remote: &[AccountRecord]) -> Vec<AccountRecord> {
        let mut merged: Vec<AccountRecord> = Vec::with_capacity(local.len() + remote.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for account in local {
            if index.contains_key(&account.id) {
                continue;
            }
            index.insert(account.id.clone(), merged.len());
            merged.push(account.clone());
        }

        for account in remote {
            match index.get(&account.id) {
                Some(&pos) => {
                    let reconciled = Self::reconcile_account(&merged[pos], account);
                    merged[pos] = reconciled;
                }
                None => {
                    index.insert(account.id.clone(), merged.len());
                    merged.push(account.clone());
                }
            }
        }

        merged
    }

    fn reconcile_account(local: &AccountRecord, remote: &AccountRecord) -> AccountRecord {
        let holdings = match (&local.holdings, &remote.holdings) {
            (None, None) => None,
            (l, r) => Some(Self::merge_holdings(
                l.as_deref().unwrap_or_default(),
                r.as_deref().unwrap_or_default(),
            )),
        };

        let mut account = AccountRecord {
            id: local.id.clone(),
            name: local.name.clone(),
            category: local.category.clone(),
            institution: local.institution.clone().or_else(|| remote.institution.clone()),
            balance: local.balance,
            holdings,
        };
        account.recompute_balance();
        account
    }

    fn merge_holdings(local: &[HoldingRecord], remote: &[HoldingRecord]) -> Vec<HoldingRecord> {
        let mut merged: Vec<HoldingRecord> = local.to_vec();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (pos, holding) in merged.iter().enumerate() {
            by_name.entry(holding.name.to_lowercase()).or_insert(pos);
        }

        for holding in remote {
            match by_name.get(&holding.name.to_lowercase()) {
                Some(&pos) => {
                    let target = &mut merged[pos];
                    target.quantity += holding.quantity;
                    target.value += holding.value;
                }
                None => {
                    by_name.insert(holding.name.to_lowercase(), merged.len());
                    merged.push(holding.clone());
                }
            }
        }

        merged
    }

    fn merge_conversations(
        local: &[ConversationRecord],
        remote: &[ConversationRecord],
    ) -> Vec<ConversationRecord> {
        if remote.is_empty() {
            return local.to_vec();
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut merged: Vec<ConversationRecord> = local
            .iter()
            .chain(remote.iter())
            .filter(|c| seen.insert(c.id.as_str()))
            .cloned()
            .collect();
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged
    }

    fn merge_categories(local: &[String], remote: &[String]) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        local
            .iter()
            .chain(remote.iter())
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            date: date.to_string(),
            description: format!("tx {}", id),
            amount: -10.0,
            category: "Food".to_string(),
            account_name: None,
        }
    }

    fn holding(id: &str, name: &str, qty: f64, value: f64) -> HoldingRecord {
        HoldingRecord {
            id: id.to_string(),
            name: name.to_string(),
            ticker: Some(name.to_uppercase()),
            quantity: qty,
            price: if qty == 0.0 { 0.0 } else { value / qty },
            value,
            external_id: None,
        }
    }

    fn brokerage(holdings: Option<Vec<HoldingRecord>>, balance: f64) -> AccountRecord {
        AccountRecord {
            id: "a1".to_string(),
            name: "Brokerage".to_string(),
            category: "investment".to_string(),
            institution: None,
            balance,
            holdings,
        }
    }

    fn snapshot(transactions: Vec<TransactionRecord>, accounts: Vec<AccountRecord>) -> FinanceSnapshot {
        FinanceSnapshot {
            transactions,
            accounts,
            last_updated: 1,
            ..Default::default()
        }
    }

    fn ids(s: &FinanceSnapshot) -> Vec<&str> {
        s.transactions.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_merge_disjoint_transactions() {
        let local = snapshot(vec![tx("t1", "2024-01-01"), tx("t2", "2024-01-02")], vec![]);
        let remote = snapshot(vec![tx("t3", "2024-01-03"), tx("t4", "2024-01-04")], vec![]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        assert_eq!(ids(&merged), vec!["t4", "t3", "t2", "t1"]);
    }

    #[test]
    fn test_merge_overlapping_transactions_keeps_local_copy() {
        let mut local_t2 = tx("t2", "2024-01-02");
        local_t2.description = "local edit".to_string();
        let local = snapshot(vec![tx("t1", "2024-01-01"), local_t2], vec![]);
        let remote = snapshot(vec![tx("t2", "2024-01-02"), tx("t3", "2024-01-03")], vec![]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        assert_eq!(merged.transactions.len(), 3);
        let t2: Vec<_> = merged.transactions.iter().filter(|t| t.id == "t2").collect();
        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].description, "local edit");
    }

    #[test]
    fn test_merge_sums_same_named_holdings() {
        let local = snapshot(vec![], vec![brokerage(Some(vec![holding("h1", "AAPL", 1.0, 150.0)]), 150.0)]);
        let remote = snapshot(vec![], vec![brokerage(Some(vec![holding("h9", "AAPL", 2.0, 300.0)]), 300.0)]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        let account = merged.account("a1").unwrap();
        let holdings = account.holdings.as_ref().unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 3.0);
        assert_eq!(holdings[0].value, 450.0);
        assert_eq!(holdings[0].id, "h1");
        assert_eq!(account.balance, 450.0);
    }

    #[test]
    fn test_merge_holdings_name_is_case_insensitive() {
        let local = snapshot(vec![], vec![brokerage(Some(vec![holding("h1", "Apple", 1.0, 100.0)]), 100.0)]);
        let remote = snapshot(vec![], vec![brokerage(Some(vec![holding("h2", "APPLE", 1.0, 100.0)]), 100.0)]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        let holdings = merged.accounts[0].holdings.as_ref().unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].name, "Apple");
        assert_eq!(holdings[0].quantity, 2.0);
    }

    #[test]
    fn test_merge_carries_one_sided_holdings() {
        let local = snapshot(vec![], vec![brokerage(Some(vec![holding("h1", "AAPL", 1.0, 150.0)]), 150.0)]);
        let remote = snapshot(vec![], vec![brokerage(Some(vec![holding("h2", "MSFT", 1.0, 400.0)]), 400.0)]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        let account = &merged.accounts[0];
        assert_eq!(account.holdings.as_ref().unwrap().len(), 2);
        assert_eq!(account.balance, 550.0);
    }

    #[test]
    fn test_merge_holdings_only_on_remote_side() {
        let local = snapshot(vec![], vec![brokerage(None, 0.0)]);
        let remote = snapshot(vec![], vec![brokerage(Some(vec![holding("h2", "MSFT", 1.0, 400.0)]), 400.0)]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        assert_eq!(merged.accounts[0].balance, 400.0);
    }

    #[test]
    fn test_merge_without_holdings_keeps_local_balance() {
        let local = snapshot(vec![], vec![brokerage(None, 1000.0)]);
        let remote = snapshot(vec![], vec![brokerage(None, 2000.0)]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        assert_eq!(merged.accounts[0].balance, 1000.0);
        assert!(merged.accounts[0].holdings.is_none());
    }

    #[test]
    fn test_merge_appends_remote_only_accounts() {
        let mut checking = brokerage(None, 50.0);
        checking.id = "a2".to_string();
        checking.name = "Checking".to_string();

        let local = snapshot(vec![], vec![brokerage(None, 10.0)]);
        let remote = snapshot(vec![], vec![checking]);

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        let names: Vec<_> = merged.accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Brokerage", "Checking"]);
    }

    #[test]
    fn test_merge_conversations_sorted_desc() {
        let msg = |id: &str, ts: i64| ConversationRecord {
            id: id.to_string(),
            role: "user".to_string(),
            content: "hi".to_string(),
            timestamp: ts,
        };
        let mut local = snapshot(vec![], vec![]);
        local.conversation_history = vec![msg("c1", 10), msg("c2", 30)];
        let mut remote = snapshot(vec![], vec![]);
        remote.conversation_history = vec![msg("c2", 30), msg("c3", 20)];

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        let order: Vec<_> = merged.conversation_history.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["c2", "c3", "c1"]);
    }

    #[test]
    fn test_merge_categories_union() {
        let mut local = snapshot(vec![], vec![]);
        local.transaction_categories = vec!["Food".into(), "Rent".into()];
        let mut remote = snapshot(vec![], vec![]);
        remote.transaction_categories = vec!["Rent".into(), "Travel".into()];

        let merged = MergeEngine::merge_at(&local, &remote, 99);

        assert_eq!(merged.transaction_categories, vec!["Food", "Rent", "Travel"]);
    }

    #[test]
    fn test_merge_stamps_last_updated_and_keeps_local_settings() {
        let mut local = snapshot(vec![], vec![]);
        local.settings.theme = "dark".to_string();
        let mut remote = snapshot(vec![], vec![]);
        remote.settings.theme = "light".to_string();

        let merged = MergeEngine::merge_at(&local, &remote, 12345);

        assert_eq!(merged.last_updated, 12345);
        assert_eq!(merged.settings.theme, "dark");
    }

    #[test]
    fn test_merge_credential_prefers_local() {
        assert_eq!(MergeEngine::merge_credential(Some("host"), Some("client")), Some("host".into()));
        assert_eq!(MergeEngine::merge_credential(None, Some("client")), Some("client".into()));
        assert_eq!(MergeEngine::merge_credential(Some(""), Some("client")), Some("client".into()));
        assert_eq!(MergeEngine::merge_credential(None, None), None);
    }
}
