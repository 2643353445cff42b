//! Domain Entities - Core business objects
//!
//! These entities represent the finance dataset that is subject to
//! synchronization. They have no transport dependencies and contain only
//! business logic.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// The user a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Stable identifier, also the key of the local snapshot store
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }
}

/// Device-local preferences.
///
/// Settings travel inside the legacy payload only; the compact format leaves
/// them out and receivers keep their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub base_currency: String,
    pub theme: String,
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            theme: "system".to_string(),
            notifications_enabled: true,
        }
    }
}

/// A single ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    /// ISO-8601 date (`YYYY-MM-DD`), ordered lexicographically
    pub date: String,
    pub description: String,
    /// Signed amount in base currency (negative = outflow)
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub account_name: Option<String>,
}

/// A position inside an investment account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    /// Unique within the owning account
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ticker: Option<String>,
    pub quantity: f64,
    pub price: f64,
    /// Expected to equal `quantity * price`, modulo price-feed drift
    pub value: f64,
    /// Identifier in the external price feed
    #[serde(default)]
    pub external_id: Option<String>,
}

/// A financial account, optionally holding investment positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub institution: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub holdings: Option<Vec<HoldingRecord>>,
}

impl AccountRecord {
    /// Sum of holding values, or None when the account carries no holdings.
    pub fn holdings_total(&self) -> Option<f64> {
        match &self.holdings {
            Some(h) if !h.is_empty() => Some(h.iter().map(|x| x.value).sum()),
            _ => None,
        }
    }

    /// Recompute `balance` from holdings when any exist.
    pub fn recompute_balance(&mut self) {
        if let Some(total) = self.holdings_total() {
            self.balance = total;
        }
    }
}

/// One entry of the assistant conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub role: String,
    pub content: String,
    /// Milliseconds since epoch
    pub timestamp: i64,
}

/// The complete persisted dataset for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSnapshot {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub accounts: Vec<AccountRecord>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationRecord>,
    #[serde(default)]
    pub transaction_categories: Vec<String>,
    /// Milliseconds since epoch of the last mutation
    pub last_updated: i64,
}

impl Default for FinanceSnapshot {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            transactions: Vec::new(),
            accounts: Vec::new(),
            conversation_history: Vec::new(),
            transaction_categories: Vec::new(),
            last_updated: 0,
        }
    }
}

impl FinanceSnapshot {
    /// Fresh snapshot created at first login.
    pub fn new() -> Self {
        Self {
            last_updated: now_millis(),
            ..Default::default()
        }
    }

    /// Bump `last_updated`; call after every domain mutation.
    pub fn touch(&mut self) {
        self.last_updated = now_millis().max(self.last_updated.saturating_add(1));
    }

    /// True when the snapshot holds no user data worth merging.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.accounts.is_empty()
    }

    pub fn account(&self, id: &str) -> Option<&AccountRecord> {
        self.accounts.iter().find(|a| a.id == id)
    }
}

/// The unit exchanged between devices.
///
/// `snapshot.conversation_history` never crosses the wire; decoded payloads
/// always carry an empty history.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPayload {
    pub identity: UserIdentity,
    pub snapshot: FinanceSnapshot,
    pub credential: Option<String>,
}

impl SyncPayload {
    pub fn new(identity: UserIdentity, snapshot: FinanceSnapshot, credential: Option<String>) -> Self {
        Self {
            identity,
            snapshot,
            credential,
        }
    }
}
