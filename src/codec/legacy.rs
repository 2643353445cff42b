//! Legacy Wire Form (V1)
//!
//! Field-named JSON emitted by older builds. Decoded for forward
//! compatibility; new builds only emit it on request.

use crate::domain::entities::{
    AccountRecord, FinanceSnapshot, Settings, SyncPayload, TransactionRecord, UserIdentity,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacySnapshot {
    #[serde(default)]
    settings: Settings,
    transactions: Vec<TransactionRecord>,
    accounts: Vec<AccountRecord>,
    #[serde(default)]
    transaction_categories: Vec<String>,
    last_updated: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacyPayload {
    user: UserIdentity,
    data: LegacySnapshot,
    #[serde(default)]
    api_key: Option<String>,
}

impl LegacyPayload {
    pub(crate) fn from_payload(payload: &SyncPayload) -> Self {
        let s = &payload.snapshot;
        Self {
            user: payload.identity.clone(),
            data: LegacySnapshot {
                settings: s.settings.clone(),
                transactions: s.transactions.clone(),
                accounts: s.accounts.clone(),
                transaction_categories: s.transaction_categories.clone(),
                last_updated: s.last_updated,
            },
            api_key: payload.credential.clone(),
        }
    }

    pub(crate) fn into_payload(self) -> SyncPayload {
        SyncPayload {
            identity: self.user,
            snapshot: FinanceSnapshot {
                settings: self.data.settings,
                transactions: self.data.transactions,
                accounts: self.data.accounts,
                conversation_history: Vec::new(),
                transaction_categories: self.data.transaction_categories,
                last_updated: self.data.last_updated,
            },
            credential: self.api_key,
        }
    }
}
