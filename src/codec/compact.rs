//! Compact Wire Form (V2)
//!
//! Positional-array serialization of a payload. Every record is a fixed
//! length JSON array; absent optionals are written as `null` so positions
//! never shift.

use crate::domain::entities::{
    AccountRecord, FinanceSnapshot, HoldingRecord, Settings, SyncPayload, TransactionRecord,
    UserIdentity,
};
use serde::{Deserialize, Serialize};

/// `[id, date, description, amount, category, accountName|null]`
type CompactTransaction = (String, String, String, f64, String, Option<String>);

/// `[id, name, ticker|null, quantity, price, value, externalId|null]`
type CompactHolding = (String, String, Option<String>, f64, f64, f64, Option<String>);

/// `[id, name, category, institution|null, balance, holdings|null]`
type CompactAccount = (
    String,
    String,
    String,
    Option<String>,
    f64,
    Option<Vec<CompactHolding>>,
);

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompactData {
    t: Vec<CompactTransaction>,
    a: Vec<CompactAccount>,
    tc: Vec<String>,
    lu: i64,
}

/// Top-level compact document: `{ u, d, k }`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompactForm {
    u: UserIdentity,
    d: CompactData,
    k: Option<String>,
}

impl CompactForm {
    pub(crate) fn from_payload(payload: &SyncPayload) -> Self {
        let snapshot = &payload.snapshot;

        let t = snapshot
            .transactions
            .iter()
            .map(|tx| {
                (
                    tx.id.clone(),
                    tx.date.clone(),
                    tx.description.clone(),
                    tx.amount,
                    tx.category.clone(),
                    tx.account_name.clone(),
                )
            })
            .collect();

        let a = snapshot
            .accounts
            .iter()
            .map(|acc| {
                let holdings = acc.holdings.as_ref().map(|hs| {
                    hs.iter()
                        .map(|h| {
                            (
                                h.id.clone(),
                                h.name.clone(),
                                h.ticker.clone(),
                                h.quantity,
                                h.price,
                                h.value,
                                h.external_id.clone(),
                            )
                        })
                        .collect()
                });
                (
                    acc.id.clone(),
                    acc.name.clone(),
                    acc.category.clone(),
                    acc.institution.clone(),
                    acc.balance,
                    holdings,
                )
            })
            .collect();

        Self {
            u: payload.identity.clone(),
            d: CompactData {
                t,
                a,
                tc: snapshot.transaction_categories.clone(),
                lu: snapshot.last_updated,
            },
            k: payload.credential.clone(),
        }
    }

    /// Settings are not carried; the result holds defaults.
    pub(crate) fn into_payload(self) -> SyncPayload {
        let transactions = self
            .d
            .t
            .into_iter()
            .map(|(id, date, description, amount, category, account_name)| TransactionRecord {
                id,
                date,
                description,
                amount,
                category,
                account_name,
            })
            .collect();

        let accounts = self
            .d
            .a
            .into_iter()
            .map(|(id, name, category, institution, balance, holdings)| AccountRecord {
                id,
                name,
                category,
                institution,
                balance,
                holdings: holdings.map(|hs| {
                    hs.into_iter()
                        .map(|(id, name, ticker, quantity, price, value, external_id)| HoldingRecord {
                            id,
                            name,
                            ticker,
                            quantity,
                            price,
                            value,
                            external_id,
                        })
                        .collect()
                }),
            })
            .collect();

        SyncPayload {
            identity: self.u,
            snapshot: FinanceSnapshot {
                settings: Settings::default(),
                transactions,
                accounts,
                conversation_history: Vec::new(),
                transaction_categories: self.d.tc,
                last_updated: self.d.lu,
            },
            credential: self.k,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_rows_are_positional_with_nulls() {
        let payload = SyncPayload::new(
            UserIdentity::new("u1", "Ada"),
            FinanceSnapshot {
                transactions: vec![TransactionRecord {
                    id: "t1".into(),
                    date: "2024-03-01".into(),
                    description: "Coffee".into(),
                    amount: -3.5,
                    category: "Food".into(),
                    account_name: None,
                }],
                accounts: vec![AccountRecord {
                    id: "a1".into(),
                    name: "Cash".into(),
                    category: "cash".into(),
                    institution: None,
                    balance: 20.0,
                    holdings: None,
                }],
                last_updated: 7,
                ..Default::default()
            },
            None,
        );

        let json = serde_json::to_value(CompactForm::from_payload(&payload)).unwrap();

        assert_eq!(
            json["d"]["t"][0],
            serde_json::json!(["t1", "2024-03-01", "Coffee", -3.5, "Food", null])
        );
        assert_eq!(json["d"]["a"][0], serde_json::json!(["a1", "Cash", "cash", null, 20.0, null]));
        assert_eq!(json["d"]["lu"], 7);
        assert!(json["k"].is_null());
        assert!(json.get("k").is_some());
    }

    #[test]
    fn test_short_row_is_rejected() {
        let raw = r#"{"u":{"id":"u1","name":"Ada"},"d":{"t":[["t1","2024-03-01","Coffee",-3.5,"Food"]],"a":[],"tc":[],"lu":1},"k":null}"#;
        assert!(serde_json::from_str::<CompactForm>(raw).is_err());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let raw = r#"{"u":{"id":"u1","name":"Ada"},"d":{"t":[["t1","2024-03-01","Coffee","-3.5","Food",null]],"a":[],"tc":[],"lu":1},"k":null}"#;
        assert!(serde_json::from_str::<CompactForm>(raw).is_err());
    }
}
