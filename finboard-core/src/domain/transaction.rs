//! Replica transaction domain model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// Local snapshot of an upstream transaction
///
/// `amount` follows the local sign convention: negative is money out,
/// positive is money in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Id,
    pub account_id: Id,
    pub external_transaction_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
    pub category: Option<String>,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: Id,
    pub external_transaction_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
    pub category: Option<String>,
    pub pending: bool,
}

impl NewTransaction {
    pub fn with_id(self, id: Id) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            external_transaction_id: self.external_transaction_id,
            date: self.date,
            name: self.name,
            amount: self.amount,
            category: self.category,
            pending: self.pending,
        }
    }
}

impl Transaction {
    /// Convert an upstream amount to the local sign convention
    ///
    /// Upstream reports outflows as positive values; locally outflows are
    /// negative. Zero stays non-negative.
    pub fn amount_from_upstream(upstream: Decimal) -> Decimal {
        if upstream.is_zero() {
            Decimal::ZERO
        } else {
            -upstream
        }
    }

    /// True if this transaction moved money out of the account
    pub fn is_expense(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_sign_inverted() {
        assert_eq!(
            Transaction::amount_from_upstream(Decimal::new(4250, 2)),
            Decimal::new(-4250, 2)
        );
        assert_eq!(
            Transaction::amount_from_upstream(Decimal::new(-2000, 2)),
            Decimal::new(2000, 2)
        );
    }

    #[test]
    fn test_zero_amount_stays_non_negative() {
        let amount = Transaction::amount_from_upstream(Decimal::new(0, 2));
        assert!(amount.is_zero());
        assert!(!amount.is_sign_negative());
    }

    #[test]
    fn test_is_expense() {
        let tx = NewTransaction {
            account_id: 1,
            external_transaction_id: "tx-1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            name: "Coffee".to_string(),
            amount: Decimal::new(-450, 2),
            category: Some("Food and Drink".to_string()),
            pending: false,
        }
        .with_id(1);
        assert!(tx.is_expense());

        let mut income = tx.clone();
        income.amount = Decimal::new(350000, 2);
        assert!(!income.is_expense());
    }

    #[test]
    fn test_serialized_shape() {
        let tx = NewTransaction {
            account_id: 2,
            external_transaction_id: "tx-9".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            name: "Payroll".to_string(),
            amount: Decimal::new(2000, 2),
            category: None,
            pending: true,
        }
        .with_id(5);
        let json = serde_json::to_value(tx).unwrap();
        assert_eq!(json["amount"], "20.00");
        assert_eq!(json["date"], "2025-03-01");
        assert_eq!(json["accountId"], 2);
        assert_eq!(json["pending"], true);
    }
}
