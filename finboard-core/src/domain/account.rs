//! Replica account domain model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// Local snapshot of an upstream bank account
/// Note: account_type/subtype are freeform strings using Plaid nomenclature
/// ("depository", "credit", "investment", "loan", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Id,
    pub linked_item_id: Id,
    /// Upstream account id, the key transactions and holdings refer to
    pub external_account_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub subtype: Option<String>,
    pub balance: Decimal,
    /// ISO 4217 currency code, normalized to uppercase
    pub iso_currency_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub linked_item_id: Id,
    pub external_account_id: String,
    pub name: String,
    pub account_type: String,
    pub subtype: Option<String>,
    pub balance: Decimal,
    pub iso_currency_code: String,
}

impl NewAccount {
    pub fn with_id(self, id: Id) -> Account {
        Account {
            id,
            linked_item_id: self.linked_item_id,
            external_account_id: self.external_account_id,
            name: self.name,
            account_type: self.account_type,
            subtype: self.subtype,
            balance: self.balance,
            iso_currency_code: self.iso_currency_code,
        }
    }

    /// Validate account data before it is written
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.external_account_id.trim().is_empty() {
            return Err("external account id cannot be empty");
        }
        if self.iso_currency_code.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }
}

impl Account {
    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }
}
