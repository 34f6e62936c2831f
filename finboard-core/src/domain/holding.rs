//! Holding domain model and its enriched read model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Id, Security};

/// Display name used when a holding's security is not in the store
pub const UNKNOWN_SECURITY_NAME: &str = "Unknown Security";

/// A position in a security within an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: Id,
    pub account_id: Id,
    /// Upstream security id, the join key into the securities table
    pub security_id: String,
    pub quantity: Decimal,
    pub cost_basis: Option<Decimal>,
    pub value: Decimal,
    pub last_price: Decimal,
    pub price_as_of: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHolding {
    pub account_id: Id,
    pub security_id: String,
    pub quantity: Decimal,
    pub cost_basis: Option<Decimal>,
    pub value: Decimal,
    pub last_price: Decimal,
    pub price_as_of: NaiveDate,
}

impl NewHolding {
    pub fn with_id(self, id: Id) -> Holding {
        Holding {
            id,
            account_id: self.account_id,
            security_id: self.security_id,
            quantity: self.quantity,
            cost_basis: self.cost_basis,
            value: self.value,
            last_price: self.last_price,
            price_as_of: self.price_as_of,
        }
    }
}

/// Holding joined with the descriptive fields of its security
///
/// This is a read model only; it is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingView {
    #[serde(flatten)]
    pub holding: Holding,
    pub security_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_type: Option<String>,
}

impl HoldingView {
    /// Join a holding with its security (if the store has one)
    pub fn join(holding: Holding, security: Option<&Security>) -> Self {
        match security {
            Some(security) => Self {
                holding,
                security_name: security.name.clone(),
                ticker_symbol: security.ticker_symbol.clone(),
                security_type: Some(security.security_type.clone()),
            },
            None => Self {
                holding,
                security_name: UNKNOWN_SECURITY_NAME.to_string(),
                ticker_symbol: None,
                security_type: None,
            },
        }
    }

    /// Label used when grouping holdings: ticker when known, else the name
    pub fn display_name(&self) -> &str {
        self.ticker_symbol
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.security_name)
    }
}
