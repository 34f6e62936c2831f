//! Security domain model - tradable instruments shared across users

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// A tradable instrument, deduplicated by its upstream `security_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub id: Id,
    pub security_id: String,
    pub name: String,
    pub ticker_symbol: Option<String>,
    #[serde(rename = "type")]
    pub security_type: String,
    pub close_price: Option<Decimal>,
    pub update_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSecurity {
    pub security_id: String,
    pub name: String,
    pub ticker_symbol: Option<String>,
    pub security_type: String,
    pub close_price: Option<Decimal>,
    pub update_date: Option<NaiveDate>,
}

impl NewSecurity {
    pub fn with_id(self, id: Id) -> Security {
        Security {
            id,
            security_id: self.security_id,
            name: self.name,
            ticker_symbol: self.ticker_symbol,
            security_type: self.security_type,
            close_price: self.close_price,
            update_date: self.update_date,
        }
    }
}
