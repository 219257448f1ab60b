//! Users and merchant quotes.

use crate::types::{Price, Role, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    /// Fiat per unit of the base currency. Only merchants quote.
    #[serde(default)]
    pub merchant_price: Option<Price>,
    pub created_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, name: String, role: Role, merchant_price: Option<Price>, timestamp: Timestamp) -> Self {
        Self {
            id,
            name,
            role,
            merchant_price,
            created_at: timestamp,
        }
    }

    pub fn is_merchant(&self) -> bool {
        self.role == Role::Merchant
    }

    // a merchant without a quote cannot take p2p orders
    pub fn quote(&self) -> Option<Price> {
        if self.is_merchant() {
            self.merchant_price
        } else {
            None
        }
    }
}
