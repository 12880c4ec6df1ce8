//! Orders placed from a cart.

use crate::{error::Result, CartItem, Error, ItemList, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(Error::UnknownOrderStatus(other.to_string())),
        }
    }
}

/// An order ready to be submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub total: f64,
    pub address: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderDraft {
    /// Build a draft from the cart contents.
    ///
    /// Fails if the cart is empty or the address is blank.
    pub fn from_cart(
        user_id: impl Into<UserId>,
        items: &[CartItem],
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::EmptyCart);
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::MissingAddress);
        }

        Ok(Self {
            user_id: user_id.into(),
            items: items.to_vec(),
            total: items.iter().map(CartItem::line_total).sum(),
            address: address.to_string(),
            status: OrderStatus::Pending,
            created_at: now,
        })
    }

    /// Normalize a draft received from elsewhere.
    ///
    /// Lines are deduplicated and clamped to `[MIN_QUANTITY, MAX_QUANTITY]`
    /// the same way a cart is, lines with quantity zero are dropped, and the
    /// total is recomputed. Fails like [`validate`](Self::validate) if no
    /// line survives or the address is blank.
    ///
    /// [`MIN_QUANTITY`]: crate::MIN_QUANTITY
    /// [`MAX_QUANTITY`]: crate::MAX_QUANTITY
    pub fn normalized(mut self) -> Result<Self> {
        let lines = ItemList::from_items(std::mem::take(&mut self.items));
        self.items = lines.items().to_vec();
        self.total = lines.subtotal();
        self.address = self.address.trim().to_string();
        self.validate()?;
        Ok(self)
    }

    /// Check a draft received from elsewhere.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyCart);
        }
        if self.address.trim().is_empty() {
            return Err(Error::MissingAddress);
        }
        Ok(())
    }
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(flatten)]
    pub draft: OrderDraft,
}
