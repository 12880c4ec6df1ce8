//! Line item types for carts and wishlists.
//!
//! A line item carries a denormalized snapshot of the product taken when it
//! was added. The snapshot is never refreshed, so it can go stale if the
//! product changes afterwards.

use crate::{ItemId, ListKind, ProductId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between product id and variant in a line item id.
pub const ID_SEPARATOR: char = '-';

/// Smallest quantity a cart item can have while it is in the cart.
pub const MIN_QUANTITY: u32 = 1;

/// Largest quantity a cart item can have.
pub const MAX_QUANTITY: u32 = 15;

/// Build the deterministic id of a line item.
///
/// An empty variant yields the bare product id.
pub fn line_item_id(product_id: &str, variant: &str) -> ItemId {
    if variant.is_empty() {
        product_id.to_string()
    } else {
        format!("{product_id}{ID_SEPARATOR}{variant}")
    }
}

/// Clamp a requested quantity into `[0, MAX_QUANTITY]`.
pub fn clamp_quantity(requested: i64) -> u32 {
    requested.clamp(0, MAX_QUANTITY as i64) as u32
}

/// Display data of a product at the moment it was added to a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: f64,
    pub image: String,
}

impl ProductSnapshot {
    /// Create a product snapshot.
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: f64,
        image: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            image: image.into(),
        }
    }
}

/// Behavior shared by cart and wishlist entries.
pub trait LineItem:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Which list this item type belongs to.
    const KIND: ListKind;

    /// Deduplication key within a list.
    fn id(&self) -> &str;

    /// The product this entry refers to.
    fn product_id(&self) -> &str;

    /// Quantity of this entry; wishlist entries always count as one.
    fn quantity(&self) -> u32 {
        1
    }

    /// Fold another entry with the same id into this one.
    ///
    /// Returns `true` if this entry changed.
    fn absorb(&mut self, incoming: &Self) -> bool;

    /// Repair an entry that came from storage or the network.
    ///
    /// Returns `None` if the entry must not be kept.
    fn normalized(self) -> Option<Self>;
}

/// An entry in the shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// `productId-size`
    #[serde(default)]
    pub id: ItemId,
    pub product_id: ProductId,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub size: String,
    pub quantity: u32,
}

impl CartItem {
    /// Create a cart item for a product in a given size.
    ///
    /// The requested quantity is clamped to `[MIN_QUANTITY, MAX_QUANTITY]`;
    /// anything below one counts as one.
    pub fn new(product: ProductSnapshot, size: impl Into<String>, quantity: i64) -> Self {
        let size = size.into();
        Self {
            id: line_item_id(&product.product_id, &size),
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            image: product.image,
            size,
            quantity: clamp_quantity(quantity).max(MIN_QUANTITY),
        }
    }

    /// Price times quantity.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }

    /// The product snapshot this item was created from.
    pub fn product(&self) -> ProductSnapshot {
        ProductSnapshot::new(
            self.product_id.clone(),
            self.name.clone(),
            self.price,
            self.image.clone(),
        )
    }
}

impl LineItem for CartItem {
    const KIND: ListKind = ListKind::Cart;

    fn id(&self) -> &str {
        &self.id
    }

    fn product_id(&self) -> &str {
        &self.product_id
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn absorb(&mut self, incoming: &Self) -> bool {
        let quantity = (self.quantity + incoming.quantity).min(MAX_QUANTITY);
        if quantity == self.quantity {
            return false;
        }
        self.quantity = quantity;
        true
    }

    fn normalized(mut self) -> Option<Self> {
        if self.product_id.is_empty() || self.quantity == 0 {
            return None;
        }
        self.id = line_item_id(&self.product_id, &self.size);
        self.quantity = self.quantity.min(MAX_QUANTITY);
        Some(self)
    }
}

/// An entry in the wishlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    /// Same as `product_id`; wishlist entries have no variant.
    #[serde(default)]
    pub id: ItemId,
    pub product_id: ProductId,
    pub name: String,
    pub price: f64,
    pub image: String,
}

impl WishlistItem {
    /// Create a wishlist item for a product.
    pub fn new(product: ProductSnapshot) -> Self {
        Self {
            id: line_item_id(&product.product_id, ""),
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            image: product.image,
        }
    }
}

impl From<ProductSnapshot> for WishlistItem {
    fn from(product: ProductSnapshot) -> Self {
        Self::new(product)
    }
}

impl LineItem for WishlistItem {
    const KIND: ListKind = ListKind::Wishlist;

    fn id(&self) -> &str {
        &self.id
    }

    fn product_id(&self) -> &str {
        &self.product_id
    }

    fn absorb(&mut self, _incoming: &Self) -> bool {
        false
    }

    fn normalized(mut self) -> Option<Self> {
        if self.product_id.is_empty() {
            return None;
        }
        self.id = line_item_id(&self.product_id, "");
        Some(self)
    }
}
