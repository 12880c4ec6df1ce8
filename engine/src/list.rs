//! Ordered, deduplicated list of line items.
//!
//! The list is copy-on-write: the items live behind an `Arc`, and every
//! mutation that changes something installs a fresh `Arc`. Callers holding
//! an earlier snapshot keep seeing the old contents, and `Arc::ptr_eq`
//! tells reactive layers whether anything changed.

use crate::item::{clamp_quantity, CartItem, LineItem};
use std::sync::Arc;

/// A cart or wishlist in insertion order.
#[derive(Debug, Clone)]
pub struct ItemList<T> {
    items: Arc<Vec<T>>,
}

impl<T> Default for ItemList<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
        }
    }
}

impl<T: LineItem> ItemList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from untrusted items.
    ///
    /// Entries are normalized, invalid ones dropped, and repeated ids folded
    /// together with the same rule `add` uses.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut merged: Vec<T> = Vec::new();
        for item in items.into_iter().filter_map(LineItem::normalized) {
            match merged.iter_mut().find(|existing| existing.id() == item.id()) {
                Some(existing) => {
                    existing.absorb(&item);
                }
                None => merged.push(item),
            }
        }
        Self {
            items: Arc::new(merged),
        }
    }

    /// Current items as a shared snapshot.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items)
    }

    /// Current items.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Whether `snapshot` is the exact allocation this list currently holds.
    pub fn is_snapshot(&self, snapshot: &Arc<Vec<T>>) -> bool {
        Arc::ptr_eq(&self.items, snapshot)
    }

    /// Get an item by id.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// True if any entry refers to `product_id`, whatever its variant.
    pub fn contains(&self, product_id: &str) -> bool {
        self.items.iter().any(|item| item.product_id() == product_id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities over all entries.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(LineItem::quantity).sum()
    }

    /// Add an item, folding it into an existing entry with the same id.
    ///
    /// Returns `true` if the list changed.
    pub fn add(&mut self, item: T) -> bool {
        let Some(item) = item.normalized() else {
            return false;
        };

        match self.items.iter().position(|existing| existing.id() == item.id()) {
            Some(index) => {
                let mut merged = self.items[index].clone();
                if !merged.absorb(&item) {
                    return false;
                }
                let mut next = self.items.as_ref().clone();
                next[index] = merged;
                self.items = Arc::new(next);
            }
            None => {
                let mut next = self.items.as_ref().clone();
                next.push(item);
                self.items = Arc::new(next);
            }
        }
        true
    }

    /// Remove the entry with the given id.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let next: Vec<T> = self
            .items
            .iter()
            .filter(|item| item.id() != id)
            .cloned()
            .collect();
        self.items = Arc::new(next);
        true
    }

    /// Remove every entry.
    ///
    /// Returns `true` if the list was not already empty.
    pub fn clear(&mut self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.items = Arc::new(Vec::new());
        true
    }

    /// Replace the whole contents, normalizing the incoming items.
    ///
    /// Returns `true` if the contents differ from before.
    pub fn replace(&mut self, items: impl IntoIterator<Item = T>) -> bool {
        let next = Self::from_items(items);
        if next.items == self.items {
            return false;
        }
        self.items = next.items;
        true
    }
}

impl ItemList<CartItem> {
    /// Set the quantity of an entry.
    ///
    /// The quantity is clamped to `[0, MAX_QUANTITY]`; zero removes the
    /// entry. Unknown ids are ignored. Returns `true` if the list changed.
    pub fn set_quantity(&mut self, id: &str, quantity: i64) -> bool {
        let quantity = clamp_quantity(quantity);
        if quantity == 0 {
            return self.remove(id);
        }

        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return false;
        };
        if self.items[index].quantity == quantity {
            return false;
        }

        let mut next = self.items.as_ref().clone();
        next[index].quantity = quantity;
        self.items = Arc::new(next);
        true
    }

    /// Sum of price times quantity.
    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }
}
