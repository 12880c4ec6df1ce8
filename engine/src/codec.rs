//! Serialized forms of a list.
//!
//! The local cache stores a list as a plain JSON array of items, the same
//! shape the remote document's `items` field uses. Decoding always
//! normalizes, so whatever was stored comes back deduplicated and clamped.

use crate::{error::Result, CartItem, Error, ItemList, LineItem, ListKind, WishlistItem};
use serde_json::Value;

/// Encode items as the JSON array stored in the local cache.
pub fn encode_items<T: LineItem>(items: &[T]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| Error::InvalidCache(e.to_string()))
}

/// Decode a cached JSON array into a normalized list.
pub fn decode_items<T: LineItem>(raw: &str) -> Result<ItemList<T>> {
    let items: Vec<T> =
        serde_json::from_str(raw).map_err(|e| Error::InvalidCache(e.to_string()))?;
    Ok(ItemList::from_items(items))
}

/// Validate and normalize an untyped `items` array for a list kind.
///
/// Used where the item type is only known at runtime, such as a document
/// service addressed by collection name.
pub fn normalize_items_value(kind: ListKind, items: Value) -> Result<Value> {
    match kind {
        ListKind::Cart => normalize_typed::<CartItem>(items),
        ListKind::Wishlist => normalize_typed::<WishlistItem>(items),
    }
}

fn normalize_typed<T: LineItem>(items: Value) -> Result<Value> {
    let items: Vec<T> =
        serde_json::from_value(items).map_err(|e| Error::InvalidDocument(e.to_string()))?;
    let list = ItemList::from_items(items);
    serde_json::to_value(list.items()).map_err(|e| Error::InvalidDocument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProductSnapshot;
    use serde_json::json;

    #[test]
    fn json_roundtrip() {
        let items = vec![
            CartItem::new(ProductSnapshot::new("p1", "Tee", 20.0, "/t.jpg"), "M", 2),
            CartItem::new(ProductSnapshot::new("p2", "Hat", 15.0, "/h.jpg"), "OS", 1),
        ];
        let raw = encode_items(&items).unwrap();
        assert!(raw.starts_with('['));

        let list: ItemList<CartItem> = decode_items(&raw).unwrap();
        assert_eq!(list.items(), items.as_slice());
    }

    #[test]
    fn malformed_value_is_an_error() {
        let result = decode_items::<CartItem>("{not json");
        assert!(matches!(result, Err(Error::InvalidCache(_))));

        let result = decode_items::<CartItem>(r#"{"items": []}"#);
        assert!(matches!(result, Err(Error::InvalidCache(_))));
    }

    #[test]
    fn decode_normalizes() {
        let raw = r#"[
            {"id":"x","productId":"p1","name":"Tee","price":20.0,"image":"","size":"M","quantity":30},
            {"id":"p1-M","productId":"p1","name":"Tee","price":20.0,"image":"","size":"M","quantity":1}
        ]"#;
        let list: ItemList<CartItem> = decode_items(raw).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.items()[0].id, "p1-M");
        assert_eq!(list.items()[0].quantity, 15);
    }

    #[test]
    fn normalize_untyped_wishlist() {
        let items = json!([
            {"productId": "p1", "name": "Tee", "price": 20.0, "image": ""},
            {"productId": "p1", "name": "Tee", "price": 20.0, "image": ""}
        ]);
        let normalized = normalize_items_value(ListKind::Wishlist, items).unwrap();
        assert_eq!(normalized.as_array().unwrap().len(), 1);
        assert_eq!(normalized[0]["id"], "p1");
    }

    #[test]
    fn normalize_rejects_wrong_shape() {
        let items = json!([{"productId": "p1"}]);
        let result = normalize_items_value(ListKind::Cart, items);
        assert!(matches!(result, Err(Error::InvalidDocument(_))));
    }
}
