//! User-defined ordering of records stored in an unordered collection.
//!
//! The order lives in its own list of ids, separate from the records. The two
//! drift apart when records are added or removed elsewhere, so readers go
//! through [`ItemOrder::resolve`] and writers through
//! [`ItemOrder::reconcile`].

use serde::{Deserialize, Serialize};

use crate::storage::{Illustrated, ImageId};

/// Anything with a stable document id.
pub trait Identified {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Ordered list of record ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemOrder {
    ids: Vec<String>,
}

impl ItemOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored ids, dropping duplicates after their first occurrence.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order = Self::new();
        for id in ids {
            order.append(id);
        }
        order
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn is_first(&self, id: &str) -> bool {
        self.ids.first().is_some_and(|first| first == id)
    }

    pub fn is_last(&self, id: &str) -> bool {
        self.ids.last().is_some_and(|last| last == id)
    }

    /// Add `id` at the end. Returns false if it was already present.
    pub fn append(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Returns false if `id` was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Swap `id` with its neighbour in `direction`.
    ///
    /// Moving the first item up, the last item down or an unknown id does
    /// nothing and returns false.
    pub fn move_item(&mut self, id: &str, direction: Direction) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.ids.len() => index + 1,
            _ => return false,
        };
        self.ids.swap(index, target);
        true
    }

    /// `items` in stored order. Ids without a matching item are skipped and
    /// items missing from the order are left out.
    pub fn resolve<'a, T: Identified>(&self, items: &'a [T]) -> Vec<&'a T> {
        self.ids
            .iter()
            .filter_map(|id| items.iter().find(|item| item.id() == id))
            .collect()
    }

    /// Drop ids with no item and append items the order does not list yet.
    ///
    /// Returns true if the order changed.
    pub fn reconcile<T: Identified>(&mut self, items: &[T]) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| items.iter().any(|item| item.id() == id));
        let mut changed = self.ids.len() != before;
        for item in items {
            if self.append(item.id()) {
                changed = true;
            }
        }
        if changed {
            log::debug!("item order reconciled to {} entries", self.ids.len());
        }
        changed
    }
}

/// A titled text block on a site page, optionally illustrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformativeText {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(rename = "imageId", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageId>,
}

impl Identified for InformativeText {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Illustrated for InformativeText {
    fn image(&self) -> Option<ImageId> {
        self.image
    }

    fn set_image(&mut self, image: Option<ImageId>) {
        self.image = image;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &str) -> InformativeText {
        InformativeText {
            id: id.to_string(),
            title: format!("Title {}", id),
            text: String::new(),
            image: None,
        }
    }

    fn ids(order: &ItemOrder) -> Vec<&str> {
        order.ids().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_append_rejects_duplicates() {
        let mut order = ItemOrder::from_ids(["a", "b", "a"]);
        assert_eq!(ids(&order), ["a", "b"]);
        assert!(!order.append("b"));
        assert!(order.append("c"));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_move_up_and_down() {
        let mut order = ItemOrder::from_ids(["a", "b", "c"]);
        assert!(order.move_item("c", Direction::Up));
        assert_eq!(ids(&order), ["a", "c", "b"]);
        assert!(order.move_item("a", Direction::Down));
        assert_eq!(ids(&order), ["c", "a", "b"]);
    }

    #[test]
    fn test_move_at_edges_is_noop() {
        let mut order = ItemOrder::from_ids(["a", "b"]);
        assert!(!order.move_item("a", Direction::Up));
        assert!(!order.move_item("b", Direction::Down));
        assert!(!order.move_item("zzz", Direction::Up));
        assert_eq!(ids(&order), ["a", "b"]);
    }

    #[test]
    fn test_first_and_last() {
        let order = ItemOrder::from_ids(["a", "b", "c"]);
        assert!(order.is_first("a") && !order.is_first("b"));
        assert!(order.is_last("c") && !order.is_last("b"));
        assert!(!ItemOrder::new().is_first("a"));
    }

    #[test]
    fn test_remove() {
        let mut order = ItemOrder::from_ids(["a", "b"]);
        assert!(order.remove("a"));
        assert!(!order.remove("a"));
        assert_eq!(ids(&order), ["b"]);
    }

    #[test]
    fn test_resolve_skips_dangling_ids() {
        let items = vec![text("a"), text("b"), text("c")];
        let order = ItemOrder::from_ids(["c", "gone", "a"]);
        let resolved: Vec<&str> = order.resolve(&items).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(resolved, ["c", "a"]);
    }

    #[test]
    fn test_reconcile() {
        let items = vec![text("a"), text("b"), text("c")];
        let mut order = ItemOrder::from_ids(["b", "gone"]);
        assert!(order.reconcile(&items));
        assert_eq!(ids(&order), ["b", "a", "c"]);
        assert!(!order.reconcile(&items));
    }

    #[test]
    fn test_removing_text_releases_its_image() {
        use crate::encode::{encode_rgba, OutputFormat};
        use crate::storage::{ImageEdit, ImageRepository, MemoryStore};

        let artifact = encode_rgba(
            &image::RgbaImage::from_pixel(2, 2, image::Rgba([5, 5, 5, 255])),
            OutputFormat::Png,
        )
        .unwrap();
        let mut repo = ImageRepository::new(MemoryStore::new());
        let mut item = text("a");
        let mut order = ItemOrder::from_ids(["a"]);
        repo.edit_record_image(
            "informativetexts",
            &mut item,
            ImageEdit::Replace(&artifact),
        )
        .unwrap();
        assert!(item.image.is_some());
        assert_eq!(repo.store().len(), 1);

        repo.release_record_image("informativetexts", &item).unwrap();
        assert!(order.remove(&item.id));
        assert!(repo.store().is_empty());
    }

    #[test]
    fn test_serde_shapes() {
        let order = ItemOrder::from_ids(["x", "y"]);
        assert_eq!(serde_json::to_string(&order).unwrap(), r#"["x","y"]"#);

        let plain: InformativeText =
            serde_json::from_str(r#"{"id":"1","title":"T","text":"body"}"#).unwrap();
        assert_eq!(plain.image, None);
        assert!(!serde_json::to_string(&plain).unwrap().contains("imageId"));

        let id = ImageId::from_random_bytes([0; 16]);
        let with_image = InformativeText {
            image: Some(id),
            ..plain
        };
        let json = serde_json::to_string(&with_image).unwrap();
        assert!(json.contains(r#""imageId":"00000000-0000-4000-8000-000000000000""#));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: moves permute the order without losing or duplicating ids.
        #[test]
        fn prop_moves_preserve_membership(
            len in 1usize..10,
            moves in prop::collection::vec((0usize..10, any::<bool>()), 0..30),
        ) {
            let mut order = ItemOrder::from_ids((0..len).map(|i| i.to_string()));
            for (index, up) in moves {
                let id = (index % len).to_string();
                let direction = if up { Direction::Up } else { Direction::Down };
                order.move_item(&id, direction);
            }
            let mut sorted: Vec<usize> = order.ids().iter().map(|s| s.parse().unwrap()).collect();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..len).collect::<Vec<_>>());
        }
    }
}
