// The pool of items still available to pick.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{Item, ItemRef};

/// Items not yet owned by any participant, kept sorted by sort key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Item>", into = "Vec<Item>")]
pub struct ItemPool {
    items: Vec<Item>,
}

impl ItemPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, keeping the pool ordered.
    pub fn add(&mut self, item: Item) {
        let at = self
            .items
            .partition_point(|existing| existing.order_key() <= item.order_key());
        self.items.insert(at, item);
    }

    /// Remove an item by identity. Absent items are a no-op.
    pub fn remove(&mut self, id: Uuid) -> Option<Item> {
        let idx = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(idx))
    }

    /// Find the item a reference names.
    ///
    /// Label references resolve to the first match in pool order, i.e. the
    /// lowest sort key carrying that label.
    pub fn find(&self, item_ref: &ItemRef) -> Option<&Item> {
        self.items.iter().find(|i| item_ref.matches(i))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Read-only ordered view.
    pub fn list(&self) -> &[Item] {
        &self.items
    }
}

impl From<Vec<Item>> for ItemPool {
    fn from(mut items: Vec<Item>) -> Self {
        items.sort_by_key(Item::order_key);
        ItemPool { items }
    }
}

impl From<ItemPool> for Vec<Item> {
    fn from(pool: ItemPool) -> Self {
        pool.items
    }
}

impl FromIterator<Item> for ItemPool {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pool: &ItemPool) -> Vec<&str> {
        pool.list().iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn add_keeps_numeric_order() {
        let mut pool = ItemPool::new();
        pool.add(Item::new("971", 971));
        pool.add(Item::new("8", 8));
        pool.add(Item::new("254", 254));
        pool.add(Item::new("1678", 1678));
        assert_eq!(labels(&pool), vec!["8", "254", "971", "1678"]);
    }

    #[test]
    fn ties_are_broken_by_id() {
        let a = Item::new("a", 5);
        let b = Item::new("b", 5);
        let mut pool = ItemPool::new();
        pool.add(a.clone());
        pool.add(b.clone());
        let first = if a.id < b.id { &a } else { &b };
        assert_eq!(pool.list()[0].id, first.id);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut pool: ItemPool = vec![Item::new("1", 1), Item::new("2", 2)].into();
        assert!(pool.remove(Uuid::new_v4()).is_none());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn remove_returns_item() {
        let item = Item::new("33", 33);
        let mut pool: ItemPool = vec![Item::new("1", 1), item.clone()].into();
        assert_eq!(pool.remove(item.id), Some(item.clone()));
        assert!(!pool.contains(item.id));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn from_vec_sorts() {
        let pool: ItemPool = vec![Item::new("30", 30), Item::new("4", 4), Item::new("100", 100)].into();
        assert_eq!(labels(&pool), vec!["4", "30", "100"]);
    }

    #[test]
    fn find_by_label_picks_lowest_sort_key() {
        let low = Item::new("dup", 1);
        let high = Item::new("dup", 2);
        let pool: ItemPool = vec![high, low.clone()].into();
        assert_eq!(pool.find(&ItemRef::Label("dup".into())).map(|i| i.id), Some(low.id));
    }

    #[test]
    fn find_by_id_is_exact() {
        let target = Item::new("dup", 2);
        let pool: ItemPool = vec![Item::new("dup", 1), target.clone()].into();
        assert_eq!(pool.find(&ItemRef::Id(target.id)), Some(&target));
    }
}
