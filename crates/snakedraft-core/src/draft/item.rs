// Draftable items and the references callers use to name them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single draftable unit, e.g. a competition team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Synthetic identity, generated once at creation.
    pub id: Uuid,
    /// What people see and type, e.g. "254".
    pub label: String,
    /// Ordering key for the pool (ascending).
    pub sort_key: i64,
}

impl Item {
    /// Create an item with a fresh identity.
    pub fn new(label: impl Into<String>, sort_key: i64) -> Self {
        Item {
            id: Uuid::new_v4(),
            label: label.into(),
            sort_key,
        }
    }

    /// Pool ordering: sort key ascending, ties broken by id.
    pub(crate) fn order_key(&self) -> (i64, Uuid) {
        (self.sort_key, self.id)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// How a pick request names the item it wants.
///
/// Identity is authoritative. A label is a convenience alias for typed input
/// and resolves to the first pool item carrying that label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemRef {
    Id(Uuid),
    Label(String),
}

impl ItemRef {
    /// Interpret free-form input: a UUID becomes an identity reference,
    /// anything else is treated as a label.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match Uuid::parse_str(trimmed) {
            Ok(id) => ItemRef::Id(id),
            Err(_) => ItemRef::Label(trimmed.to_string()),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            ItemRef::Id(id) => item.id == *id,
            ItemRef::Label(label) => item.label == *label,
        }
    }
}

impl From<&Item> for ItemRef {
    fn from(item: &Item) -> Self {
        ItemRef::Id(item.id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Id(id) => write!(f, "{id}"),
            ItemRef::Label(label) => write!(f, "{label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_items_get_distinct_ids() {
        let a = Item::new("254", 254);
        let b = Item::new("254", 254);
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_prefers_uuid() {
        let item = Item::new("1678", 1678);
        let parsed = ItemRef::parse(&item.id.to_string());
        assert_eq!(parsed, ItemRef::Id(item.id));
        assert!(parsed.matches(&item));
    }

    #[test]
    fn parse_falls_back_to_trimmed_label() {
        assert_eq!(ItemRef::parse("  971 "), ItemRef::Label("971".into()));
    }

    #[test]
    fn label_ref_matches_by_label_only() {
        let item = Item::new("118", 118);
        assert!(ItemRef::Label("118".into()).matches(&item));
        assert!(!ItemRef::Label("1180".into()).matches(&item));
        assert!(!ItemRef::Id(Uuid::new_v4()).matches(&item));
    }
}
