//! Per-column index: an ordered map from a column value to the RIDs
//! observed carrying that value, split into base and tail lists (§4.4).

use std::collections::BTreeMap;

use crate::common::rid::{PageKind, Rid};

#[derive(Debug, Default, Clone)]
struct RidLists {
    base: Vec<Rid>,
    tail: Vec<Rid>,
}

impl RidLists {
    fn list_mut(&mut self, kind: PageKind) -> &mut Vec<Rid> {
        match kind {
            PageKind::Base => &mut self.base,
            PageKind::Tail => &mut self.tail,
        }
    }

    fn is_empty(&self) -> bool {
        self.base.is_empty() && self.tail.is_empty()
    }
}

/// Ordered map `value -> (base_rids, tail_rids)` for one column.
#[derive(Debug, Default)]
pub struct ColumnIndex {
    data: BTreeMap<i64, RidLists>,
}

impl ColumnIndex {
    pub fn new() -> Self {
        Self { data: BTreeMap::new() }
    }

    pub fn add(&mut self, value: i64, rid: Rid, kind: PageKind) {
        self.data.entry(value).or_default().list_mut(kind).push(rid);
    }

    /// Remove `rid` from both sub-lists at `value`; drops the entry if it
    /// becomes empty. Returns whether anything was removed.
    pub fn remove_rid(&mut self, value: i64, rid: Rid) -> bool {
        let Some(lists) = self.data.get_mut(&value) else {
            return false;
        };
        let before = lists.base.len() + lists.tail.len();
        lists.base.retain(|&r| r != rid);
        lists.tail.retain(|&r| r != rid);
        let removed = lists.base.len() + lists.tail.len() != before;
        if lists.is_empty() {
            self.data.remove(&value);
        }
        removed
    }

    /// `(base_rids, tail_rids)` for `value`; both empty if unseen.
    pub fn locate(&self, value: i64) -> (Vec<Rid>, Vec<Rid>) {
        match self.data.get(&value) {
            Some(lists) => (lists.base.clone(), lists.tail.clone()),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Every `(base_rids, tail_rids)` pair whose key falls in `[begin, end]`.
    pub fn value_in_range(&self, begin: i64, end: i64) -> Vec<(i64, Vec<Rid>, Vec<Rid>)> {
        self.data
            .range(begin..=end)
            .map(|(&key, lists)| (key, lists.base.clone(), lists.tail.clone()))
            .collect()
    }

    pub fn delete_value(&mut self, value: i64) {
        self.data.remove(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_locate() {
        let mut idx = ColumnIndex::new();
        idx.add(10, Rid::new(0), PageKind::Base);
        idx.add(10, Rid::new(5), PageKind::Tail);
        let (base, tail) = idx.locate(10);
        assert_eq!(base, vec![Rid::new(0)]);
        assert_eq!(tail, vec![Rid::new(5)]);
        assert_eq!(idx.locate(99), (vec![], vec![]));
    }

    #[test]
    fn remove_rid_drops_empty_entries() {
        let mut idx = ColumnIndex::new();
        idx.add(10, Rid::new(0), PageKind::Base);
        assert!(idx.remove_rid(10, Rid::new(0)));
        assert_eq!(idx.locate(10), (vec![], vec![]));
        assert!(!idx.remove_rid(10, Rid::new(0)));
    }

    #[test]
    fn value_in_range_is_ordered() {
        let mut idx = ColumnIndex::new();
        for v in [5, 1, 3] {
            idx.add(v, Rid::new(v), PageKind::Base);
        }
        let keys: Vec<i64> = idx.value_in_range(1, 5).into_iter().map(|(k, _, _)| k).collect();
        assert_eq!(keys, vec![1, 3, 5]);
    }
}
