//! Import-scoped translation of archived document ids.

use std::collections::HashMap;

/// Maps archived document ids to target-workspace document ids.
///
/// Built while documents are imported (or matched against existing ones) and
/// dropped when the import call returns. Archived ids are only meaningful in
/// the exporting workspace, so nothing outside this map may reuse them.
#[derive(Debug, Default)]
pub struct IdentifierMap {
    ids: HashMap<String, String>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, archived_id: impl Into<String>, target_id: impl Into<String>) {
        self.ids.insert(archived_id.into(), target_id.into());
    }

    pub fn resolve(&self, archived_id: &str) -> Option<&str> {
        self.ids.get(archived_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Translate a member list, keeping order and dropping ids with no
    /// mapping. Returns the resolved ids and how many were dropped.
    pub fn remap_members(&self, archived_ids: &[String]) -> (Vec<String>, usize) {
        let mut resolved: Vec<String> = Vec::with_capacity(archived_ids.len());
        let mut dropped = 0;
        for archived in archived_ids {
            match self.resolve(archived) {
                // Two archived docs can map to one target doc after dedup
                Some(target) if resolved.iter().any(|r| r == target) => {}
                Some(target) => resolved.push(target.to_string()),
                None => dropped += 1,
            }
        }
        (resolved, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn remap_translates_in_order() {
        let mut map = IdentifierMap::new();
        map.insert("a", "new-a");
        map.insert("b", "new-b");
        let (resolved, dropped) = map.remap_members(&ids(&["b", "a"]));
        assert_eq!(resolved, ids(&["new-b", "new-a"]));
        assert_eq!(dropped, 0);
    }

    #[test]
    fn unmapped_members_are_dropped() {
        let mut map = IdentifierMap::new();
        map.insert("a", "new-a");
        let (resolved, dropped) = map.remap_members(&ids(&["a", "ghost", "phantom"]));
        assert_eq!(resolved, ids(&["new-a"]));
        assert_eq!(dropped, 2);
    }

    #[test]
    fn empty_map_drops_everything() {
        let map = IdentifierMap::new();
        assert!(map.is_empty());
        let (resolved, dropped) = map.remap_members(&ids(&["a", "b"]));
        assert!(resolved.is_empty());
        assert_eq!(dropped, 2);
    }

    #[test]
    fn members_collapsing_onto_one_target_are_kept_once() {
        let mut map = IdentifierMap::new();
        map.insert("a", "existing");
        map.insert("a-copy", "existing");
        let (resolved, dropped) = map.remap_members(&ids(&["a", "a-copy"]));
        assert_eq!(resolved, ids(&["existing"]));
        assert_eq!(dropped, 0);
        assert_eq!(map.len(), 2);
    }
}
