//! Bookkeeping for popups whose target URL is not known yet.
//!
//! The engine asks for a browsing context before it reports where that
//! context is going. Until the first real navigation arrives, the shell holds
//! a hidden placeholder for it. A placeholder leaves the table in one of
//! three ways:
//!
//! - its first navigation is decided (new window or default browser);
//! - the page closes it (`window.close()` on the popup);
//! - the window that opened it is closed.
//!
//! A popup that never navigates (`window.open()` followed by
//! `document.write`) is never shown. It lives at most as long as its opener.

use std::collections::HashMap;
use std::hash::Hash;

/// Placeholders keyed by context id, each remembering its opener.
#[derive(Debug)]
pub struct PendingPopups<K, O, H> {
    entries: HashMap<K, (O, H)>,
}

impl<K, O, H> Default for PendingPopups<K, O, H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, O: PartialEq, H> PendingPopups<K, O, H> {
    pub fn insert(&mut self, id: K, opener: O, handle: H) {
        self.entries.insert(id, (opener, handle));
    }

    /// Removes the placeholder `id`, decided or closed. `None` if it was
    /// already gone.
    pub fn remove(&mut self, id: &K) -> Option<H> {
        self.entries.remove(id).map(|(_, handle)| handle)
    }

    /// Removes every placeholder opened by `opener`.
    pub fn evict_opener(&mut self, opener: &O) -> Vec<H> {
        let orphans: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, (owner, _))| owner == opener)
            .map(|(id, _)| id.clone())
            .collect();
        orphans.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Table = PendingPopups<u32, &'static str, String>;

    fn table() -> Table {
        let mut popups = Table::default();
        popups.insert(1, "home", "popup-1".into());
        popups.insert(2, "home", "popup-2".into());
        popups.insert(3, "docs", "popup-3".into());
        popups
    }

    #[test]
    fn test_decided_popup_is_released_once() {
        let mut popups = table();
        assert_eq!(popups.remove(&1).as_deref(), Some("popup-1"));
        assert_eq!(popups.remove(&1), None);
        assert_eq!(popups.len(), 2);
    }

    #[test]
    fn test_closing_opener_evicts_its_popups_only() {
        let mut popups = table();
        let mut evicted = popups.evict_opener(&"home");
        evicted.sort();
        assert_eq!(evicted, vec!["popup-1", "popup-2"]);

        assert!(popups.contains(&3));
        assert_eq!(popups.len(), 1);
        assert!(popups.evict_opener(&"home").is_empty());
    }

    #[test]
    fn test_popup_that_never_navigates_goes_with_its_opener() {
        // window.open() then document.write: no navigation ever decides it.
        let mut popups = Table::default();
        popups.insert(7, "report", "blank".into());
        assert!(popups.contains(&7));

        assert_eq!(popups.evict_opener(&"report"), vec!["blank".to_string()]);
        assert!(popups.is_empty());
    }

    #[test]
    fn test_popup_closed_by_page_before_navigating() {
        let mut popups = table();
        assert!(popups.remove(&3).is_some());
        assert!(popups.evict_opener(&"docs").is_empty());
    }
}
