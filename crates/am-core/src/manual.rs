//! User-maintained block list
//!
//! Entries are added and removed by the user at runtime and checked before
//! the subscription. An entry blocks every URL containing it, ignoring ASCII
//! case.

/// Manually blocked URL fragments, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ManualBlockList {
    entries: Vec<String>,
}

impl ManualBlockList {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.eq_ignore_ascii_case(entry))
    }

    /// Add an entry. Blank and already listed entries are ignored.
    pub fn add(&mut self, entry: &str) -> bool {
        let entry = entry.trim();
        if entry.is_empty() || self.position(entry).is_some() {
            return false;
        }
        self.entries.push(entry.to_string());
        true
    }

    pub fn remove(&mut self, entry: &str) -> bool {
        match self.position(entry.trim()) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry contained in the URL.
    pub fn first_match(&self, url: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let url = url.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|entry| url.contains(entry.to_ascii_lowercase().as_str()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_trims_and_ignores_duplicates() {
        let mut list = ManualBlockList::new();
        assert!(list.add("  https://ads.example/  "));
        assert!(!list.add("HTTPS://ADS.EXAMPLE/"));
        assert!(!list.add("   "));
        assert_eq!(list.entries(), ["https://ads.example/"]);
    }

    #[test]
    fn test_match_is_substring_and_case_insensitive() {
        let mut list = ManualBlockList::new();
        list.add("tracker.io/pixel");
        list.add("cdn.example");

        assert_eq!(list.first_match("https://TRACKER.io/pixel?id=1"), Some("tracker.io/pixel"));
        assert_eq!(list.first_match("https://cdn.example/app.js"), Some("cdn.example"));
        assert_eq!(list.first_match("https://tracker.io/other"), None);
    }

    #[test]
    fn test_remove() {
        let mut list = ManualBlockList::new();
        list.add("a.example");
        list.add("b.example");

        assert!(list.remove(" A.example"));
        assert!(!list.remove("a.example"));
        assert_eq!(list.entries(), ["b.example"]);
        assert!(list.first_match("https://a.example/").is_none());
    }
}
