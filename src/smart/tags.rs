//! Tag Index Module
//!
//! Secondary index from tag to the keys stored under it.

use std::collections::{HashMap, HashSet};

/// Characters that split a key into implicit tag segments.
const SEGMENT_SEPARATORS: [char; 2] = [':', '/'];

// == Tag Index ==
/// Maps each tag to the set of keys carrying it.
///
/// Every key is indexed under its non-empty `:`/`/` segments plus any
/// explicit tags supplied at write time. Lookups are exact tag matches.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_tag: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Implicit tags derived from the key's segments.
    pub fn implicit_tags(key: &str) -> impl Iterator<Item = &str> {
        key.split(SEGMENT_SEPARATORS).filter(|s| !s.is_empty())
    }

    // == Insert ==
    /// Indexes `key` under its implicit tags and `explicit`.
    pub fn insert(&mut self, key: &str, explicit: &[String]) {
        let tags = Self::implicit_tags(key)
            .map(str::to_string)
            .chain(explicit.iter().cloned());

        for tag in tags {
            self.by_tag.entry(tag).or_default().insert(key.to_string());
        }
    }

    // == Remove ==
    /// Drops `key` from every tag it was indexed under.
    pub fn remove(&mut self, key: &str, explicit: &[String]) {
        let tags = Self::implicit_tags(key)
            .map(str::to_string)
            .chain(explicit.iter().cloned());

        for tag in tags {
            if let Some(keys) = self.by_tag.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(&tag);
                }
            }
        }
    }

    // == Keys For Tag ==
    /// Keys currently indexed under `tag`.
    pub fn keys_for(&self, tag: &str) -> Vec<String> {
        self.by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.by_tag.clear();
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut keys: Vec<String>) -> Vec<String> {
        keys.sort();
        keys
    }

    #[test]
    fn test_implicit_segments() {
        let tags: Vec<&str> = TagIndex::implicit_tags("api:/v1/products").collect();
        assert_eq!(tags, vec!["api", "v1", "products"]);
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut index = TagIndex::new();
        index.insert("api:/v1/products", &[]);
        index.insert("api:/v1/product-reviews", &[]);

        assert_eq!(index.keys_for("products"), vec!["api:/v1/products"]);
        assert!(index.keys_for("prod").is_empty());
        assert_eq!(index.keys_for("v1").len(), 2);
    }

    #[test]
    fn test_explicit_tags() {
        let mut index = TagIndex::new();
        index.insert("hero-image", &["media".to_string()]);
        index.insert("promo-video", &["media".to_string()]);

        assert_eq!(
            sorted(index.keys_for("media")),
            vec!["hero-image".to_string(), "promo-video".to_string()]
        );
    }

    #[test]
    fn test_remove_prunes_empty_tags() {
        let mut index = TagIndex::new();
        let explicit = vec!["faq".to_string()];
        index.insert("content:faq", &explicit);
        assert_eq!(index.len(), 2);

        index.remove("content:faq", &explicit);
        assert!(index.is_empty());
        assert!(index.keys_for("faq").is_empty());
    }

    #[test]
    fn test_duplicate_tag_sources_index_once() {
        let mut index = TagIndex::new();
        // "faq" is both a segment and an explicit tag
        index.insert("content:faq", &["faq".to_string()]);
        assert_eq!(index.keys_for("faq"), vec!["content:faq"]);
    }
}
