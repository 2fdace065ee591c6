//! Element/attribute name → small integer id mapping (spec §4.5, §9
//! "Dynamic dispatch on attribute names").
//!
//! Each per-format handler builds one `TokenMap` from its fixed vocabulary
//! list at construction time; name lookups during parsing become a hash
//! lookup returning a `TokenId` the handler then matches on. Keeping the id
//! assignment stable per format (indices follow declaration order) lets the
//! `match` in each handler compile down to a dense jump table rather than a
//! string-comparison chain.

use std::collections::HashMap;

/// Returned for any element/attribute name absent from the active format's
/// token table.
pub const XML_UNKNOWN_TOKEN: TokenId = TokenId(u32::MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl TokenId {
    pub fn is_unknown(self) -> bool {
        self == XML_UNKNOWN_TOKEN
    }
}

/// A fixed vocabulary of element/attribute names for one format, built
/// once and shared (read-only) across an entire parse.
#[derive(Debug, Default, Clone)]
pub struct TokenMap {
    by_name: HashMap<String, TokenId>,
    names: Vec<String>,
}

impl TokenMap {
    /// Build a map assigning ids `0, 1, 2, …` in the order `names` is given.
    pub fn new(names: &[&str]) -> Self {
        let mut by_name = HashMap::with_capacity(names.len());
        let mut owned = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            by_name.insert(name.to_string(), TokenId(i as u32));
            owned.push(name.to_string());
        }
        TokenMap { by_name, names: owned }
    }

    /// Look a name up; unknown names map to `XML_UNKNOWN_TOKEN` rather than
    /// failing the parse (spec §4.5).
    pub fn get(&self, name: &str) -> TokenId {
        self.by_name.get(name).copied().unwrap_or(XML_UNKNOWN_TOKEN)
    }

    pub fn name_of(&self, id: TokenId) -> Option<&str> {
        self.names.get(id.0 as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_get_declaration_order_ids() {
        let map = TokenMap::new(&["Row", "Cell", "Data"]);
        assert_eq!(map.get("Row"), TokenId(0));
        assert_eq!(map.get("Cell"), TokenId(1));
        assert_eq!(map.get("Data"), TokenId(2));
    }

    #[test]
    fn unknown_name_maps_to_unknown_token() {
        let map = TokenMap::new(&["Row"]);
        assert_eq!(map.get("Worksheet"), XML_UNKNOWN_TOKEN);
        assert!(map.get("Worksheet").is_unknown());
    }

    #[test]
    fn name_of_round_trips() {
        let map = TokenMap::new(&["Row", "Cell"]);
        let id = map.get("Cell");
        assert_eq!(map.name_of(id), Some("Cell"));
    }
}
