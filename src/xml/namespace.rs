//! XML namespace repository and per-document `xmlns_context` (C4).
//!
//! Grounded in the interning discipline of [`crate::strings::InternPool`]:
//! a URI is interned once and its `StrView` is handed out as the stable
//! "identifier" the spec describes (a pointer to an interned string, never
//! null). Two repositories built from the same `add_predefined_values`
//! call agree on indices for the shared URIs; identifiers are only
//! pointer-equal within the repository that produced them (spec §4.4).

use crate::strings::{InternPool, StrView};
use std::collections::HashMap;

/// Returned by `get_identifier` for an index with no registered URI.
pub const XMLNS_UNKNOWN_ID: NamespaceId = NamespaceId(usize::MAX);

/// Opaque handle standing in for "pointer to interned URI" in a
/// garbage-collected host language; equality/copy semantics only make
/// sense relative to the repository that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(usize);

/// Ordered, deduplicated list of URI strings with stable indices.
pub struct NamespaceRepository {
    pool: InternPool,
    uris: Vec<String>,
    index_of: HashMap<String, usize>,
}

impl NamespaceRepository {
    pub fn new() -> Self {
        NamespaceRepository { pool: InternPool::new(), uris: Vec::new(), index_of: HashMap::new() }
    }

    /// Register a fixed, ordered list of known URIs (spec §4.4). Calling
    /// this twice with the same list on two fresh repositories yields
    /// agreeing indices for every shared URI.
    pub fn add_predefined_values(&mut self, uris: &[&str]) {
        for uri in uris {
            self.intern_uri(uri);
        }
    }

    /// Look the URI up, installing it with the next index if absent.
    /// Returns the now-stable index.
    pub fn intern_uri(&mut self, uri: &str) -> usize {
        if let Some(&idx) = self.index_of.get(uri) {
            return idx;
        }
        let (_, _) = self.pool.intern_str(uri);
        let idx = self.uris.len();
        self.uris.push(uri.to_string());
        self.index_of.insert(uri.to_string(), idx);
        idx
    }

    /// The stable identifier for an already-registered index, or
    /// `XMLNS_UNKNOWN_ID` if out of range.
    pub fn get_identifier(&self, index: usize) -> NamespaceId {
        if index < self.uris.len() {
            NamespaceId(index)
        } else {
            XMLNS_UNKNOWN_ID
        }
    }

    /// The index backing a previously returned identifier.
    pub fn get_index(&self, id: NamespaceId) -> Option<usize> {
        if id == XMLNS_UNKNOWN_ID || id.0 >= self.uris.len() {
            None
        } else {
            Some(id.0)
        }
    }

    pub fn uri_at(&self, index: usize) -> Option<&str> {
        self.uris.get(index).map(|s| s.as_str())
    }

    /// A view into the interned copy of the URI at `index`, for callers
    /// that want the zero-copy `StrView` form rather than an owned `&str`.
    pub fn view_at(&mut self, index: usize) -> Option<StrView<'_>> {
        let uri = self.uris.get(index)?.clone();
        // Lookup only: the URI is already interned by `intern_uri`, so this
        // never grows the pool, it just hands back the stable view.
        Some(self.pool.intern_str(&uri).0)
    }

    pub fn create_context(&self) -> XmlnsContext {
        XmlnsContext::new()
    }
}

impl Default for NamespaceRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-document prefix → namespace-index stack. Each prefix may have
/// multiple bindings pushed as nested elements re-declare it; `pop` drops
/// only the innermost one.
#[derive(Debug, Clone, Default)]
pub struct XmlnsContext {
    bindings: HashMap<String, Vec<usize>>,
    insertion_order: Vec<usize>,
}

impl XmlnsContext {
    pub fn new() -> Self {
        XmlnsContext { bindings: HashMap::new(), insertion_order: Vec::new() }
    }

    /// Resolve `uri` against `repo` (installing it if absent) and push
    /// `(prefix, index)` onto this context's stack.
    pub fn push(&mut self, repo: &mut NamespaceRepository, prefix: &str, uri: &str) {
        let index = repo.intern_uri(uri);
        self.bindings.entry(prefix.to_string()).or_default().push(index);
        self.insertion_order.push(index);
    }

    /// Drop the innermost binding for `prefix`, if any.
    pub fn pop(&mut self, prefix: &str) {
        if let Some(stack) = self.bindings.get_mut(prefix) {
            stack.pop();
            if stack.is_empty() {
                self.bindings.remove(prefix);
            }
        }
    }

    /// The innermost namespace index bound to `prefix`.
    pub fn get(&self, prefix: &str) -> Option<usize> {
        self.bindings.get(prefix).and_then(|stack| stack.last().copied())
    }

    /// All namespace indices pushed in this context, in insertion order
    /// (may contain duplicates if the same URI was pushed under more than
    /// one prefix).
    pub fn get_all_namespaces(&self) -> &[usize] {
        &self.insertion_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XLS_XML_NAMESPACES: &[&str] = &[
        "urn:schemas-microsoft-com:office:spreadsheet",
        "urn:schemas-microsoft-com:office:excel",
        "urn:schemas-microsoft-com:office:office",
        "http://www.w3.org/TR/REC-html40",
    ];

    #[test]
    fn predefined_indices_are_stable_and_in_order() {
        let mut repo = NamespaceRepository::new();
        repo.add_predefined_values(XLS_XML_NAMESPACES);
        assert_eq!(repo.uri_at(0), Some("urn:schemas-microsoft-com:office:spreadsheet"));
        assert_eq!(repo.uri_at(3), Some("http://www.w3.org/TR/REC-html40"));
    }

    #[test]
    fn two_repositories_with_same_predefined_list_agree_on_indices() {
        let mut a = NamespaceRepository::new();
        let mut b = NamespaceRepository::new();
        a.add_predefined_values(XLS_XML_NAMESPACES);
        b.add_predefined_values(XLS_XML_NAMESPACES);
        for uri in XLS_XML_NAMESPACES {
            assert_eq!(a.index_of.get(*uri), b.index_of.get(*uri));
        }
    }

    #[test]
    fn unregistered_index_is_unknown() {
        let repo = NamespaceRepository::new();
        assert_eq!(repo.get_identifier(0), XMLNS_UNKNOWN_ID);
    }

    #[test]
    fn context_push_pop_tracks_innermost_binding() {
        let mut repo = NamespaceRepository::new();
        let mut ctx = repo.create_context();
        ctx.push(&mut repo, "ss", "urn:schemas-microsoft-com:office:spreadsheet");
        ctx.push(&mut repo, "ss", "urn:schemas-microsoft-com:office:excel");
        assert_eq!(ctx.get("ss"), repo.index_of.get("urn:schemas-microsoft-com:office:excel").copied());
        ctx.pop("ss");
        assert_eq!(ctx.get("ss"), repo.index_of.get("urn:schemas-microsoft-com:office:spreadsheet").copied());
        ctx.pop("ss");
        assert_eq!(ctx.get("ss"), None);
    }

    #[test]
    fn installing_uri_via_push_is_visible_in_repo() {
        let mut repo = NamespaceRepository::new();
        let mut ctx = repo.create_context();
        ctx.push(&mut repo, "gnm", "http://www.gnumeric.org/v10.dtd");
        assert_eq!(repo.uri_at(0), Some("http://www.gnumeric.org/v10.dtd"));
    }

    #[test]
    fn get_all_namespaces_preserves_insertion_order() {
        let mut repo = NamespaceRepository::new();
        let mut ctx = repo.create_context();
        ctx.push(&mut repo, "a", "urn:a");
        ctx.push(&mut repo, "b", "urn:b");
        ctx.push(&mut repo, "a", "urn:a2");
        assert_eq!(ctx.get_all_namespaces().len(), 3);
    }
}
