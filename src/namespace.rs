//! Namespace handling.
//!
//! Two pieces: the caller-supplied [`NamespaceContext`] (immutable prefix to
//! URI bindings used to resolve qualified names in path expressions) and the
//! scan-time [`NamespaceScope`] (a stack of declarations seen while walking
//! a document).

use crate::error::UnboundPrefixError;
use std::collections::BTreeMap;

/// Well-known namespace URIs.
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Immutable prefix-to-URI binding set supplied by the caller.
///
/// Built once, then shared read-only across pipeline invocations. The `xml`
/// and `xmlns` prefixes are pre-bound per the XML namespaces spec.
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    bindings: BTreeMap<String, String>,
}

impl NamespaceContext {
    pub fn builder() -> NamespaceContextBuilder {
        NamespaceContextBuilder {
            bindings: BTreeMap::new(),
        }
    }

    /// Single-binding convenience constructor.
    pub fn single(prefix: &str, uri: &str) -> Self {
        Self::builder().bind(prefix, uri).build()
    }

    /// Resolve a prefix to its URI.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Resolve a prefix, failing loud on a missing binding.
    pub fn resolve_required(&self, prefix: &str) -> Result<&str, UnboundPrefixError> {
        self.resolve(prefix)
            .ok_or_else(|| UnboundPrefixError(prefix.to_string()))
    }
}

/// Builder for [`NamespaceContext`].
pub struct NamespaceContextBuilder {
    bindings: BTreeMap<String, String>,
}

impl NamespaceContextBuilder {
    pub fn bind(mut self, prefix: &str, uri: &str) -> Self {
        self.bindings.insert(prefix.to_string(), uri.to_string());
        self
    }

    pub fn build(mut self) -> NamespaceContext {
        // Reserved by XML namespaces; a caller rebinding them is ignored.
        self.bindings.insert("xml".to_string(), ns::XML.to_string());
        self.bindings
            .insert("xmlns".to_string(), ns::XMLNS.to_string());
        NamespaceContext {
            bindings: self.bindings,
        }
    }
}

/// One in-scope declaration. `prefix == None` is the default namespace.
#[derive(Debug, Clone)]
struct ScopeBinding {
    prefix: Option<Vec<u8>>,
    uri: Vec<u8>,
    depth: u16,
}

/// Stack of namespace declarations visible at the current scan position.
///
/// Declarations are pushed as elements open and dropped as they close;
/// resolution walks newest-first so inner declarations shadow outer ones.
#[derive(Debug, Default)]
pub struct NamespaceScope {
    bindings: Vec<ScopeBinding>,
    depth: u16,
}

impl NamespaceScope {
    pub fn new() -> Self {
        NamespaceScope {
            bindings: Vec::with_capacity(16),
            depth: 0,
        }
    }

    /// Enter an element scope.
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, dropping declarations made in it.
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a binding in the current scope.
    pub fn declare(&mut self, prefix: Option<&[u8]>, uri: &[u8]) {
        self.bindings.push(ScopeBinding {
            prefix: prefix.map(<[u8]>::to_vec),
            uri: uri.to_vec(),
            depth: self.depth,
        });
    }

    /// Resolve a prefix (None = default namespace) against the stack.
    pub fn resolve(&self, prefix: Option<&[u8]>) -> Option<&[u8]> {
        for binding in self.bindings.iter().rev() {
            if binding.prefix.as_deref() == prefix {
                return Some(&binding.uri);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_resolve() {
        let ctx = NamespaceContext::single("news", "http://example.com/newsfeed");
        assert_eq!(ctx.resolve("news"), Some("http://example.com/newsfeed"));
        assert_eq!(ctx.resolve("other"), None);
    }

    #[test]
    fn test_context_prebinds_xml() {
        let ctx = NamespaceContext::builder().build();
        assert_eq!(ctx.resolve("xml"), Some(ns::XML));
        assert_eq!(ctx.resolve("xmlns"), Some(ns::XMLNS));
    }

    #[test]
    fn test_resolve_required_fails_loud() {
        let ctx = NamespaceContext::builder().build();
        let err = ctx.resolve_required("news").unwrap_err();
        assert_eq!(err.0, "news");
    }

    #[test]
    fn test_scope_declare_and_pop() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare(Some(b"a"), b"http://one/");
        assert_eq!(scope.resolve(Some(b"a")), Some(b"http://one/" as &[u8]));

        scope.pop_scope();
        assert_eq!(scope.resolve(Some(b"a")), None);
    }

    #[test]
    fn test_scope_shadowing() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare(Some(b"a"), b"http://outer/");
        scope.push_scope();
        scope.declare(Some(b"a"), b"http://inner/");
        assert_eq!(scope.resolve(Some(b"a")), Some(b"http://inner/" as &[u8]));

        scope.pop_scope();
        assert_eq!(scope.resolve(Some(b"a")), Some(b"http://outer/" as &[u8]));
    }

    #[test]
    fn test_default_namespace() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare(None, b"http://default/");
        assert_eq!(scope.resolve(None), Some(b"http://default/" as &[u8]));
    }
}
