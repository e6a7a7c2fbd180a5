//! Rooted path expressions.
//!
//! A deliberately restricted subset of XPath: rooted steps over qualified
//! element names, child (`/`) and descendant (`//`) axes, and an optional
//! terminal selector (`@attr` or `text()`). This is all the splitting and
//! header-extraction contracts need; predicates, functions, and the
//! remaining axes are out of scope.

use crate::error::{Error, EvalError, UnboundPrefixError};
use crate::namespace::NamespaceContext;

/// A name qualified by its resolved namespace URI.
///
/// An unprefixed name in a path expression is in no namespace, per XPath 1.0
/// — it does not pick up the document's default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub uri: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(uri: Option<&str>, local: &str) -> Self {
        QName {
            uri: uri.map(str::to_string),
            local: local.to_string(),
        }
    }

    /// Structural equality against a resolved document element name.
    pub fn matches(&self, uri: Option<&[u8]>, local: &[u8]) -> bool {
        self.local.as_bytes() == local && self.uri.as_deref().map(str::as_bytes) == uri
    }
}

/// Step axis. `Child` is `/`, `Descendant` is `//`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
}

/// One element step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub axis: Axis,
    pub name: QName,
}

/// Terminal selector of an extraction path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The matched element itself (its text content).
    Text,
    /// An attribute of the matched element.
    Attribute(QName),
}

/// Compiled rooted path expression.
///
/// `selector == None` selects the matched element itself; evaluation then
/// yields its text content, same as an explicit `text()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub steps: Vec<PathStep>,
    pub selector: Option<Selector>,
    source: String,
}

impl PathExpr {
    /// Parse and resolve a path expression against a namespace context.
    pub fn parse(expr: &str, ctx: &NamespaceContext) -> Result<Self, Error> {
        let syntax = |reason: &str| {
            Error::Eval(EvalError::Syntax {
                expr: expr.to_string(),
                reason: reason.to_string(),
            })
        };

        let rest = expr
            .strip_prefix('/')
            .ok_or_else(|| syntax("path must be rooted (start with '/')"))?;
        if rest.is_empty() {
            return Err(syntax("path has no steps"));
        }

        let mut steps = Vec::new();
        let mut selector = None;
        let mut descendant = false;

        for (i, raw) in rest.split('/').enumerate() {
            if raw.is_empty() {
                // Empty segment between slashes: '//' marks the next step as
                // descendant. Leading '//' and trailing '/' are malformed.
                if i == 0 || descendant {
                    return Err(syntax("unexpected '/'"));
                }
                descendant = true;
                continue;
            }

            if let Some(attr) = raw.strip_prefix('@') {
                if descendant {
                    return Err(syntax("'//' cannot precede an attribute selector"));
                }
                selector = Some(Selector::Attribute(resolve_qname(attr, ctx, expr)?));
                let trailing = rest.split('/').skip(i + 1).count();
                if trailing > 0 {
                    return Err(syntax("attribute selector must be the last step"));
                }
                break;
            }

            if raw == "text()" {
                if descendant {
                    return Err(syntax("'//' cannot precede text()"));
                }
                selector = Some(Selector::Text);
                let trailing = rest.split('/').skip(i + 1).count();
                if trailing > 0 {
                    return Err(syntax("text() must be the last step"));
                }
                break;
            }

            let axis = if descendant {
                Axis::Descendant
            } else {
                Axis::Child
            };
            descendant = false;
            steps.push(PathStep {
                axis,
                name: resolve_qname(raw, ctx, expr)?,
            });
        }

        if descendant {
            return Err(syntax("trailing '//'"));
        }
        if steps.is_empty() {
            return Err(syntax("path selects no element"));
        }

        Ok(PathExpr {
            steps,
            selector,
            source: expr.to_string(),
        })
    }

    /// The expression text this path was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Resolve a possibly-prefixed name through the context.
fn resolve_qname(name: &str, ctx: &NamespaceContext, expr: &str) -> Result<QName, Error> {
    let syntax = |reason: &str| {
        Error::Eval(EvalError::Syntax {
            expr: expr.to_string(),
            reason: reason.to_string(),
        })
    };

    let (prefix, local) = match name.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, name),
    };
    if local.is_empty() || local.contains(|c: char| c.is_whitespace() || c == '@') {
        return Err(syntax("invalid name"));
    }

    let uri = match prefix {
        Some(p) => Some(
            ctx.resolve_required(p)
                .map_err(|e: UnboundPrefixError| Error::UnboundPrefix(e))?
                .to_string(),
        ),
        None => None,
    };
    Ok(QName {
        uri,
        local: local.to_string(),
    })
}

/// The splitter's restricted path: rooted, child-axis only, no selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    pub steps: Vec<QName>,
    source: String,
}

impl ElementPath {
    /// Parse a split path such as `/news:Newsletter/News`.
    pub fn parse(expr: &str, ctx: &NamespaceContext) -> Result<Self, Error> {
        let path = PathExpr::parse(expr, ctx)?;
        let syntax = |reason: &str| {
            Error::Eval(EvalError::Syntax {
                expr: expr.to_string(),
                reason: reason.to_string(),
            })
        };

        if path.selector.is_some() {
            return Err(syntax("split path cannot carry a selector"));
        }
        let mut steps = Vec::with_capacity(path.steps.len());
        for step in path.steps {
            if step.axis != Axis::Child {
                return Err(syntax("split path allows the child axis only"));
            }
            steps.push(step.name);
        }

        Ok(ElementPath {
            steps,
            source: expr.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Depth of the matched element (root = 1).
    pub fn depth(&self) -> usize {
        self.steps.len()
    }
}
