//! Header metadata extraction via rooted path expressions.
//!
//! A narrow, purpose-built evaluator: a single forward scan over the
//! tokenizer events with a live namespace scope, matching the compiled path
//! structurally against the open-element chain. First match in document
//! order wins. No tree is built.

use crate::core::attributes::{parse_tag_attributes, split_name, Attribute};
use crate::core::entities::decode;
use crate::core::tokenizer::{TokenKind, Tokenizer};
use crate::error::{Error, EvalError, TokenizeError};
use crate::namespace::{NamespaceContext, NamespaceScope};
use crate::path::{Axis, PathExpr, QName, Selector};
use lru::LruCache;
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Default capacity of the compiled-expression cache.
const PATH_CACHE_CAPACITY: usize = 128;

/// Evaluate a compiled path against a document, returning the scalar string
/// value of the first match.
pub fn evaluate(doc: &[u8], path: &PathExpr) -> Result<String, EvalError> {
    let mut tokenizer = Tokenizer::new(doc);
    let mut scope = NamespaceScope::new();
    // Resolved (uri, local) of each open element, root first.
    let mut chain: Vec<(Option<Vec<u8>>, Vec<u8>)> = Vec::new();
    // Set while collecting the text value of a matched element: the chain
    // depth to unwind to, plus the accumulated text.
    let mut collecting: Option<(usize, Vec<u8>)> = None;

    while let Some(token) = tokenizer.next_token()? {
        match token.kind {
            TokenKind::StartTag | TokenKind::EmptyTag => {
                let raw = tokenizer.raw(token.span);
                let attrs = parse_tag_attributes(raw, token.span.0)?;

                scope.push_scope();
                for attr in &attrs {
                    if let Some(prefix) = attr.xmlns_declaration() {
                        scope.declare(prefix, attr.value.as_ref());
                    }
                }

                let name = token
                    .name
                    .ok_or_else(|| TokenizeError::new(token.span.0, "missing element name"))?;
                let resolved = resolve_element(name, &scope, token.span.0)?;
                chain.push(resolved);

                if collecting.is_none() && path_matches(&chain, &path.steps) {
                    match &path.selector {
                        Some(Selector::Attribute(want)) => {
                            if let Some(value) =
                                find_attribute(&attrs, want, &scope, token.span.0)?
                            {
                                return Ok(value);
                            }
                            // Element matched but lacks the attribute: later
                            // matches may still carry it.
                        }
                        Some(Selector::Text) | None => {
                            if token.kind == TokenKind::EmptyTag {
                                return Ok(String::new());
                            }
                            collecting = Some((chain.len(), Vec::new()));
                        }
                    }
                }

                if token.kind == TokenKind::EmptyTag {
                    chain.pop();
                    scope.pop_scope();
                }
            }

            TokenKind::EndTag => {
                let name = token
                    .name
                    .ok_or_else(|| TokenizeError::new(token.span.0, "missing element name"))?;
                let (_, local) = split_name(name);
                match chain.pop() {
                    Some((_, open_local)) if open_local == local => {}
                    _ => {
                        return Err(EvalError::NotXml(TokenizeError::new(
                            token.span.0,
                            "mismatched end tag",
                        )))
                    }
                }

                if let Some((depth, text)) = collecting.take() {
                    if chain.len() < depth {
                        return string_value(text);
                    }
                    collecting = Some((depth, text));
                }
                scope.pop_scope();
            }

            TokenKind::Text => {
                if let Some((_, text)) = collecting.as_mut() {
                    let raw = tokenizer.raw(token.span);
                    text.extend_from_slice(decode(raw, token.span.0)?.as_ref());
                }
            }

            TokenKind::CData => {
                if let Some((_, text)) = collecting.as_mut() {
                    // Strip the <![CDATA[ ... ]]> framing.
                    let raw = tokenizer.raw(token.span);
                    text.extend_from_slice(&raw[9..raw.len() - 3]);
                }
            }

            TokenKind::Comment | TokenKind::Pi | TokenKind::XmlDecl | TokenKind::DocType => {}
        }
    }

    if !chain.is_empty() {
        return Err(EvalError::NotXml(TokenizeError::new(
            doc.len(),
            "unclosed element at end of input",
        )));
    }
    Err(EvalError::NoMatch(path.source().to_string()))
}

fn string_value(bytes: Vec<u8>) -> Result<String, EvalError> {
    String::from_utf8(bytes)
        .map_err(|_| EvalError::NotXml(TokenizeError::new(0, "text content is not valid UTF-8")))
}

/// Resolve an element name against the in-scope declarations.
fn resolve_element(
    name: &[u8],
    scope: &NamespaceScope,
    pos: usize,
) -> Result<(Option<Vec<u8>>, Vec<u8>), TokenizeError> {
    let (prefix, local) = split_name(name);
    let uri = match prefix {
        Some(p) => Some(
            scope
                .resolve(Some(p))
                .ok_or_else(|| TokenizeError::new(pos, "undeclared namespace prefix"))?
                .to_vec(),
        ),
        // Unprefixed elements pick up the default namespace.
        None => scope.resolve(None).map(<[u8]>::to_vec),
    };
    Ok((uri, local.to_vec()))
}

/// Find an attribute on a start tag matching the wanted qualified name.
///
/// Unprefixed attributes are in no namespace; they never inherit the default
/// declaration.
fn find_attribute(
    attrs: &[Attribute<'_>],
    want: &QName,
    scope: &NamespaceScope,
    pos: usize,
) -> Result<Option<String>, EvalError> {
    for attr in attrs {
        if attr.xmlns_declaration().is_some() {
            continue;
        }
        let uri = match attr.prefix {
            Some(p) => Some(
                scope
                    .resolve(Some(p))
                    .ok_or_else(|| TokenizeError::new(pos, "undeclared namespace prefix"))?
                    .to_vec(),
            ),
            None => None,
        };
        if want.matches(uri.as_deref(), attr.local_name) {
            return Ok(Some(string_value(attr.value.to_vec())?));
        }
    }
    Ok(None)
}

/// Structural match of the open-element chain against the path steps.
///
/// Child steps consume exactly the next chain entry; descendant steps may
/// skip any number of intermediate ancestors.
fn path_matches(chain: &[(Option<Vec<u8>>, Vec<u8>)], steps: &[crate::path::PathStep]) -> bool {
    let Some(step) = steps.first() else {
        return chain.is_empty();
    };
    match step.axis {
        Axis::Child => match chain.first() {
            Some((uri, local)) if step.name.matches(uri.as_deref(), local) => {
                path_matches(&chain[1..], &steps[1..])
            }
            _ => false,
        },
        Axis::Descendant => (0..chain.len()).any(|i| {
            let (uri, local) = &chain[i];
            step.name.matches(uri.as_deref(), local) && path_matches(&chain[i + 1..], &steps[1..])
        }),
    }
}

/// Path extractor with a compiled-expression cache.
///
/// Compiling a path resolves prefixes and allocates; callers evaluating the
/// same expressions per message go through the LRU instead.
pub struct Extractor {
    ctx: Arc<NamespaceContext>,
    cache: Mutex<LruCache<String, Arc<PathExpr>>>,
}

impl Extractor {
    pub fn new(ctx: Arc<NamespaceContext>) -> Self {
        let capacity = NonZeroUsize::new(PATH_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Extractor {
            ctx,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn context(&self) -> &NamespaceContext {
        &self.ctx
    }

    /// Compile a path expression, hitting the cache when possible.
    pub fn compile(&self, expr: &str) -> Result<Arc<PathExpr>, Error> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(path) = cache.get(expr) {
                return Ok(Arc::clone(path));
            }
        }
        let path = Arc::new(PathExpr::parse(expr, &self.ctx)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(expr.to_string(), Arc::clone(&path));
        }
        Ok(path)
    }

    /// Compile (or fetch) and evaluate in one call.
    pub fn evaluate(&self, doc: &[u8], expr: &str) -> Result<String, Error> {
        let path = self.compile(expr)?;
        evaluate(doc, &path).map_err(Error::from)
    }

    /// Evaluate several compiled paths against one document in parallel.
    ///
    /// Results come back in input order.
    pub fn evaluate_many(
        &self,
        doc: &[u8],
        paths: &[Arc<PathExpr>],
    ) -> Vec<Result<String, EvalError>> {
        paths.par_iter().map(|path| evaluate(doc, path)).collect()
    }
}
