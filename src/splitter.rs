//! Streaming XML splitting.
//!
//! One forward scan over the tokenizer events; matched elements are emitted
//! as verbatim byte ranges of the source document, so splitting never
//! re-serializes. Memory stays proportional to element depth, not document
//! size.

use crate::core::attributes::{parse_tag_attributes, split_name};
use crate::core::tokenizer::{TokenKind, Tokenizer};
use crate::error::TokenizeError;
use crate::message::Document;
use crate::namespace::NamespaceScope;
use crate::path::ElementPath;
use std::collections::VecDeque;

/// How matched fragments are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// The matched element's bytes, exactly as they appear in the source.
    Plain,
    /// The matched element re-wrapped in its ancestors' original start tags,
    /// so namespace declarations (and inherited attributes) the fragment
    /// depends on stay in scope and the result is a standalone document.
    Wrap,
}

/// Splits a document into one sub-document per element matching a rooted
/// path.
#[derive(Debug, Clone)]
pub struct Splitter {
    path: ElementPath,
    mode: SplitMode,
    nested_matches: bool,
}

impl Splitter {
    pub fn new(path: ElementPath, mode: SplitMode) -> Self {
        Splitter {
            path,
            mode,
            nested_matches: false,
        }
    }

    /// Allow a new match to open while a matched span is still capturing.
    ///
    /// Rooted fixed-depth paths cannot match inside their own match, so the
    /// default (off) and this switch currently behave identically; it is the
    /// hook a descendant-axis split path would need.
    pub fn nested_matches(mut self, enabled: bool) -> Self {
        self.nested_matches = enabled;
        self
    }

    pub fn path(&self) -> &ElementPath {
        &self.path
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Lazily split `doc`. Each call rescans from the start; identical input
    /// yields an identical sequence.
    pub fn split<'a>(&'a self, doc: &'a [u8]) -> SplitIter<'a> {
        SplitIter {
            splitter: self,
            input: doc,
            tokenizer: Tokenizer::new(doc),
            scope: NamespaceScope::new(),
            stack: Vec::new(),
            open: Vec::new(),
            deferred: Vec::new(),
            ready: VecDeque::new(),
            done: false,
        }
    }
}

/// One open element on the scan stack.
struct Frame {
    uri: Option<Vec<u8>>,
    local: Vec<u8>,
    raw_name: Vec<u8>,
    tag_span: (usize, usize),
}

/// A matched element whose end tag has not been seen yet.
struct Capture {
    start: usize,
    /// Stack depth of the matched element, root = 1.
    depth: usize,
    /// Ancestor start tags, root first: raw tag span plus qualified name.
    ancestors: Vec<((usize, usize), Vec<u8>)>,
}

/// Lazy iterator over split fragments.
///
/// Fused after the first error; fragments yielded before the error stand.
pub struct SplitIter<'a> {
    splitter: &'a Splitter,
    input: &'a [u8],
    tokenizer: Tokenizer<'a>,
    scope: NamespaceScope,
    stack: Vec<Frame>,
    open: Vec<Capture>,
    /// Fragments finished while an enclosing capture was still open, keyed
    /// by start offset so document order survives.
    deferred: Vec<(usize, Document)>,
    ready: VecDeque<Document>,
    done: bool,
}

impl<'a> SplitIter<'a> {
    fn fail(&mut self, err: TokenizeError) -> Option<Result<Document, TokenizeError>> {
        self.done = true;
        Some(Err(err))
    }

    /// Does the current element chain equal the split path?
    fn chain_matches(&self) -> bool {
        let steps = &self.splitter.path.steps;
        self.stack.len() == steps.len()
            && self
                .stack
                .iter()
                .zip(steps)
                .all(|(frame, step)| step.matches(frame.uri.as_deref(), &frame.local))
    }

    fn snapshot_ancestors(&self) -> Vec<((usize, usize), Vec<u8>)> {
        self.stack[..self.stack.len() - 1]
            .iter()
            .map(|frame| (frame.tag_span, frame.raw_name.clone()))
            .collect()
    }

    /// Assemble the emitted fragment for a span of the source.
    fn build(&self, span: (usize, usize), ancestors: &[((usize, usize), Vec<u8>)]) -> Document {
        match self.splitter.mode {
            SplitMode::Plain => Document::new(self.input[span.0..span.1].to_vec()),
            SplitMode::Wrap => {
                let mut out = Vec::with_capacity(span.1 - span.0 + ancestors.len() * 32);
                for ((start, end), _) in ancestors {
                    out.extend_from_slice(&self.input[*start..*end]);
                }
                out.extend_from_slice(&self.input[span.0..span.1]);
                for (_, name) in ancestors.iter().rev() {
                    out.extend_from_slice(b"</");
                    out.extend_from_slice(name);
                    out.push(b'>');
                }
                Document::new(out)
            }
        }
    }

    /// Queue a finished fragment, deferring it while an outer capture is
    /// still open so emission stays in document order.
    fn emit(&mut self, start: usize, doc: Document) {
        if self.open.is_empty() {
            self.ready.push_back(doc);
            self.deferred.sort_by_key(|(offset, _)| *offset);
            for (_, deferred) in self.deferred.drain(..) {
                self.ready.push_back(deferred);
            }
        } else {
            self.deferred.push((start, doc));
        }
    }

    fn enter_element(&mut self, span: (usize, usize), name: &[u8]) -> Result<(), TokenizeError> {
        let raw = self.tokenizer.raw(span);
        let attrs = parse_tag_attributes(raw, span.0)?;

        self.scope.push_scope();
        for attr in &attrs {
            if let Some(prefix) = attr.xmlns_declaration() {
                self.scope.declare(prefix, attr.value.as_ref());
            }
        }

        let (prefix, local) = split_name(name);
        let uri = match prefix {
            Some(p) => Some(
                self.scope
                    .resolve(Some(p))
                    .ok_or_else(|| TokenizeError::new(span.0, "undeclared namespace prefix"))?
                    .to_vec(),
            ),
            None => self.scope.resolve(None).map(<[u8]>::to_vec),
        };
        self.stack.push(Frame {
            uri,
            local: local.to_vec(),
            raw_name: name.to_vec(),
            tag_span: span,
        });
        Ok(())
    }

    fn leave_element(&mut self) {
        self.stack.pop();
        self.scope.pop_scope();
    }
}

impl Iterator for SplitIter<'_> {
    type Item = Result<Document, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.ready.pop_front() {
                return Some(Ok(doc));
            }
            if self.done {
                return None;
            }

            let token = match self.tokenizer.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => {
                    self.done = true;
                    if !self.stack.is_empty() {
                        return Some(Err(TokenizeError::new(
                            self.input.len(),
                            "unclosed element at end of input",
                        )));
                    }
                    return None;
                }
                Err(err) => return self.fail(err),
            };

            match token.kind {
                TokenKind::StartTag | TokenKind::EmptyTag => {
                    let Some(name) = token.name else {
                        return self.fail(TokenizeError::new(token.span.0, "missing element name"));
                    };
                    if let Err(err) = self.enter_element(token.span, name) {
                        return self.fail(err);
                    }

                    let may_match = self.open.is_empty() || self.splitter.nested_matches;
                    if may_match && self.chain_matches() {
                        if token.kind == TokenKind::EmptyTag {
                            let ancestors = self.snapshot_ancestors();
                            let doc = self.build(token.span, &ancestors);
                            self.emit(token.span.0, doc);
                        } else {
                            self.open.push(Capture {
                                start: token.span.0,
                                depth: self.stack.len(),
                                ancestors: self.snapshot_ancestors(),
                            });
                        }
                    }

                    if token.kind == TokenKind::EmptyTag {
                        self.leave_element();
                    }
                }

                TokenKind::EndTag => {
                    let Some(name) = token.name else {
                        return self.fail(TokenizeError::new(token.span.0, "missing element name"));
                    };
                    match self.stack.last() {
                        Some(frame) if frame.raw_name == name => {}
                        _ => {
                            return self
                                .fail(TokenizeError::new(token.span.0, "mismatched end tag"))
                        }
                    }

                    let closes_span = self
                        .open
                        .last()
                        .is_some_and(|capture| capture.depth == self.stack.len());
                    if closes_span {
                        if let Some(capture) = self.open.pop() {
                            let doc =
                                self.build((capture.start, token.span.1), &capture.ancestors);
                            self.emit(capture.start, doc);
                        }
                    }
                    self.leave_element();
                }

                TokenKind::Text
                | TokenKind::CData
                | TokenKind::Comment
                | TokenKind::Pi
                | TokenKind::XmlDecl
                | TokenKind::DocType => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceContext;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<news:Newsletter xmlns:news="http://example.com/newsfeed" date="2014.12.09 14:15">
  <News date="2014.12.01" author="Jan"><Title>First</Title></News>
  <News date="2014.12.09" author="Ines"><Title>Second</Title></News>
</news:Newsletter>"#;

    fn splitter(mode: SplitMode) -> Splitter {
        let ctx = NamespaceContext::single("news", "http://example.com/newsfeed");
        let path = ElementPath::parse("/news:Newsletter/News", &ctx).unwrap();
        Splitter::new(path, mode)
    }

    fn collect(splitter: &Splitter, doc: &str) -> Vec<String> {
        splitter
            .split(doc.as_bytes())
            .map(|item| item.unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_plain_mode_emits_raw_fragments() {
        let parts = collect(&splitter(SplitMode::Plain), FEED);
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            r#"<News date="2014.12.01" author="Jan"><Title>First</Title></News>"#
        );
        assert!(parts[1].contains(r#"author="Ines""#));
    }

    #[test]
    fn test_wrap_mode_reattaches_ancestors() {
        let parts = collect(&splitter(SplitMode::Wrap), FEED);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with(
            r#"<news:Newsletter xmlns:news="http://example.com/newsfeed" date="2014.12.09 14:15">"#
        ));
        assert!(parts[0].ends_with("</news:Newsletter>"));
        assert!(parts[0].contains(r#"<News date="2014.12.01" author="Jan">"#));
    }

    #[test]
    fn test_wrap_mode_fragment_is_independently_queryable() {
        let ctx = NamespaceContext::single("news", "http://example.com/newsfeed");
        let parts = collect(&splitter(SplitMode::Wrap), FEED);

        let date = crate::path::PathExpr::parse("/news:Newsletter/News/@date", &ctx).unwrap();
        assert_eq!(
            crate::extract::evaluate(parts[1].as_bytes(), &date).unwrap(),
            "2014.12.09"
        );
    }

    #[test]
    fn test_empty_element_match() {
        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed"><News author="Jan"/></news:Newsletter>"#;
        let parts = collect(&splitter(SplitMode::Plain), doc);
        assert_eq!(parts, vec![r#"<News author="Jan"/>"#.to_string()]);
    }

    #[test]
    fn test_no_match_yields_empty_sequence() {
        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed"><Other/></news:Newsletter>"#;
        assert!(collect(&splitter(SplitMode::Plain), doc).is_empty());
    }

    #[test]
    fn test_same_named_nested_elements_stay_inside_the_span() {
        // A nested News sits at depth 3, so it cannot re-match the
        // depth-2 path; it must come out inside its parent's fragment.
        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed"><News a="1"><News a="2"/></News></news:Newsletter>"#;
        let parts = collect(&splitter(SplitMode::Plain), doc);
        assert_eq!(parts, vec![r#"<News a="1"><News a="2"/></News>"#.to_string()]);
    }

    #[test]
    fn test_restartable() {
        let s = splitter(SplitMode::Plain);
        assert_eq!(collect(&s, FEED), collect(&s, FEED));
    }

    #[test]
    fn test_malformed_input_fuses_after_error() {
        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed"><News a="1"/><News"#;
        let s = splitter(SplitMode::Plain);
        let mut iter = s.split(doc.as_bytes());

        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_unclosed_root_is_an_error() {
        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed">"#;
        let s = splitter(SplitMode::Plain);
        let mut iter = s.split(doc.as_bytes());
        assert!(iter.next().unwrap().is_err());
    }

    #[test]
    fn test_namespace_mismatch_does_not_match() {
        let ctx = NamespaceContext::single("news", "http://example.com/other");
        let path = ElementPath::parse("/news:Newsletter/News", &ctx).unwrap();
        let s = Splitter::new(path, SplitMode::Plain);
        assert!(s.split(FEED.as_bytes()).all(|r| r.is_ok()));
        assert_eq!(s.split(FEED.as_bytes()).count(), 0);
    }
}
