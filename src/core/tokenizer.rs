//! Pull tokenizer for XML markup.
//!
//! Produces a flat stream of tokens with byte spans into the original input.
//! Unlike a tree parser nothing is materialized: consumers that need the
//! serialized form of a region slice it straight out of the document.
//!
//! Malformed markup fails with `TokenizeError` carrying the byte position;
//! the scan cannot continue past an error.

use super::scanner::Scanner;
use crate::error::TokenizeError;

/// Kind of markup token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<name ...>`
    StartTag,
    /// `</name>`
    EndTag,
    /// `<name .../>`
    EmptyTag,
    /// Character data between tags
    Text,
    /// `<![CDATA[...]]>`
    CData,
    /// `<!--...-->`
    Comment,
    /// `<?target ...?>`
    Pi,
    /// `<?xml ...?>`
    XmlDecl,
    /// `<!DOCTYPE ...>`
    DocType,
}

/// One token with its raw span in the input.
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Byte offsets (start, end) of the token's serialized form.
    pub span: (usize, usize),
    /// Element name or PI target, where applicable.
    pub name: Option<&'a [u8]>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
        }
    }

    fn with_name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(name);
        self
    }
}

/// Pull tokenizer over a byte slice.
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            done: false,
        }
    }

    /// Raw slice of the input for a token span.
    pub fn raw(&self, span: (usize, usize)) -> &'a [u8] {
        self.scanner.slice(span.0, span.1)
    }

    /// Next token, None at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, TokenizeError> {
        if self.done {
            return Ok(None);
        }
        if self.scanner.is_eof() {
            self.done = true;
            return Ok(None);
        }

        match self.scanner.peek() {
            Some(b'<') => self.scan_markup().map(Some),
            Some(_) => self.scan_text().map(Some),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    fn fail(&mut self, pos: usize, reason: &str) -> TokenizeError {
        self.done = true;
        TokenizeError::new(pos, reason)
    }

    fn scan_markup(&mut self) -> Result<Token<'a>, TokenizeError> {
        let start = self.scanner.position();
        self.scanner.advance(1); // '<'

        match self.scanner.peek() {
            Some(b'/') => self.scan_end_tag(start),
            Some(b'!') => self.scan_bang(start),
            Some(b'?') => self.scan_pi(start),
            Some(_) => self.scan_start_tag(start),
            None => Err(self.fail(start, "'<' at end of input")),
        }
    }

    fn scan_start_tag(&mut self, start: usize) -> Result<Token<'a>, TokenizeError> {
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => return Err(self.fail(start, "invalid element name")),
        };

        let end = match self.scanner.find_tag_end_quoted() {
            Some(end) => end,
            None => return Err(self.fail(start, "unterminated start tag")),
        };

        let is_empty = end > start && self.scanner.slice(end - 1, end) == b"/";
        self.scanner.set_position(end + 1);

        let kind = if is_empty {
            TokenKind::EmptyTag
        } else {
            TokenKind::StartTag
        };
        Ok(Token::new(kind, (start, end + 1)).with_name(name))
    }

    fn scan_end_tag(&mut self, start: usize) -> Result<Token<'a>, TokenizeError> {
        self.scanner.advance(1); // '/'

        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => return Err(self.fail(start, "invalid name in end tag")),
        };

        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'>') {
            return Err(self.fail(start, "end tag not closed with '>'"));
        }
        self.scanner.advance(1);

        Ok(Token::new(TokenKind::EndTag, (start, self.scanner.position())).with_name(name))
    }

    fn scan_bang(&mut self, start: usize) -> Result<Token<'a>, TokenizeError> {
        self.scanner.advance(1); // '!'

        if self.scanner.starts_with(b"--") {
            self.scan_delimited(start, 2, b"-->", TokenKind::Comment, "unterminated comment")
        } else if self.scanner.starts_with(b"[CDATA[") {
            self.scan_delimited(start, 7, b"]]>", TokenKind::CData, "unterminated CDATA section")
        } else if self.scanner.starts_with(b"DOCTYPE") {
            self.scan_doctype(start)
        } else {
            Err(self.fail(start, "unrecognized markup declaration"))
        }
    }

    /// Scan a construct that runs to a fixed closing delimiter.
    fn scan_delimited(
        &mut self,
        start: usize,
        skip: usize,
        close: &[u8],
        kind: TokenKind,
        unterminated: &str,
    ) -> Result<Token<'a>, TokenizeError> {
        self.scanner.advance(skip);
        loop {
            let pos = match self.scanner.find_byte(close[0]) {
                Some(pos) => pos,
                None => return Err(self.fail(start, unterminated)),
            };
            self.scanner.set_position(pos);
            if self.scanner.starts_with(close) {
                self.scanner.advance(close.len());
                return Ok(Token::new(kind, (start, self.scanner.position())));
            }
            self.scanner.advance(1);
        }
    }

    fn scan_doctype(&mut self, start: usize) -> Result<Token<'a>, TokenizeError> {
        self.scanner.advance(7); // "DOCTYPE"

        // '>' inside the internal subset or a quoted literal does not close
        // the declaration.
        let mut in_subset = false;
        let mut quote: Option<u8> = None;

        while let Some(b) = self.scanner.peek() {
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"') | (None, b'\'') => quote = Some(b),
                (None, b'[') => in_subset = true,
                (None, b']') => in_subset = false,
                (None, b'>') if !in_subset => {
                    self.scanner.advance(1);
                    return Ok(Token::new(TokenKind::DocType, (start, self.scanner.position())));
                }
                _ => {}
            }
            self.scanner.advance(1);
        }
        Err(self.fail(start, "unterminated DOCTYPE declaration"))
    }

    fn scan_pi(&mut self, start: usize) -> Result<Token<'a>, TokenizeError> {
        self.scanner.advance(1); // '?'

        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => return Err(self.fail(start, "invalid processing instruction target")),
        };

        loop {
            let pos = match self.scanner.find_byte(b'?') {
                Some(pos) => pos,
                None => return Err(self.fail(start, "unterminated processing instruction")),
            };
            self.scanner.set_position(pos);
            if self.scanner.starts_with(b"?>") {
                self.scanner.advance(2);
                let kind = if name == b"xml" {
                    TokenKind::XmlDecl
                } else {
                    TokenKind::Pi
                };
                return Ok(Token::new(kind, (start, self.scanner.position())).with_name(name));
            }
            self.scanner.advance(1);
        }
    }

    fn scan_text(&mut self) -> Result<Token<'a>, TokenizeError> {
        let start = self.scanner.position();
        let end = self
            .scanner
            .find_tag_start()
            .unwrap_or(start + self.scanner.remaining().len());
        self.scanner.set_position(end);
        Ok(Token::new(TokenKind::Text, (start, end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &[u8]) -> Vec<(TokenKind, Vec<u8>)> {
        let mut tokenizer = Tokenizer::new(input);
        let mut out = Vec::new();
        while let Some(token) = tokenizer.next_token().unwrap() {
            out.push((token.kind, tokenizer.raw(token.span).to_vec()));
        }
        out
    }

    #[test]
    fn test_simple_element() {
        let tokens = collect(b"<root>hello</root>");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].0, TokenKind::StartTag);
        assert_eq!(tokens[1].0, TokenKind::Text);
        assert_eq!(tokens[1].1, b"hello");
        assert_eq!(tokens[2].0, TokenKind::EndTag);
    }

    #[test]
    fn test_empty_element_span() {
        let tokens = collect(b"<br/>");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, TokenKind::EmptyTag);
        assert_eq!(tokens[0].1, b"<br/>");
    }

    #[test]
    fn test_prolog_and_doctype() {
        let tokens = collect(b"<?xml version=\"1.0\"?><!DOCTYPE a [<!ENTITY x \">\">]><a/>");
        assert_eq!(tokens[0].0, TokenKind::XmlDecl);
        assert_eq!(tokens[1].0, TokenKind::DocType);
        assert_eq!(tokens[2].0, TokenKind::EmptyTag);
    }

    #[test]
    fn test_cdata_and_comment() {
        let tokens = collect(b"<a><!-- c --><![CDATA[<raw>]]></a>");
        assert_eq!(tokens[1].0, TokenKind::Comment);
        assert_eq!(tokens[2].0, TokenKind::CData);
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let tokens = collect(b"<a title=\"1 > 0\">x</a>");
        assert_eq!(tokens[0].0, TokenKind::StartTag);
        assert_eq!(tokens[0].1, b"<a title=\"1 > 0\">");
    }

    #[test]
    fn test_unterminated_tag_fails() {
        let mut tokenizer = Tokenizer::new(b"<a attr=\"x\"");
        let err = tokenizer.next_token().unwrap_err();
        assert_eq!(err.pos, 0);
        // Errors fuse the tokenizer.
        assert!(tokenizer.next_token().unwrap().is_none());
    }

    #[test]
    fn test_invalid_name_fails() {
        let mut tokenizer = Tokenizer::new(b"<1bad/>");
        assert!(tokenizer.next_token().is_err());
    }
}
