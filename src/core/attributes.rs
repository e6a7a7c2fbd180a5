//! Attribute parsing from raw tag content.

use super::entities::decode;
use super::scanner::{is_name_char, is_name_start_char};
use crate::error::TokenizeError;
use memchr::memchr;
use std::borrow::Cow;

/// A parsed attribute.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Full name as written, prefix included.
    pub name: &'a [u8],
    /// Prefix before the colon, if any.
    pub prefix: Option<&'a [u8]>,
    /// Local name after the colon.
    pub local_name: &'a [u8],
    /// Value with entities decoded.
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    fn new(name: &'a [u8], value: Cow<'a, [u8]>) -> Self {
        let (prefix, local_name) = split_name(name);
        Attribute {
            name,
            prefix,
            local_name,
            value,
        }
    }

    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name).ok()
    }

    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value.as_ref()).ok()
    }

    /// The prefix this attribute binds if it is a namespace declaration:
    /// `Some(Some(p))` for `xmlns:p`, `Some(None)` for `xmlns`, else None.
    pub fn xmlns_declaration(&self) -> Option<Option<&'a [u8]>> {
        if self.prefix == Some(b"xmlns") {
            Some(Some(self.local_name))
        } else if self.name == b"xmlns" {
            Some(None)
        } else {
            None
        }
    }
}

/// Split a name into prefix and local part at the colon.
pub fn split_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr(b':', name) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// Parse the attributes of a serialized tag (`<name ...>` or `<name .../>`).
///
/// `base` is the tag's absolute byte offset, used for error positions.
pub fn parse_tag_attributes(tag: &[u8], base: usize) -> Result<Vec<Attribute<'_>>, TokenizeError> {
    // Skip '<' and the element name.
    let mut pos = 1;
    while pos < tag.len() && is_name_char(tag[pos]) {
        pos += 1;
    }

    let mut end = tag.len();
    if tag.ends_with(b"/>") {
        end -= 2;
    } else if tag.ends_with(b">") {
        end -= 1;
    }

    parse_attributes(&tag[pos.min(end)..end], base + pos.min(end))
}

/// Parse a run of `name="value"` pairs.
pub fn parse_attributes(input: &[u8], base: usize) -> Result<Vec<Attribute<'_>>, TokenizeError> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        while pos < input.len() && input[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }

        let name_start = pos;
        if !is_name_start_char(input[pos]) {
            return Err(TokenizeError::new(base + pos, "invalid attribute name"));
        }
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && input[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= input.len() || input[pos] != b'=' {
            return Err(TokenizeError::new(base + pos, "attribute value required"));
        }
        pos += 1;
        while pos < input.len() && input[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let quote = match input.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err(TokenizeError::new(base + pos, "attribute value must be quoted")),
        };
        pos += 1;
        let value_start = pos;

        let rel = memchr(quote, &input[pos..])
            .ok_or_else(|| TokenizeError::new(base + value_start, "unterminated attribute value"))?;
        pos += rel;

        if memchr(b'<', &input[value_start..pos]).is_some() {
            return Err(TokenizeError::new(
                base + value_start,
                "'<' not allowed in attribute value",
            ));
        }

        let value = decode(&input[value_start..pos], base + value_start)?;
        attrs.push(Attribute::new(name, value));
        pos += 1; // closing quote
    }

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_attributes() {
        let attrs = parse_attributes(b" date=\"2014.12.09\" author='Jan'", 0).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name_str(), Some("date"));
        assert_eq!(attrs[0].value_str(), Some("2014.12.09"));
        assert_eq!(attrs[1].value_str(), Some("Jan"));
    }

    #[test]
    fn test_from_tag() {
        let attrs = parse_tag_attributes(b"<News author=\"Jan\"/>", 0).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name_str(), Some("author"));
    }

    #[test]
    fn test_xmlns_declarations() {
        let attrs =
            parse_attributes(b" xmlns:news=\"http://x/\" xmlns=\"http://y/\" id=\"1\"", 0).unwrap();
        assert_eq!(attrs[0].xmlns_declaration(), Some(Some(b"news" as &[u8])));
        assert_eq!(attrs[1].xmlns_declaration(), Some(None));
        assert_eq!(attrs[2].xmlns_declaration(), None);
    }

    #[test]
    fn test_entity_in_value() {
        let attrs = parse_attributes(b" title=\"a &lt; b\"", 0).unwrap();
        assert_eq!(attrs[0].value_str(), Some("a < b"));
    }

    #[test]
    fn test_unquoted_value_fails() {
        assert!(parse_attributes(b" id=3", 0).is_err());
    }

    #[test]
    fn test_unterminated_value_fails() {
        let err = parse_attributes(b" id=\"3", 100).unwrap_err();
        assert_eq!(err.pos, 105);
    }
}
