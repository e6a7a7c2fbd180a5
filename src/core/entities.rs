//! Entity decoding for text content and attribute values.
//!
//! Covers the five predefined entities and numeric character references.
//! DTD-declared entities are out of scope for this pipeline.

use crate::error::TokenizeError;
use memchr::memchr;
use std::borrow::Cow;

/// Decode entity references in `content`.
///
/// Borrows when no reference is present. A bare '&' or an unknown or
/// malformed reference fails with NotXml; `base` is the absolute offset of
/// `content` in the document, used for error positions.
pub fn decode(content: &[u8], base: usize) -> Result<Cow<'_, [u8]>, TokenizeError> {
    let Some(first) = memchr(b'&', content) else {
        return Ok(Cow::Borrowed(content));
    };

    let mut out = Vec::with_capacity(content.len());
    out.extend_from_slice(&content[..first]);
    let mut pos = first;

    while pos < content.len() {
        if content[pos] != b'&' {
            out.push(content[pos]);
            pos += 1;
            continue;
        }

        let semi = memchr(b';', &content[pos..])
            .map(|i| pos + i)
            .ok_or_else(|| TokenizeError::new(base + pos, "unterminated entity reference"))?;
        let name = &content[pos + 1..semi];

        match name {
            b"lt" => out.push(b'<'),
            b"gt" => out.push(b'>'),
            b"amp" => out.push(b'&'),
            b"quot" => out.push(b'"'),
            b"apos" => out.push(b'\''),
            _ if name.first() == Some(&b'#') => {
                let cp = parse_char_ref(&name[1..])
                    .ok_or_else(|| TokenizeError::new(base + pos, "invalid character reference"))?;
                let ch = char::from_u32(cp)
                    .ok_or_else(|| TokenizeError::new(base + pos, "character reference out of range"))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            _ => {
                return Err(TokenizeError::new(
                    base + pos,
                    "reference to undeclared entity",
                ));
            }
        }
        pos = semi + 1;
    }

    Ok(Cow::Owned(out))
}

/// Parse the digits of a character reference ("#60" or "#x3C", '#' stripped).
fn parse_char_ref(digits: &[u8]) -> Option<u32> {
    let (radix, digits) = match digits.first() {
        Some(b'x') | Some(b'X') => (16, &digits[1..]),
        _ => (10, digits),
    };
    if digits.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(text, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_borrows() {
        let decoded = decode(b"no entities here", 0).unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
    }

    #[test]
    fn test_predefined_entities() {
        let decoded = decode(b"a &lt;b&gt; &amp; &quot;c&quot; &apos;d&apos;", 0).unwrap();
        assert_eq!(decoded.as_ref(), b"a <b> & \"c\" 'd'");
    }

    #[test]
    fn test_char_refs() {
        let decoded = decode(b"&#60;&#x3E;", 0).unwrap();
        assert_eq!(decoded.as_ref(), b"<>");
    }

    #[test]
    fn test_undeclared_entity_fails() {
        let err = decode(b"&nbsp;", 10).unwrap_err();
        assert_eq!(err.pos, 10);
    }

    #[test]
    fn test_unterminated_reference_fails() {
        assert!(decode(b"a &lt b", 0).is_err());
    }
}
