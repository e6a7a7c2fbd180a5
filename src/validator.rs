//! Fail-fast structural validation.
//!
//! A [`Schema`] describes the shape a document must have: the root element's
//! qualified name, attributes the root must carry, and rules for the root's
//! direct children (required attributes, occurrence bounds). Anything deeper
//! is accepted as-is. Full schema-language support is out of scope; the
//! contract is pass/fail with a reason.

use crate::core::attributes::{parse_tag_attributes, split_name, Attribute};
use crate::core::tokenizer::{TokenKind, Tokenizer};
use crate::error::ValidationError;
use crate::namespace::NamespaceScope;
use crate::path::QName;

/// Occurrence and attribute constraints for one direct child of the root.
#[derive(Debug, Clone)]
pub struct ChildRule {
    name: QName,
    required_attributes: Vec<QName>,
    min_occurs: usize,
    max_occurs: Option<usize>,
}

impl ChildRule {
    pub fn new(name: QName) -> Self {
        ChildRule {
            name,
            required_attributes: Vec::new(),
            min_occurs: 0,
            max_occurs: None,
        }
    }

    pub fn require_attribute(mut self, name: QName) -> Self {
        self.required_attributes.push(name);
        self
    }

    pub fn min_occurs(mut self, min: usize) -> Self {
        self.min_occurs = min;
        self
    }

    pub fn max_occurs(mut self, max: usize) -> Self {
        self.max_occurs = Some(max);
        self
    }
}

/// Pre-compiled structural description of an acceptable document.
///
/// Built once, immutable, shareable across pipeline invocations.
#[derive(Debug, Clone)]
pub struct Schema {
    id: String,
    root: QName,
    root_attributes: Vec<QName>,
    children: Vec<ChildRule>,
}

impl Schema {
    pub fn builder(id: impl Into<String>, root: QName) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                id: id.into(),
                root,
                root_attributes: Vec::new(),
                children: Vec::new(),
            },
        }
    }

    /// Identifier carried into validation errors, typically the schema's
    /// file name or URI.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn fail(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::new(&self.id, reason)
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Require an attribute on the root element.
    pub fn root_attribute(mut self, name: QName) -> Self {
        self.schema.root_attributes.push(name);
        self
    }

    /// Constrain a direct child of the root. Once any rule is declared, a
    /// child matching none of the rules fails validation.
    pub fn child(mut self, rule: ChildRule) -> Self {
        self.schema.children.push(rule);
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Validate a document against a schema, stopping at the first violation.
///
/// Malformed XML is a validation failure like any other; the reason names
/// the parse problem.
pub fn validate(doc: &[u8], schema: &Schema) -> Result<(), ValidationError> {
    let mut tokenizer = Tokenizer::new(doc);
    let mut scope = NamespaceScope::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut counts = vec![0usize; schema.children.len()];

    loop {
        let token = match tokenizer.next_token() {
            Ok(Some(token)) => token,
            Ok(None) => break,
            Err(err) => return Err(schema.fail(err.to_string())),
        };

        match token.kind {
            TokenKind::StartTag | TokenKind::EmptyTag => {
                let raw = tokenizer.raw(token.span);
                let attrs = parse_tag_attributes(raw, token.span.0)
                    .map_err(|err| schema.fail(err.to_string()))?;

                scope.push_scope();
                for attr in &attrs {
                    if let Some(prefix) = attr.xmlns_declaration() {
                        scope.declare(prefix, attr.value.as_ref());
                    }
                }

                let name = token
                    .name
                    .ok_or_else(|| schema.fail("element without a name"))?;
                let (uri, local) = resolve(name, &scope)
                    .map_err(|prefix| schema.fail(format!("undeclared prefix '{prefix}'")))?;
                depth += 1;

                if depth == 1 {
                    if seen_root {
                        return Err(schema.fail("content after the document element"));
                    }
                    seen_root = true;
                    if !schema.root.matches(uri.as_deref(), &local) {
                        return Err(schema.fail(format!(
                            "unexpected root element '{}'",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    check_attributes(schema, &schema.root_attributes, &attrs, &scope, "root")?;
                } else if depth == 2 && !schema.children.is_empty() {
                    let rule = schema
                        .children
                        .iter()
                        .position(|rule| rule.name.matches(uri.as_deref(), &local))
                        .ok_or_else(|| {
                            schema.fail(format!(
                                "unexpected element '{}' under the root",
                                String::from_utf8_lossy(name)
                            ))
                        })?;
                    counts[rule] += 1;
                    if let Some(max) = schema.children[rule].max_occurs {
                        if counts[rule] > max {
                            return Err(schema.fail(format!(
                                "element '{}' occurs more than {max} times",
                                schema.children[rule].name.local
                            )));
                        }
                    }
                    check_attributes(
                        schema,
                        &schema.children[rule].required_attributes,
                        &attrs,
                        &scope,
                        &schema.children[rule].name.local,
                    )?;
                }

                if token.kind == TokenKind::EmptyTag {
                    depth -= 1;
                    scope.pop_scope();
                }
            }

            TokenKind::EndTag => {
                if depth == 0 {
                    return Err(schema.fail("end tag without a matching start tag"));
                }
                depth -= 1;
                scope.pop_scope();
            }

            TokenKind::Text
            | TokenKind::CData
            | TokenKind::Comment
            | TokenKind::Pi
            | TokenKind::XmlDecl
            | TokenKind::DocType => {}
        }
    }

    if depth != 0 {
        return Err(schema.fail("unclosed element at end of input"));
    }
    if !seen_root {
        return Err(schema.fail("document has no root element"));
    }
    for (rule, count) in schema.children.iter().zip(&counts) {
        if *count < rule.min_occurs {
            return Err(schema.fail(format!(
                "element '{}' occurs {count} times, expected at least {}",
                rule.name.local, rule.min_occurs
            )));
        }
    }
    Ok(())
}

fn resolve<'a>(
    name: &'a [u8],
    scope: &NamespaceScope,
) -> Result<(Option<Vec<u8>>, Vec<u8>), String> {
    let (prefix, local) = split_name(name);
    let uri = match prefix {
        Some(p) => Some(
            scope
                .resolve(Some(p))
                .ok_or_else(|| String::from_utf8_lossy(p).into_owned())?
                .to_vec(),
        ),
        None => scope.resolve(None).map(<[u8]>::to_vec),
    };
    Ok((uri, local.to_vec()))
}

fn check_attributes(
    schema: &Schema,
    required: &[QName],
    attrs: &[Attribute<'_>],
    scope: &NamespaceScope,
    element: &str,
) -> Result<(), ValidationError> {
    for want in required {
        let found = attrs.iter().any(|attr| {
            if attr.xmlns_declaration().is_some() {
                return false;
            }
            let uri = match attr.prefix {
                Some(p) => match scope.resolve(Some(p)) {
                    Some(uri) => Some(uri.to_vec()),
                    None => return false,
                },
                None => None,
            };
            want.matches(uri.as_deref(), attr.local_name)
        });
        if !found {
            return Err(schema.fail(format!(
                "element '{element}' is missing required attribute '{}'",
                want.local
            )));
        }
    }
    Ok(())
}
