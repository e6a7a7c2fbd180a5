//! Error taxonomy.
//!
//! Two families: per-message errors that a pipeline can divert to an
//! exception sink ([`Error`], classified by [`ErrorKind`]), and setup
//! errors raised while wiring the pipeline itself ([`SetupError`]). Only
//! malformed or schema-rejected input is routable; everything else points
//! at caller configuration and fails the call instead.

use thiserror::Error;

/// A document rejected by schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document rejected by schema '{schema}': {reason}")]
pub struct ValidationError {
    pub schema: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError {
            schema: schema.into(),
            reason: reason.into(),
        }
    }
}

/// Input that is not well-formed XML. `pos` is the byte offset of the
/// offending construct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not well-formed XML at byte {pos}: {reason}")]
pub struct TokenizeError {
    pub pos: usize,
    pub reason: String,
}

impl TokenizeError {
    pub fn new(pos: usize, reason: impl Into<String>) -> Self {
        TokenizeError {
            pos,
            reason: reason.into(),
        }
    }
}

/// A path expression that failed to compile or evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The evaluated document is not well-formed.
    #[error(transparent)]
    NotXml(#[from] TokenizeError),
    /// The expression matched nothing. Recoverable: callers typically leave
    /// the corresponding header absent.
    #[error("no match for path expression '{0}'")]
    NoMatch(String),
    /// The expression text is outside the supported grammar.
    #[error("invalid path expression '{expr}': {reason}")]
    Syntax { expr: String, reason: String },
}

/// A qualified name whose prefix has no binding in the caller-supplied
/// namespace context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("namespace prefix '{0}' is not bound")]
pub struct UnboundPrefixError(pub String);

/// Any per-message pipeline error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    UnboundPrefix(#[from] UnboundPrefixError),
}

impl From<TokenizeError> for Error {
    fn from(err: TokenizeError) -> Self {
        Error::Eval(EvalError::NotXml(err))
    }
}

impl Error {
    /// Classification used by the exception router.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Eval(EvalError::NotXml(_)) => ErrorKind::NotXml,
            Error::Eval(EvalError::NoMatch(_)) => ErrorKind::NoMatch,
            Error::Eval(EvalError::Syntax { .. }) => ErrorKind::Syntax,
            Error::UnboundPrefix(_) => ErrorKind::UnboundPrefix,
        }
    }
}

/// Discriminant of [`Error`], usable as a routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotXml,
    NoMatch,
    Syntax,
    UnboundPrefix,
}

impl ErrorKind {
    /// Whether a message failing with this kind may be diverted to an
    /// exception sink. Bad input is routable; bad configuration is not.
    pub fn is_routable(self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::NotXml)
    }
}

/// Errors raised while building a pipeline or router, before any message
/// flows.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Attempt to register an exception sink for a kind the pipeline never
    /// routes.
    #[error("error kind {0:?} is not routable")]
    NotRoutable(ErrorKind),
    #[error(transparent)]
    UnboundPrefix(#[from] UnboundPrefixError),
    /// A configured path expression failed to compile.
    #[error("invalid pipeline configuration: {0}")]
    Path(#[from] Error),
    /// A required piece of pipeline configuration was never supplied.
    #[error("pipeline configuration incomplete: missing {0}")]
    Incomplete(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routable_kinds() {
        assert!(ErrorKind::Validation.is_routable());
        assert!(ErrorKind::NotXml.is_routable());
        assert!(!ErrorKind::NoMatch.is_routable());
        assert!(!ErrorKind::Syntax.is_routable());
        assert!(!ErrorKind::UnboundPrefix.is_routable());
    }

    #[test]
    fn test_kind_dispatch() {
        let err = Error::from(ValidationError::new("newsletter.xsd", "bad root"));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = Error::from(TokenizeError::new(3, "mismatched end tag"));
        assert_eq!(err.kind(), ErrorKind::NotXml);

        let err = Error::Eval(EvalError::NoMatch("/a/b".into()));
        assert_eq!(err.kind(), ErrorKind::NoMatch);

        let err = Error::from(UnboundPrefixError("news".into()));
        assert_eq!(err.kind(), ErrorKind::UnboundPrefix);
    }

    #[test]
    fn test_display_carries_context() {
        let err = ValidationError::new("newsletter.xsd", "unexpected root element 'xml'");
        let text = err.to_string();
        assert!(text.contains("newsletter.xsd"));
        assert!(text.contains("unexpected root element"));

        let err = TokenizeError::new(17, "unterminated attribute value");
        assert!(err.to_string().contains("byte 17"));
    }
}
