//! xmlsplit - Streaming XML splitting with schema validation and header
//! extraction
//!
//! Stages:
//! - validator: fail-fast structural schema check
//! - splitter: one sub-document per element matching a rooted path
//!   (Plain or Wrap emission)
//! - extract: header values via a restricted XPath subset
//! - router/pipeline: success delivery with per-message exception routing
//!
//! Everything scans forward over byte slices; nothing builds a tree.

mod core;
mod error;
mod extract;
mod message;
mod namespace;
mod path;
mod pipeline;
mod router;
mod sink;
mod splitter;
mod validator;

pub use crate::core::tokenizer::{Token, TokenKind, Tokenizer};
pub use error::{
    Error, ErrorKind, EvalError, SetupError, TokenizeError, UnboundPrefixError, ValidationError,
};
pub use extract::{evaluate, Extractor};
pub use message::{Document, Message};
pub use namespace::{NamespaceContext, NamespaceContextBuilder, NamespaceScope};
pub use path::{Axis, ElementPath, PathExpr, QName, Selector};
pub use pipeline::{Observer, Pipeline, PipelineBuilder, ProcessOutcome};
pub use router::ExceptionRouter;
pub use sink::{CollectingSink, MessageSink};
pub use splitter::{SplitIter, SplitMode, Splitter};
pub use validator::{validate, ChildRule, Schema, SchemaBuilder};
