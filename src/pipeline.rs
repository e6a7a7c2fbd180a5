//! Pipeline orchestration: validate, extract, split, deliver.
//!
//! A [`Pipeline`] is wired once from configuration and is stateless across
//! invocations; the schema, namespace context, and compiled paths are
//! read-only and safe to share between threads.

use crate::error::{Error, ErrorKind, SetupError};
use crate::extract::{evaluate, Extractor};
use crate::message::{Document, Message};
use crate::namespace::NamespaceContext;
use crate::path::{ElementPath, PathExpr};
use crate::router::ExceptionRouter;
use crate::sink::MessageSink;
use crate::splitter::{SplitMode, Splitter};
use crate::validator::{validate, Schema};
use std::sync::Arc;
use tracing::{debug, trace};

/// Per-invocation delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Messages handed to the success sink.
    pub delivered: usize,
    /// Messages diverted to an exception sink.
    pub diverted: usize,
}

/// Hook invoked for each split message before delivery.
pub type Observer = Box<dyn Fn(&Message) + Send + Sync>;

/// Header derived from a compiled path expression.
struct HeaderRule {
    name: String,
    path: Arc<PathExpr>,
}

/// Builder for [`Pipeline`]. Split path and success sink are required;
/// everything else is optional.
pub struct PipelineBuilder {
    ctx: Arc<NamespaceContext>,
    schema: Option<Schema>,
    split: Option<(String, SplitMode)>,
    parent_headers: Vec<(String, String)>,
    item_headers: Vec<(String, String)>,
    success: Option<Arc<dyn MessageSink>>,
    routes: Vec<(ErrorKind, Arc<dyn MessageSink>)>,
    observer: Option<Observer>,
}

impl PipelineBuilder {
    /// Validate incoming documents before splitting. Without a schema,
    /// documents go straight to the splitter.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// The rooted path selecting the elements to split on, and how the
    /// fragments are emitted.
    pub fn split(mut self, path: impl Into<String>, mode: SplitMode) -> Self {
        self.split = Some((path.into(), mode));
        self
    }

    /// Header extracted from the input document before splitting; every
    /// split message inherits it.
    pub fn parent_header(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.parent_headers.push((name.into(), expr.into()));
        self
    }

    /// Header extracted from each split fragment.
    pub fn item_header(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.item_headers.push((name.into(), expr.into()));
        self
    }

    pub fn success_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.success = Some(sink);
        self
    }

    /// Divert messages failing with `kind` to `sink`. Non-routable kinds
    /// are rejected at `build`.
    pub fn route(mut self, kind: ErrorKind, sink: Arc<dyn MessageSink>) -> Self {
        self.routes.push((kind, sink));
        self
    }

    /// Hook fired for each split message just before delivery.
    pub fn observe(mut self, observer: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Compile the configuration into a ready pipeline.
    pub fn build(self) -> Result<Pipeline, SetupError> {
        let (split_expr, mode) = self.split.ok_or(SetupError::Incomplete("split path"))?;
        let success = self.success.ok_or(SetupError::Incomplete("success sink"))?;

        let split_path = ElementPath::parse(&split_expr, &self.ctx)?;
        let extractor = Extractor::new(Arc::clone(&self.ctx));
        let compile = |headers: Vec<(String, String)>| -> Result<Vec<HeaderRule>, SetupError> {
            headers
                .into_iter()
                .map(|(name, expr)| {
                    Ok(HeaderRule {
                        name,
                        path: extractor.compile(&expr)?,
                    })
                })
                .collect()
        };
        let parent_headers = compile(self.parent_headers)?;
        let item_headers = compile(self.item_headers)?;

        let mut router = ExceptionRouter::new();
        for (kind, sink) in self.routes {
            router.register(kind, sink)?;
        }

        Ok(Pipeline {
            schema: self.schema,
            splitter: Splitter::new(split_path, mode),
            parent_headers,
            item_headers,
            success,
            router,
            observer: self.observer,
        })
    }
}

/// The assembled processing pipeline.
pub struct Pipeline {
    schema: Option<Schema>,
    splitter: Splitter,
    parent_headers: Vec<HeaderRule>,
    item_headers: Vec<HeaderRule>,
    success: Arc<dyn MessageSink>,
    router: ExceptionRouter,
    observer: Option<Observer>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder(ctx: NamespaceContext) -> PipelineBuilder {
        PipelineBuilder {
            ctx: Arc::new(ctx),
            schema: None,
            split: None,
            parent_headers: Vec::new(),
            item_headers: Vec::new(),
            success: None,
            routes: Vec::new(),
            observer: None,
        }
    }

    /// Run one document through the pipeline.
    ///
    /// Routable failures with a registered sink divert the failing message
    /// and are absorbed into the outcome; anything else propagates. Messages
    /// delivered before a mid-scan failure stay delivered.
    pub fn process(&self, doc: Document) -> Result<ProcessOutcome, Error> {
        let mut outcome = ProcessOutcome::default();

        if let Some(schema) = &self.schema {
            if let Err(err) = validate(doc.as_bytes(), schema) {
                debug!(schema = schema.id(), %err, "document rejected");
                self.divert(Error::from(err), Message::new(doc), &mut outcome)?;
                return Ok(outcome);
            }
            debug!(schema = schema.id(), "document accepted");
        }

        let mut parent = Message::new(doc.clone());
        for rule in &self.parent_headers {
            match evaluate(doc.as_bytes(), &rule.path) {
                Ok(value) => parent.set_header(&rule.name, value),
                Err(err) => {
                    if let Some(remaining) =
                        self.absorb(err.into(), &parent, &mut outcome)?
                    {
                        // Malformed input: the whole message diverted.
                        return Ok(remaining);
                    }
                }
            }
        }

        for item in self.splitter.split(doc.as_bytes()) {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(err) => {
                    // Already-emitted messages stand; the input message
                    // itself diverts.
                    self.divert(Error::from(err), parent.clone(), &mut outcome)?;
                    return Ok(outcome);
                }
            };

            let mut message = parent.child(fragment);
            let mut diverted = false;
            for rule in &self.item_headers {
                match evaluate(message.body.as_bytes(), &rule.path) {
                    Ok(value) => message.set_header(&rule.name, value),
                    Err(err) => {
                        if self.absorb(err.into(), &message, &mut outcome)?.is_some() {
                            diverted = true;
                            break;
                        }
                    }
                }
            }
            if diverted {
                continue;
            }

            if let Some(observer) = &self.observer {
                observer(&message);
            }
            trace!(bytes = message.body.len(), "fragment delivered");
            self.success.deliver(message);
            outcome.delivered += 1;
        }

        Ok(outcome)
    }

    /// Handle an extraction failure: NoMatch leaves the header absent,
    /// routable errors divert the message, the rest propagate. Returns the
    /// outcome when the message was diverted.
    fn absorb(
        &self,
        err: Error,
        message: &Message,
        outcome: &mut ProcessOutcome,
    ) -> Result<Option<ProcessOutcome>, Error> {
        if err.kind() == ErrorKind::NoMatch {
            trace!(%err, "header left absent");
            return Ok(None);
        }
        self.divert(err, message.clone(), outcome)?;
        Ok(Some(*outcome))
    }

    /// Send a failing message to its exception sink, or propagate the error
    /// when none is registered.
    fn divert(
        &self,
        err: Error,
        mut message: Message,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), Error> {
        match self.router.route(&err) {
            Some(sink) => {
                debug!(kind = ?err.kind(), %err, "message diverted");
                message.set_header("error.message", err.to_string());
                sink.deliver(message);
                outcome.diverted += 1;
                Ok(())
            }
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::QName;
    use crate::sink::CollectingSink;
    use crate::validator::ChildRule;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NS: &str = "http://example.com/newsfeed";

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<news:Newsletter xmlns:news="http://example.com/newsfeed" date="2014.12.09 14:15">
  <News date="2014.12.01" author="Jan"><Title>First</Title></News>
  <News date="2014.12.09" author="Ines"><Title>Second</Title></News>
</news:Newsletter>"#;

    fn newsletter_schema() -> Schema {
        Schema::builder("newsletter.xsd", QName::new(Some(NS), "Newsletter"))
            .root_attribute(QName::new(None, "date"))
            .child(
                ChildRule::new(QName::new(None, "News"))
                    .require_attribute(QName::new(None, "author")),
            )
            .build()
    }

    struct Fixture {
        pipeline: Pipeline,
        success: Arc<CollectingSink>,
        failure: Arc<CollectingSink>,
    }

    fn newsletter_pipeline() -> Fixture {
        let success = Arc::new(CollectingSink::new());
        let failure = Arc::new(CollectingSink::new());
        let pipeline = Pipeline::builder(NamespaceContext::single("news", NS))
            .schema(newsletter_schema())
            .split("/news:Newsletter/News", SplitMode::Wrap)
            .parent_header("newsfeed.date", "/news:Newsletter/@date")
            .item_header("news.author", "/news:Newsletter/News/@author")
            .success_sink(success.clone())
            .route(ErrorKind::Validation, failure.clone())
            .route(ErrorKind::NotXml, failure.clone())
            .build()
            .unwrap();
        Fixture {
            pipeline,
            success,
            failure,
        }
    }

    #[test]
    fn test_valid_feed_splits_into_two_messages() {
        let f = newsletter_pipeline();
        let outcome = f.pipeline.process(Document::from(FEED)).unwrap();

        assert_eq!(outcome, ProcessOutcome { delivered: 2, diverted: 0 });
        assert_eq!(f.failure.count(), 0);

        let messages = f.success.received();
        assert_eq!(messages[0].header("newsfeed.date"), Some("2014.12.09 14:15"));
        assert_eq!(messages[0].header("news.author"), Some("Jan"));
        assert_eq!(messages[1].header("newsfeed.date"), Some("2014.12.09 14:15"));
        assert_eq!(messages[1].header("news.author"), Some("Ines"));
        // Wrap mode: each body is a standalone document.
        assert!(messages[0]
            .body
            .as_str()
            .unwrap()
            .starts_with("<news:Newsletter"));
    }

    #[test]
    fn test_invalid_document_diverts_once() {
        let f = newsletter_pipeline();
        let outcome = f.pipeline.process(Document::from("<xml/>")).unwrap();

        assert_eq!(outcome, ProcessOutcome { delivered: 0, diverted: 1 });
        assert_eq!(f.success.count(), 0);

        let failed = f.failure.received();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].body.as_str(), Some("<xml/>"));
        assert!(failed[0].header("error.message").unwrap().contains("newsletter.xsd"));
    }

    #[test]
    fn test_unrouted_failure_propagates() {
        let success = Arc::new(CollectingSink::new());
        let pipeline = Pipeline::builder(NamespaceContext::single("news", NS))
            .schema(newsletter_schema())
            .split("/news:Newsletter/News", SplitMode::Plain)
            .success_sink(success)
            .build()
            .unwrap();

        let err = pipeline.process(Document::from("<xml/>")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_mid_scan_failure_keeps_earlier_deliveries() {
        // No schema, so the malformed tail is first seen by the splitter.
        let success = Arc::new(CollectingSink::new());
        let failure = Arc::new(CollectingSink::new());
        let pipeline = Pipeline::builder(NamespaceContext::single("news", NS))
            .split("/news:Newsletter/News", SplitMode::Plain)
            .success_sink(success.clone())
            .route(ErrorKind::NotXml, failure.clone())
            .build()
            .unwrap();

        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed"><News author="Jan"/><News"#;
        let outcome = pipeline.process(Document::from(doc)).unwrap();

        assert_eq!(outcome, ProcessOutcome { delivered: 1, diverted: 1 });
        assert_eq!(success.count(), 1);
        assert_eq!(failure.count(), 1);
    }

    #[test]
    fn test_missing_header_match_leaves_header_absent() {
        let success = Arc::new(CollectingSink::new());
        let pipeline = Pipeline::builder(NamespaceContext::single("news", NS))
            .split("/news:Newsletter/News", SplitMode::Plain)
            .parent_header("missing", "/news:Newsletter/@nope")
            .success_sink(success.clone())
            .build()
            .unwrap();

        let doc = r#"<news:Newsletter xmlns:news="http://example.com/newsfeed"><News/></news:Newsletter>"#;
        let outcome = pipeline.process(Document::from(doc)).unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(success.received()[0].header("missing"), None);
    }

    #[test]
    fn test_observer_fires_per_message() {
        let success = Arc::new(CollectingSink::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pipeline = Pipeline::builder(NamespaceContext::single("news", NS))
            .split("/news:Newsletter/News", SplitMode::Plain)
            .success_sink(success)
            .observe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        pipeline.process(Document::from(FEED)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_builder_rejects_bad_wiring() {
        let sink: Arc<dyn MessageSink> = Arc::new(CollectingSink::new());

        let err = Pipeline::builder(NamespaceContext::single("news", NS))
            .split("/news:Newsletter/News", SplitMode::Plain)
            .success_sink(sink.clone())
            .route(ErrorKind::NoMatch, sink.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, SetupError::NotRoutable(ErrorKind::NoMatch)));

        let err = Pipeline::builder(NamespaceContext::single("news", NS))
            .split("/other:Root/Item", SplitMode::Plain)
            .success_sink(sink.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, SetupError::Path(_)));

        let err = Pipeline::builder(NamespaceContext::single("news", NS))
            .success_sink(sink)
            .build()
            .unwrap_err();
        assert!(matches!(err, SetupError::Incomplete("split path")));
    }
}
