//! The `fetch_html_text` tool.

use crate::ToolDef;
use crate::fetch::{ContentFetcher, FetchError};
use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::tools::spec::ToolSpec;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

pub const FETCH_TOOL_NAME: &str = "fetch_html_text";

/// Typed arguments for `fetch_html_text`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchArgs {
    /// The page's URL to fetch the HTML text from.
    pub url: String,
}

/// Exposes a [`ContentFetcher`] to the model.
///
/// Transport failures are hard failures and get retried by the
/// [`ToolSet`](crate::tools::core::ToolSet); everything else is text.
pub struct FetchHtmlText {
    fetcher: Arc<dyn ContentFetcher>,
}

impl FetchHtmlText {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self { fetcher }
    }
}

impl Tool for FetchHtmlText {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(FETCH_TOOL_NAME)
            .purpose("Fetch the HTML text from the given URL")
            .when_to_use("First, to read the page whose products you were asked to extract")
            .when_not_to_use(
                "When you already have the page text in this conversation. \
                 Never use it for URLs other than the one you were given",
            )
            .parameters_for::<FetchArgs>()
            .example(
                "fetch_html_text(url='https://www.ikea.com/nl/en/cat/best-sellers/')",
                "The visible text of the page as one line",
            )
            .output_format(
                "The page's visible text with line breaks removed, or a message \
                 starting with 'Failed to fetch' that includes the HTTP status code",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: FetchArgs = match parse_tool_args(&arguments) {
                Ok(a) => a,
                Err(e) => return Ok(e),
            };
            match self.fetcher.fetch(&args.url).await {
                Ok(text) => Ok(text),
                Err(e @ FetchError::InvalidUrl { .. }) => {
                    Ok(format!("Error: {e}. Pass an absolute http(s) URL."))
                }
                Err(e) => Err(e.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchFuture;
    use crate::tools::core::{ToolOutcome, ToolSet};
    use std::sync::Mutex;

    /// Replays canned fetch results and records requested URLs.
    struct CannedFetcher {
        replies: Mutex<Vec<Result<String, FetchError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl CannedFetcher {
        fn new(replies: Vec<Result<String, FetchError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ContentFetcher for CannedFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
            self.seen.lock().unwrap().push(url.to_string());
            let reply = self.replies.lock().unwrap().remove(0);
            Box::pin(async move { reply })
        }
    }

    fn transport(reason: &str) -> FetchError {
        FetchError::Transport {
            url: "https://shop.test".into(),
            reason: reason.into(),
        }
    }

    #[test]
    fn definition_requires_url() {
        let tool = FetchHtmlText::new(Arc::new(CannedFetcher::new(vec![])));
        let def = tool.definition();
        assert_eq!(def.function.name, FETCH_TOOL_NAME);
        let required = def.function.parameters["required"].as_array().unwrap();
        assert!(required.contains(&"url".into()));
    }

    #[tokio::test]
    async fn returns_page_text() {
        let fetcher = Arc::new(CannedFetcher::new(vec![Ok("BILLY Bookcase".into())]));
        let set = ToolSet::new().with(FetchHtmlText::new(fetcher.clone()));
        let outcome = set
            .execute(FETCH_TOOL_NAME, r#"{"url": "https://shop.test"}"#)
            .await;
        assert_eq!(outcome, ToolOutcome::Ok("BILLY Bookcase".into()));
        assert_eq!(fetcher.seen.lock().unwrap().as_slice(), ["https://shop.test"]);
    }

    #[tokio::test]
    async fn transport_error_is_retried_once_then_fails() {
        let fetcher = Arc::new(CannedFetcher::new(vec![
            Err(transport("connection refused")),
            Err(transport("connection refused")),
        ]));
        let set = ToolSet::new()
            .with_default_retries(1)
            .with(FetchHtmlText::new(fetcher.clone()));
        let outcome = set
            .execute(FETCH_TOOL_NAME, r#"{"url": "https://shop.test"}"#)
            .await;
        assert!(outcome.is_hard_fail());
        assert_eq!(fetcher.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_url_is_soft() {
        let fetcher = Arc::new(CannedFetcher::new(vec![Err(FetchError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        })]));
        let set = ToolSet::new().with(FetchHtmlText::new(fetcher));
        match set.execute(FETCH_TOOL_NAME, r#"{"url": "nope"}"#).await {
            ToolOutcome::Ok(text) => assert!(text.contains("invalid URL 'nope'")),
            other => panic!("expected soft failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_url_argument_is_soft() {
        let fetcher = Arc::new(CannedFetcher::new(vec![]));
        let set = ToolSet::new().with(FetchHtmlText::new(fetcher.clone()));
        match set.execute(FETCH_TOOL_NAME, "{}").await {
            ToolOutcome::Ok(text) => assert!(text.contains("invalid tool arguments")),
            other => panic!("expected soft failure, got {other:?}"),
        }
        assert!(fetcher.seen.lock().unwrap().is_empty());
    }
}
