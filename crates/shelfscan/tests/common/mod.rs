//! Shared doubles for the integration tests: a scripted chat backend and
//! in-memory content fetchers.

#![allow(dead_code)]

use shelfscan::agent::FINAL_RESULT_TOOL;
use shelfscan::fetch::{ContentFetcher, FetchError, FetchFuture};
use shelfscan::tools::FETCH_TOOL_NAME;
use shelfscan::{ChatBackend, ChatCompletion, ChatFuture, ChatRequest, ToolCall, UsageInfo};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const PAGE_URL: &str = "https://shop.test/best-sellers/";

// ── Backend ────────────────────────────────────────────────────────

/// Replays canned replies in order and records every request it receives.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ChatCompletion, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ChatCompletion, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChatBackend for ScriptedBackend {
    fn complete<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        self.requests.lock().unwrap().push(body.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".into()));
        Box::pin(async move { next })
    }
}

pub fn usage(prompt: u32, completion: u32) -> Option<UsageInfo> {
    Some(UsageInfo {
        prompt_tokens: Some(prompt),
        completion_tokens: Some(completion),
        total_tokens: Some(prompt + completion),
    })
}

/// The model asks for the page.
pub fn fetch_call(id: &str, url: &str) -> Result<ChatCompletion, String> {
    Ok(ChatCompletion {
        tool_calls: vec![ToolCall::function(
            id,
            FETCH_TOOL_NAME,
            serde_json::json!({ "url": url }).to_string(),
        )],
        usage: usage(500, 20),
        finish_reason: Some("tool_calls".into()),
        ..Default::default()
    })
}

/// The model submits `arguments` through `final_result`.
pub fn final_call(id: &str, arguments: serde_json::Value) -> Result<ChatCompletion, String> {
    Ok(ChatCompletion {
        tool_calls: vec![ToolCall::function(
            id,
            FINAL_RESULT_TOOL,
            arguments.to_string(),
        )],
        usage: usage(1500, 200),
        finish_reason: Some("tool_calls".into()),
        ..Default::default()
    })
}

/// The model answers in plain text.
pub fn text_reply(text: &str) -> Result<ChatCompletion, String> {
    Ok(ChatCompletion {
        content: Some(text.into()),
        usage: usage(800, 50),
        finish_reason: Some("stop".into()),
        ..Default::default()
    })
}

pub fn two_products() -> serde_json::Value {
    serde_json::json!({"dataset": [
        {"brand_name": "IKEA", "product_name": "BILLY", "price": "€ 59", "rating_count": 1520},
        {"brand_name": "IKEA", "product_name": "POÄNG", "price": "€ 99", "rating_count": null}
    ]})
}

// ── Fetchers ───────────────────────────────────────────────────────

/// Returns the same text for every URL and counts calls.
pub struct StaticFetcher {
    text: String,
    pub calls: AtomicU32,
}

impl StaticFetcher {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentFetcher for StaticFetcher {
    fn fetch<'a>(&'a self, _url: &'a str) -> FetchFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.text.clone();
        Box::pin(async move { Ok(text) })
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowFetcher {
    pub calls: AtomicU32,
}

impl SlowFetcher {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentFetcher for SlowFetcher {
    fn fetch<'a>(&'a self, _url: &'a str) -> FetchFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        })
    }
}

/// Fails with a transport error for the first `failures` calls.
pub struct FlakyFetcher {
    failures: u32,
    pub calls: AtomicU32,
}

impl FlakyFetcher {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentFetcher for FlakyFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failures = self.failures;
        Box::pin(async move {
            if n <= failures {
                Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: "connection reset by peer".into(),
                })
            } else {
                Ok("BILLY Bookcase € 59 (1520) POÄNG Armchair € 99".to_string())
            }
        })
    }
}
