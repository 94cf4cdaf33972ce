//! Scripted fetcher shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ResolveError, Result};
use crate::stream::fetcher::{FetchRequest, FetchResponse, PayloadFetcher};

/// Replays queued responses in order and records every request it saw.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<FetchResponse>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(FetchResponse::new(status, body)));
        self
    }

    pub fn json(self, body: serde_json::Value) -> Self {
        self.respond(200, &body.to_string())
    }

    pub fn fail(self, url: &str, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ResolveError::transport(url, message)));
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PayloadFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected fetch of {}", request.url))
    }
}
