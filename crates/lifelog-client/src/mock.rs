use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use lifelog_core::api::LifelogApi;
use lifelog_core::errors::UpstreamError;
use lifelog_core::lifelog::{Lifelog, LifelogPage, LifelogQuery};

/// Pre-programmed upstream responses for deterministic testing without
/// network calls. Responses are consumed in queue order per operation;
/// an exhausted queue reports a network error so a test that over-calls
/// fails loudly instead of hanging.
#[derive(Default)]
pub struct MockApi {
    list_responses: Mutex<VecDeque<Result<LifelogPage, UpstreamError>>>,
    by_id_responses: Mutex<VecDeque<Result<Lifelog, UpstreamError>>>,
    delete_responses: Mutex<VecDeque<Result<(), UpstreamError>>>,
    list_calls: Mutex<Vec<LifelogQuery>>,
    by_id_calls: Mutex<Vec<String>>,
    delete_calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, page: LifelogPage) {
        self.list_responses.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_list_error(&self, err: UpstreamError) {
        self.list_responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_lifelog(&self, log: Lifelog) {
        self.by_id_responses.lock().unwrap().push_back(Ok(log));
    }

    pub fn push_by_id_error(&self, err: UpstreamError) {
        self.by_id_responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_delete_ok(&self) {
        self.delete_responses.lock().unwrap().push_back(Ok(()));
    }

    pub fn push_delete_error(&self, err: UpstreamError) {
        self.delete_responses.lock().unwrap().push_back(Err(err));
    }

    /// Queries received by `get_lifelogs`, in call order.
    pub fn list_calls(&self) -> Vec<LifelogQuery> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn by_id_calls(&self) -> Vec<String> {
        self.by_id_calls.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }
}

fn exhausted() -> UpstreamError {
    UpstreamError::NetworkError("mock: no response queued".into())
}

#[async_trait]
impl LifelogApi for MockApi {
    async fn get_lifelogs(&self, query: &LifelogQuery) -> Result<LifelogPage, UpstreamError> {
        self.list_calls.lock().unwrap().push(query.clone());
        self.list_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn get_lifelog_by_id(&self, id: &str) -> Result<Lifelog, UpstreamError> {
        self.by_id_calls.lock().unwrap().push(id.to_string());
        self.by_id_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn delete_lifelog(&self, id: &str) -> Result<(), UpstreamError> {
        self.delete_calls.lock().unwrap().push(id.to_string());
        self.delete_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }
}
