use super::{ApiRequest, ApiResponse, ProxySettings, Transport};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted transport: replies are consumed in order and every call is
/// recorded.
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Result<ApiResponse>>>>,
    calls: Arc<Mutex<Vec<(ApiRequest, ProxySettings)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, response: ApiResponse) -> Self {
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn with_json(self, status: u16, body: serde_json::Value) -> Self {
        self.with_response(ApiResponse {
            status,
            body: body.to_string(),
        })
    }

    pub fn with_error(self, error: Error) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(ApiRequest, ProxySettings)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest, proxy: &ProxySettings) -> Result<ApiResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), proxy.clone()));

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Network("no scripted reply left".to_string())))
    }
}
