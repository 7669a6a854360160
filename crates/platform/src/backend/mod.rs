//! Backend trait and implementations for talking to the platform.
//!
//! [`PlatformApi`] is the seam the lifecycle core consumes. The primary
//! implementation is [`http::HttpPlatform`]; [`MockPlatform`] serves
//! canned responses for tests:
//!
//! ```
//! use platform::{ApiRequest, ApiResponse, Method, MockPlatform, PlatformApi};
//!
//! let mock = MockPlatform::new();
//! mock.on(Method::Delete, "/access/api/v1/projects/bookverse", ApiResponse::empty(204));
//!
//! let resp = mock.send(&ApiRequest::delete("/access/api/v1/projects/bookverse")).unwrap();
//! assert_eq!(resp.status, 204);
//! assert_eq!(mock.mutation_calls().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{ApiRequest, ApiResponse, Method};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A blocking client for the platform REST API.
///
/// Implementations return `Ok` for every response that carries a status
/// code, including 4xx/5xx. `Err` is reserved for transport failures.
pub trait PlatformApi: Send + Sync {
    /// Issue one request.
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

impl<P: PlatformApi + ?Sized> PlatformApi for &P {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

impl<P: PlatformApi + ?Sized> PlatformApi for Box<P> {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Response(ApiResponse),
    Timeout,
}

type RouteKey = (Method, String);

/// In-memory platform for tests.
///
/// Routes are keyed by method and path-with-query. Each route holds a
/// queue of replies; the last reply is sticky. Unknown routes answer 404.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    routes: Arc<Mutex<HashMap<RouteKey, VecDeque<MockReply>>>>,
    calls: Arc<Mutex<Vec<ApiRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockPlatform {
    /// Create a new mock with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a route.
    pub fn on(&self, method: Method, path: impl Into<String>, response: ApiResponse) {
        self.push(method, path.into(), MockReply::Response(response));
    }

    /// Queue a JSON reply for a route.
    pub fn on_json(
        &self,
        method: Method,
        path: impl Into<String>,
        status: u16,
        body: &serde_json::Value,
    ) {
        self.on(method, path, ApiResponse::with_json(status, body));
    }

    /// Make a route fail with a transport timeout.
    pub fn fail_with_timeout(&self, method: Method, path: impl Into<String>) {
        self.push(method, path.into(), MockReply::Timeout);
    }

    fn push(&self, method: Method, path: String, reply: MockReply) {
        lock(&self.routes)
            .entry((method, path))
            .or_default()
            .push_back(reply);
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        lock(&self.calls).clone()
    }

    /// Requests that could have changed platform state.
    pub fn mutation_calls(&self) -> Vec<ApiRequest> {
        lock(&self.calls)
            .iter()
            .filter(|r| r.method.is_mutation())
            .cloned()
            .collect()
    }

    /// Requests matching a method, as `path_with_query` strings.
    pub fn paths_for(&self, method: Method) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|r| r.method == method)
            .map(ApiRequest::path_with_query)
            .collect()
    }
}

impl PlatformApi for MockPlatform {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        lock(&self.calls).push(request.clone());

        let key = (request.method, request.path_with_query());
        let reply = {
            let mut routes = lock(&self.routes);
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(MockReply::Response(resp)) => Ok(resp),
            Some(MockReply::Timeout) => Err(Error::Timeout {
                method: request.method.to_string(),
                path: request.path_with_query(),
            }),
            None => Ok(ApiResponse::empty(404)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_route_is_404() {
        let mock = MockPlatform::new();
        let resp = mock.send(&ApiRequest::get("/nothing")).unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_reply_queue_last_is_sticky() {
        let mock = MockPlatform::new();
        mock.on(Method::Delete, "/r/a", ApiResponse::empty(204));
        mock.on(Method::Delete, "/r/a", ApiResponse::empty(404));

        let req = ApiRequest::delete("/r/a");
        assert_eq!(mock.send(&req).unwrap().status, 204);
        assert_eq!(mock.send(&req).unwrap().status, 404);
        assert_eq!(mock.send(&req).unwrap().status, 404);
    }

    #[test]
    fn test_query_is_part_of_route() {
        let mock = MockPlatform::new();
        mock.on_json(
            Method::Get,
            "/apptrust/api/v1/applications?project_key=bookverse",
            200,
            &json!([]),
        );

        let scoped = ApiRequest::get("/apptrust/api/v1/applications").query("project_key", "bookverse");
        assert_eq!(mock.send(&scoped).unwrap().status, 200);

        let unscoped = ApiRequest::get("/apptrust/api/v1/applications");
        assert_eq!(mock.send(&unscoped).unwrap().status, 404);
    }

    #[test]
    fn test_timeout_reply() {
        let mock = MockPlatform::new();
        mock.fail_with_timeout(Method::Delete, "/slow");
        let err = mock.send(&ApiRequest::delete("/slow")).unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[test]
    fn test_mutation_calls_filter_gets() {
        let mock = MockPlatform::new();
        mock.send(&ApiRequest::get("/a")).unwrap();
        mock.send(&ApiRequest::delete("/b")).unwrap();
        mock.send(&ApiRequest::patch("/c")).unwrap();
        let paths: Vec<_> = mock.mutation_calls().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/b", "/c"]);
        assert_eq!(mock.paths_for(Method::Get), vec!["/a"]);
    }
}
