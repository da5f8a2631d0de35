//! Port interfaces for issuing API requests
//!
//! Every decorator in this crate (auth retry, traffic logging) implements
//! [`HttpTransport`] and wraps another one, so they compose in any order.

use std::sync::Arc;

use async_trait::async_trait;
use tether_domain::{ApiRequest, ApiResponse, JobHandle, Result, Warnings};

/// Issues one request and returns the buffered response.
///
/// Non-2xx responses are returned as `Ok`; only failures to obtain a
/// response at all (connect, timeout, protocol) are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        (**self).send(request).await
    }
}

/// Starts asynchronous work and reports the handle to poll.
///
/// Warnings returned while starting the work belong to the same operation as
/// the polls that follow.
#[async_trait]
pub trait JobHandleResolver: Send + Sync {
    async fn resolve_job_handle(&self) -> Result<(JobHandle, Warnings)>;
}
