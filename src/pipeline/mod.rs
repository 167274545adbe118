//! Request pipeline the bridge injects into.
//!
//! # Responsibilities
//! - Define the `inject` contract: one request in, one response out
//! - Adapt closures and axum routers to that contract
//!
//! # Design Decisions
//! - The pipeline never fails; errors are expressed as responses
//! - No timeout or retry is applied here

use std::future::Future;

use futures_util::future::BoxFuture;

use crate::protocol::{Request, Response};

pub mod router;

pub use router::RouterPipeline;

/// An HTTP-style handler stack that answers canonical requests.
pub trait Pipeline: Send + Sync + 'static {
    fn inject(&self, request: Request) -> BoxFuture<'static, Response>;
}

/// Pipeline backed by a closure.
pub struct FnPipeline<F> {
    f: F,
}

/// Wrap an async closure as a [`Pipeline`].
pub fn pipeline_fn<F, Fut>(f: F) -> FnPipeline<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnPipeline { f }
}

impl<F, Fut> Pipeline for FnPipeline<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn inject(&self, request: Request) -> BoxFuture<'static, Response> {
        Box::pin((self.f)(request))
    }
}
