//! Request handler abstraction.
//!
//! A [`Handler`] turns a request into a response. Handlers run on the
//! connection's own task (request bodies are task-affine), so the trait is
//! `?Send` and plain async functions can be adapted with [`make_handler`].

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

#[async_trait(?Send)]
pub trait Handler {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// [`Handler`] implementation wrapping a plain async function.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait(?Send)]
impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    F: Fn(Request<ReqBody>) -> Fut,
    Fut: Future<Output = Result<Response<RespBody>, Err>>,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, RespBody, Err, Fut>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Fut,
{
    HandlerFn { f }
}
