//! Method handlers.
//!
//! Handlers return domain failures only; the dispatch path owns the
//! conversion to protocol errors. A synchronous result and a deferred
//! one share the single async shape, so dispatch does not care which a
//! handler is.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use rill_jsonrpc::Params;

/// Failure kinds a handler can signal.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The params did not match the handler's contract; dispatched as
    /// Invalid Parameters (-32602).
    #[error("invalid parameters")]
    InvalidParams,

    /// Any other failure; dispatched as Internal Error (-32603) with
    /// this text as the error message.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

/// A registered method implementation.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, params: Option<Params>) -> HandlerResult;
}

/// Function-based handler wrapping a boxed future.
///
/// [`crate::Server::method`] lifts plain async closures into this shape.
pub struct FnHandler<F>
where
    F: Fn(Option<Params>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    handler_fn: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Option<Params>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(Option<Params>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    async fn call(&self, params: Option<Params>) -> HandlerResult {
        (self.handler_fn)(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new(|params: Option<Params>| {
            async move {
                match params {
                    Some(params) => Ok(json!(params.len())),
                    None => Err(HandlerError::InvalidParams),
                }
            }
            .boxed()
        });

        let result = handler
            .call(Some(Params::Array(vec![json!(1), json!(2)])))
            .await
            .unwrap();
        assert_eq!(result, json!(2));

        assert!(matches!(
            handler.call(None).await,
            Err(HandlerError::InvalidParams)
        ));
    }

    #[test]
    fn test_failed_carries_text() {
        let err = HandlerError::failed("disk on fire");
        assert_eq!(err.to_string(), "disk on fire");
    }
}
