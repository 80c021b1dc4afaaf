//! Operation interceptors
//!
//! Interceptors wrap every prepared operation executed through a storage.
//! Each one receives a [`Chain`] and decides whether, and when, to let the
//! operation proceed.

use crate::errors::{DbError, OperationError, OperationKind};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Type-erased result of an intercepted operation
pub type InterceptorOutput = Box<dyn Any + Send>;

/// What is being executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    kind: OperationKind,
    description: String,
}

impl OperationInfo {
    pub fn new(kind: OperationKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        operation: &OperationInfo,
        chain: Chain<'_>,
    ) -> Result<InterceptorOutput, OperationError>;
}

/// The rest of the interceptor chain, ending with the operation itself
pub struct Chain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    operation: &'a OperationInfo,
    call: BoxFuture<'a, Result<InterceptorOutput, OperationError>>,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(
        interceptors: &'a [Arc<dyn Interceptor>],
        operation: &'a OperationInfo,
        call: BoxFuture<'a, Result<InterceptorOutput, OperationError>>,
    ) -> Self {
        Self {
            interceptors,
            operation,
            call,
        }
    }

    pub fn operation(&self) -> &OperationInfo {
        self.operation
    }

    /// Run the next interceptor, or the operation once none are left
    pub async fn proceed(self) -> Result<InterceptorOutput, OperationError> {
        match self.interceptors.split_first() {
            Some((next, rest)) => {
                let chain = Chain::new(rest, self.operation, self.call);
                next.intercept(self.operation, chain).await
            }
            None => self.call.await,
        }
    }
}

/// Run `call` through the interceptors in registration order
pub(crate) async fn intercepted<'a, R, F>(
    interceptors: &'a [Arc<dyn Interceptor>],
    operation: OperationInfo,
    call: F,
) -> Result<R, OperationError>
where
    R: Send + 'static,
    F: Future<Output = Result<R, OperationError>> + Send + 'a,
{
    if interceptors.is_empty() {
        return call.await;
    }

    let erased = async move { call.await.map(|value| Box::new(value) as InterceptorOutput) }.boxed();
    let output = Chain::new(interceptors, &operation, erased).proceed().await?;
    output.downcast::<R>().map(|value| *value).map_err(|_| {
        OperationError::new(
            operation.kind(),
            operation.description(),
            DbError::InterceptorOutput,
        )
    })
}

/// Logs every operation with its duration
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        operation: &OperationInfo,
        chain: Chain<'_>,
    ) -> Result<InterceptorOutput, OperationError> {
        let started = Instant::now();
        tracing::debug!("[ROWBUS] {} started: {}", operation.kind(), operation.description());

        let result = chain.proceed().await;
        match &result {
            Ok(_) => tracing::debug!(
                "[ROWBUS] {} finished in {:?}: {}",
                operation.kind(),
                started.elapsed(),
                operation.description()
            ),
            Err(e) => tracing::warn!(
                "[ROWBUS] {} failed after {:?}: {}",
                operation.kind(),
                started.elapsed(),
                e
            ),
        }
        result
    }
}
