//! Command routing: dispatches a [`CommandEnvelope`] to its handler by kind.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use catalog_core::{CommandEnvelope, CommandKind, ReplyValue};
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a handler concluded, before reply encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(ReplyValue),
    /// A failure with its cause, or `None` when the cause is unknown.
    Failure(Option<String>),
    /// A keyed write whose target record does not exist.
    Missing {
        error: &'static str,
        detail: &'static str,
    },
}

impl Outcome {
    /// A failure with a known cause.
    pub fn failure(cause: impl Into<String>) -> Self {
        Outcome::Failure(Some(cause.into()))
    }

    /// A failure reported by the document store, keeping its message if any.
    #[must_use]
    pub fn fault(err: &StoreError) -> Self {
        Outcome::Failure(err.message().map(str::to_owned))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Errors raised by the routing layer itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for {kind}")]
    Unrecognized { kind: CommandKind },
}

pub type DispatchFuture = Pin<Box<dyn Future<Output = Result<Outcome, DispatchError>> + Send>>;

type HandlerService = BoxCloneService<CommandEnvelope, Outcome, DispatchError>;

// ---------------------------------------------------------------------------
// CommandRouter
// ---------------------------------------------------------------------------

/// Routes envelopes to the handler registered for their [`CommandKind`].
///
/// Kinds without a handler yield [`DispatchError::Unrecognized`] without
/// touching any handler.
#[derive(Clone, Default)]
pub struct CommandRouter {
    handlers: HashMap<CommandKind, HandlerService>,
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `kind`, replacing any previous one.
    pub fn register<S>(&mut self, kind: CommandKind, handler: S)
    where
        S: Service<CommandEnvelope, Response = Outcome, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        let handler = handler.map_err(|never: Infallible| match never {});
        self.handlers.insert(kind, BoxCloneService::new(handler));
    }
}

impl Service<CommandEnvelope> for CommandRouter {
    type Response = Outcome;
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        for handler in self.handlers.values_mut() {
            match handler.poll_ready(cx) {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, envelope: CommandEnvelope) -> Self::Future {
        let kind = envelope.kind;
        match self.handlers.get_mut(&kind) {
            Some(handler) => handler.call(envelope),
            None => Box::pin(async move { Err(DispatchError::Unrecognized { kind }) }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use catalog_core::{DeletionAck, ProductList};

    use super::*;

    /// Stub handler that answers every envelope with the same value.
    #[derive(Clone)]
    struct StubHandler {
        value: ReplyValue,
        calls: Arc<AtomicUsize>,
    }

    impl Service<CommandEnvelope> for StubHandler {
        type Response = Outcome;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Outcome, Infallible>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _envelope: CommandEnvelope) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let value = self.value.clone();
            Box::pin(async move { Ok(Outcome::Success(value)) })
        }
    }

    fn fixed(value: ReplyValue, calls: Arc<AtomicUsize>) -> StubHandler {
        StubHandler { value, calls }
    }

    #[tokio::test]
    async fn routes_by_kind() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = CommandRouter::new();
        router.register(
            CommandKind::GetAllProducts,
            fixed(ReplyValue::Products(ProductList::new(Vec::new())), calls.clone()),
        );
        router.register(
            CommandKind::DeleteProduct,
            fixed(ReplyValue::Removed(DeletionAck::removed("9")), calls.clone()),
        );

        let outcome = router
            .clone()
            .oneshot(CommandEnvelope::delete_product("9"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Success(ReplyValue::Removed(DeletionAck::removed("9"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_kind_is_unrecognized_and_calls_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = CommandRouter::new();
        router.register(
            CommandKind::GetAllProducts,
            fixed(ReplyValue::Products(ProductList::new(Vec::new())), calls.clone()),
        );

        let err = router
            .oneshot(CommandEnvelope::get_product("1"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::Unrecognized {
                kind: CommandKind::GetProduct
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fault_keeps_only_meaningful_messages() {
        assert_eq!(
            Outcome::fault(&StoreError::Backend("disk full".into())),
            Outcome::failure("disk full")
        );
        assert_eq!(Outcome::fault(&StoreError::Backend(String::new())), Outcome::Failure(None));
        assert_eq!(Outcome::fault(&StoreError::Unexplained), Outcome::Failure(None));
    }
}
