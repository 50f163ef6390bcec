//! Instrumentation middleware for the dispatch pipeline.
//!
//! Every command runs inside a `command` span and records
//! `catalog_commands_total{kind,outcome}` and
//! `catalog_command_duration_seconds{kind}` through the `metrics` facade.

use std::task::{Context, Poll};
use std::time::Instant;

use catalog_core::CommandEnvelope;
use tower::{Layer, Service, ServiceBuilder};
use tracing::{info_span, Instrument};

use super::router::{CommandRouter, DispatchError, DispatchFuture, Outcome};

// ---------------------------------------------------------------------------
// InstrumentLayer
// ---------------------------------------------------------------------------

/// Tower layer that times and counts commands.
#[derive(Debug, Clone)]
pub struct InstrumentLayer;

impl<S> Layer<S> for InstrumentLayer {
    type Service = InstrumentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentService { inner }
    }
}

// ---------------------------------------------------------------------------
// InstrumentService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InstrumentService<S> {
    inner: S,
}

impl<S> Service<CommandEnvelope> for InstrumentService<S>
where
    S: Service<CommandEnvelope, Response = Outcome, Error = DispatchError> + Send,
    S::Future: Send + 'static,
{
    type Response = Outcome;
    type Error = DispatchError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, envelope: CommandEnvelope) -> Self::Future {
        let kind = envelope.kind.as_str();
        let span = info_span!(
            "command",
            kind,
            id = envelope.id.as_deref().unwrap_or(""),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(envelope);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(outcome) if outcome.is_success() => "success",
                    Ok(_) => "failure",
                    Err(DispatchError::Unrecognized { .. }) => "unrecognized",
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", outcome);

                metrics::counter!("catalog_commands_total", "kind" => kind, "outcome" => outcome)
                    .increment(1);
                metrics::histogram!("catalog_command_duration_seconds", "kind" => kind)
                    .record(elapsed.as_secs_f64());

                tracing::debug!(kind, duration_ms, outcome, "command complete");

                result
            }
            .instrument(span),
        )
    }
}

/// The dispatch stack: instrumentation around the command router.
pub type DispatchPipeline = InstrumentService<CommandRouter>;

/// Wraps `router` with the dispatch middleware.
#[must_use]
pub fn build_dispatch_pipeline(router: CommandRouter) -> DispatchPipeline {
    ServiceBuilder::new().layer(InstrumentLayer).service(router)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
