//! Command dispatch: the consumer side of the product bus.
//!
//! - [`router`]: `CommandKind` → handler service map
//! - [`handlers`]: the five product handlers over a [`DocumentStore`](crate::store::DocumentStore)
//! - [`reply`]: turns handler outcomes into reply envelopes
//! - [`middleware`]: per-command tracing and metrics
//! - [`worker`]: the consume loop that ties the bus to the pipeline

pub mod handlers;
pub mod middleware;
pub mod reply;
pub mod router;
pub mod worker;

pub use handlers::{product_router, ProductHandlers};
pub use middleware::{build_dispatch_pipeline, DispatchPipeline, InstrumentLayer};
pub use reply::encode_reply;
pub use router::{CommandRouter, DispatchError, DispatchFuture, Outcome};
pub use worker::{dispatch, Dispatcher};
