//! Catalog core: the product model and the envelopes exchanged over the
//! internal message bus between the HTTP gateway and the command dispatcher.

pub mod command;
pub mod envelope;
pub mod product;
pub mod reply;

pub use command::{CommandKind, UnknownCommandError};
pub use envelope::{CommandEnvelope, DecodeError};
pub use product::{Product, ProductDraft, MAX_PRODUCTS_PER_PAGE};
pub use reply::{DeletionAck, DeletionStatus, ProductList, ReplyEnvelope, ReplyError, ReplyValue};
