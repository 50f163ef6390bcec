//! Reply encoding: maps every handler [`Outcome`] to exactly one
//! [`ReplyEnvelope`] with a non-empty error message.

use catalog_core::{CommandKind, ReplyEnvelope, ReplyError};

use super::router::Outcome;

pub const UNRECOGNIZED_COMMAND: &str = "Unrecognized command";
pub const NO_RESULTS_FOUND: &str = "No results found";
pub const CREATE_FAILED: &str = "Unable to create new product";
pub const UPDATE_MISSING: &str = "There were problems updating the record on the backend";
pub const DELETE_MISSING: &str = "There were problems removing the record from the backend";
pub const UPDATE_MISSING_DETAIL: &str = "Could not update record";
pub const DELETE_MISSING_DETAIL: &str = "Could not delete record";
pub const MISSING_ID: &str = "A product id is required";
pub const MISSING_PAYLOAD: &str = "A product body is required";

/// Message used when a failure carries no usable cause.
#[must_use]
pub fn fallback_cause(kind: CommandKind) -> String {
    let verb = match kind {
        CommandKind::GetAllProducts | CommandKind::GetProduct => "receiving",
        CommandKind::CreateProduct => "posting",
        CommandKind::UpdateProduct => "updating",
        CommandKind::DeleteProduct => "deleting",
    };
    format!("There were problems {verb} the data from the backend")
}

/// Encodes the outcome of a `kind` command.
#[must_use]
pub fn encode_reply(kind: CommandKind, outcome: Outcome) -> ReplyEnvelope {
    match outcome {
        Outcome::Success(value) => ReplyEnvelope::Ok(value),
        Outcome::Failure(Some(cause)) if !cause.trim().is_empty() => ReplyEnvelope::error(cause),
        Outcome::Failure(_) => ReplyEnvelope::error(fallback_cause(kind)),
        Outcome::Missing { error, detail } => {
            ReplyEnvelope::Err(ReplyError::new(error).with_cause(detail))
        }
    }
}
