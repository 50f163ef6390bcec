//! Command taxonomy carried by the `cmd` field of a command envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every command the product dispatcher understands.
///
/// Wire tokens are the `snake_case` variant names (`get_all_products`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    CreateProduct,
    GetProduct,
    GetAllProducts,
    UpdateProduct,
    DeleteProduct,
}

impl CommandKind {
    /// All command kinds, in declaration order.
    pub const ALL: [CommandKind; 5] = [
        CommandKind::CreateProduct,
        CommandKind::GetProduct,
        CommandKind::GetAllProducts,
        CommandKind::UpdateProduct,
        CommandKind::DeleteProduct,
    ];

    /// Returns the wire token for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandKind::CreateProduct => "create_product",
            CommandKind::GetProduct => "get_product",
            CommandKind::GetAllProducts => "get_all_products",
            CommandKind::UpdateProduct => "update_product",
            CommandKind::DeleteProduct => "delete_product",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `cmd` token that names no known command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command token: {0:?}")]
pub struct UnknownCommandError(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommandError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .ok_or_else(|| UnknownCommandError(token.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_back_to_their_kind() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.as_str().parse::<CommandKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn serde_token_matches_as_str() {
        for kind in CommandKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "findAll".parse::<CommandKind>().unwrap_err();
        assert_eq!(err, UnknownCommandError("findAll".to_string()));
    }
}
