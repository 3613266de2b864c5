use crate::command::CommandError;
use crate::domain::{LedgerAddress, PlanError};
use crate::ledger::LedgerError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of a tip bot command. None of these are fatal to the bridge.
#[derive(Debug, Error)]
pub enum TipError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("user {0} has no deposit")]
    NoDeposit(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("recipient {0} is a bot")]
    BotRecipient(String),
    #[error("insufficient funds on {address}: need {required}, have {available}")]
    InsufficientFunds {
        address: LedgerAddress,
        required: i64,
        available: i64,
    },
    #[error("self transfer to {0}")]
    SelfTransfer(LedgerAddress),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PlanError> for TipError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::SelfTransfer(address) => TipError::SelfTransfer(address),
            PlanError::InsufficientFunds {
                address,
                required,
                available,
            } => TipError::InsufficientFunds {
                address,
                required,
                available,
            },
            PlanError::NonPositiveAmount(amount) => TipError::Command(CommandError::Parse {
                command: "send",
                reason: format!("can't send {} XEM", amount),
            }),
        }
    }
}

impl TipError {
    /// Text shown to the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            TipError::Command(e) => e.to_string(),
            TipError::NoDeposit(_) => "You don't have any deposit".to_string(),
            TipError::UserNotFound(handle) => format!("problem with finding the user {}", handle),
            TipError::BotRecipient(_) => "I won't send XEM to a bot!".to_string(),
            TipError::InsufficientFunds {
                address,
                required,
                available,
            } => format!(
                "Not enough funds on your deposit to make this transaction ({}, {} needed, but have only: {})",
                address, required, available
            ),
            TipError::SelfTransfer(_) => {
                "It seems to me you're trying to tip yourself. To avoid the fees I won't do that!"
                    .to_string()
            }
            TipError::Ledger(_) => {
                "FAILURE: the ledger node could not process the request, please try again later"
                    .to_string()
            }
            TipError::Store(_) => {
                "FAILURE: could not save your deposit, please try again later".to_string()
            }
        }
    }

    /// Whether the error is also echoed in the channel the command came from.
    pub fn is_public(&self) -> bool {
        matches!(self, TipError::BotRecipient(_) | TipError::SelfTransfer(_))
    }
}

/// Errors returned by the HTTP ingress.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
