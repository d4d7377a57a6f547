//! Deployment errors with their step context and sanitized messages.

use thiserror::Error;

use crate::{
    DeploymentStep,
    sanitize::{ChainErrorKind, classify_chain_error, sanitize_message, user_message},
};

/// Failure of a deployment attempt, as surfaced to the user.
///
/// Messages are sanitized on construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// User-correctable input problems, all of them.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// An upstream service failed or returned something unusable.
    #[error("{step} failed: {message}")]
    Network {
        step: DeploymentStep,
        message: String,
    },
    /// A transaction could not be submitted, reverted or timed out.
    #[error("{message}")]
    Chain {
        kind: ChainErrorKind,
        message: String,
        /// The transaction reached the network; submitting again may double-deploy.
        submitted: bool,
    },
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The flow was driven out of order, e.g. run again without a reset.
    #[error("Invalid deployment state: {0}")]
    State(String),
}

impl DeployError {
    pub fn state(err: &anyhow::Error) -> Self {
        DeployError::State(format!("{:#}", err))
    }

    pub fn network(step: DeploymentStep, err: &anyhow::Error) -> Self {
        DeployError::Network {
            step,
            message: sanitize_message(&format!("{:#}", err)),
        }
    }

    pub fn chain(err: &anyhow::Error, submitted: bool) -> Self {
        let text = format!("{:#}", err);
        let kind = classify_chain_error(&text);
        DeployError::Chain {
            kind,
            message: user_message(kind, &text),
            submitted,
        }
    }

    /// Whether the user can safely try the same deployment again.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeployError::Validation(_) => true,
            DeployError::Network { step, .. } => !matches!(
                step,
                DeploymentStep::ConfirmingDraft | DeploymentStep::PollingReadiness
            ),
            DeployError::Chain { submitted, .. } => !submitted,
            DeployError::Config(_) | DeployError::State(_) => false,
        }
    }
}
