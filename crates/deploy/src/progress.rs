//! Deployment states and progress reporting.

use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;

/// State of a collection deployment.
///
/// `Idle -> Preparing -> Deploying -> Confirming -> Ready -> Complete`, with
/// `Error` reachable from any non-terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentState {
    Idle,
    Preparing,
    Deploying,
    Confirming,
    Ready,
    Complete,
    Error,
}

impl DeploymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentState::Complete | DeploymentState::Error)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Staying in the same non-terminal state is allowed so that sub-steps can
    /// be reported. Terminal states only go back to `Idle` on reset.
    pub fn can_transition_to(self, next: DeploymentState) -> bool {
        use DeploymentState::*;

        match (self, next) {
            (Complete | Error, Idle) => true,
            (from, _) if from.is_terminal() => false,
            (_, Error) => true,
            (from, to) if from == to => true,
            (Idle, Preparing)
            | (Preparing, Deploying)
            | (Deploying, Confirming)
            | (Confirming, Ready)
            | (Ready, Complete) => true,
            _ => false,
        }
    }
}

/// The step a deployment is working on, for progress display and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStep {
    Validating,
    Authenticating,
    Uploading,
    GeneratingSlug,
    Drafting,
    Encoding,
    Submitting,
    WaitingForReceipt,
    ConfirmingDraft,
    PollingReadiness,
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub state: DeploymentState,
    pub step: Option<DeploymentStep>,
    pub message: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            state: DeploymentState::Idle,
            step: None,
            message: String::new(),
        }
    }
}

/// Publishes [`Progress`] to any number of watchers.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<Progress>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Progress::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Progress {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> DeploymentState {
        self.tx.borrow().state
    }

    /// Move to `state`, rejecting illegal transitions.
    pub fn advance(
        &self,
        state: DeploymentState,
        step: Option<DeploymentStep>,
        message: impl Into<String>,
    ) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(state) {
            anyhow::bail!("Illegal deployment transition {} -> {}", current, state);
        }

        let message = message.into();
        tracing::debug!(from = %current, to = %state, step = ?step, detail = %message, "Deployment progress");
        self.tx.send_replace(Progress {
            state,
            step,
            message,
        });
        Ok(())
    }

    /// Claim the reporter for a new deployment, moving `Idle -> Preparing`.
    ///
    /// The check and the transition happen under the channel's lock, so of
    /// two concurrent callers exactly one succeeds. A rejected claim leaves
    /// the running deployment untouched.
    pub fn begin(&self, step: DeploymentStep, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let mut busy = None;
        self.tx.send_if_modified(|progress| {
            if progress.state != DeploymentState::Idle {
                busy = Some(progress.state);
                return false;
            }
            *progress = Progress {
                state: DeploymentState::Preparing,
                step: Some(step),
                message: message.clone(),
            };
            true
        });

        if let Some(state) = busy {
            anyhow::bail!("A deployment is already {}, reset first", state);
        }
        tracing::debug!(to = %DeploymentState::Preparing, step = ?step, detail = %message, "Deployment started");
        Ok(())
    }

    /// Report a sub-step without changing state.
    pub fn step(&self, step: DeploymentStep, message: impl Into<String>) -> Result<()> {
        self.advance(self.state(), Some(step), message)
    }

    /// Move to `Error` with a user-facing message. No-op once terminal.
    pub fn fail(&self, message: impl Into<String>) {
        let current = self.state();
        if current.is_terminal() {
            return;
        }
        let step = self.tx.borrow().step;
        self.tx.send_replace(Progress {
            state: DeploymentState::Error,
            step,
            message: message.into(),
        });
    }

    /// Return to `Idle`, discarding the last outcome.
    pub fn reset(&self) {
        self.tx.send_replace(Progress::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeploymentState::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [Idle, Preparing, Deploying, Confirming, Ready, Complete];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_error_reachable_from_non_terminal() {
        for state in [Idle, Preparing, Deploying, Confirming, Ready] {
            assert!(state.can_transition_to(Error));
        }
        assert!(!Complete.can_transition_to(Error));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!Preparing.can_transition_to(Confirming));
        assert!(!Deploying.can_transition_to(Complete));
        assert!(!Ready.can_transition_to(Deploying));
    }

    #[test]
    fn test_terminal_states_only_reset() {
        assert!(Complete.can_transition_to(Idle));
        assert!(Error.can_transition_to(Idle));
        assert!(!Error.can_transition_to(Preparing));
        assert!(!Complete.can_transition_to(Complete));
    }

    #[test]
    fn test_reporter_publishes_to_subscribers() {
        let reporter = ProgressReporter::new();
        let rx = reporter.subscribe();

        reporter.advance(Preparing, Some(DeploymentStep::Validating), "Validating").unwrap();
        reporter.step(DeploymentStep::Uploading, "Uploading").unwrap();

        let progress = rx.borrow().clone();
        assert_eq!(progress.state, Preparing);
        assert_eq!(progress.step, Some(DeploymentStep::Uploading));
    }

    #[test]
    fn test_reporter_rejects_illegal_transition() {
        let reporter = ProgressReporter::new();
        assert!(reporter.advance(Deploying, None, "skip").is_err());
        assert_eq!(reporter.state(), Idle);
    }

    #[test]
    fn test_begin_claims_idle_reporter_once() {
        let reporter = ProgressReporter::new();
        reporter.begin(DeploymentStep::Validating, "Validating").unwrap();
        assert_eq!(reporter.state(), Preparing);

        reporter.step(DeploymentStep::Uploading, "Uploading").unwrap();
        let err = reporter.begin(DeploymentStep::Validating, "again").unwrap_err();
        assert!(err.to_string().contains("already preparing"), "{}", err);

        let progress = reporter.snapshot();
        assert_eq!(progress.state, Preparing);
        assert_eq!(progress.step, Some(DeploymentStep::Uploading));
    }

    #[test]
    fn test_fail_and_reset() {
        let reporter = ProgressReporter::new();
        reporter.advance(Preparing, None, "").unwrap();
        reporter.fail("Draft failed");
        assert_eq!(reporter.state(), Error);
        assert_eq!(reporter.snapshot().message, "Draft failed");

        reporter.reset();
        assert_eq!(reporter.snapshot(), Progress::default());
    }
}
