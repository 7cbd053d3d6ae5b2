//! Teardown state machine types.

use serde::Serialize;

/// Steps of teardown, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStep {
    Resolving,
    DeletingInstance,
    DeletingResourceGroup,
    DeletingKeyPair,
    Done,
}

impl TeardownStep {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Resolving => "resolve record",
            Self::DeletingInstance => "instance",
            Self::DeletingResourceGroup => "resource group",
            Self::DeletingKeyPair => "key pair",
            Self::Done => "done",
        }
    }
}

/// What happened to one owned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum StepResult {
    /// Deleted by this run and confirmed gone.
    Deleted,
    /// Nothing to delete: never created or already removed.
    AlreadyGone,
    /// Not attempted because a prerequisite step did not finish.
    Skipped(String),
    Failed(String),
}

impl StepResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Deleted | Self::AlreadyGone)
    }
}

/// Terminal state of one teardown run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TeardownState {
    Done,
    Failed { step: TeardownStep, reason: String },
}

/// Per-step record of a teardown run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub name: String,
    pub steps: Vec<(TeardownStep, StepResult)>,
}

impl TeardownReport {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: TeardownStep, result: StepResult) {
        self.steps.push((step, result));
    }

    #[must_use]
    pub fn result_of(&self, step: TeardownStep) -> Option<&StepResult> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, r)| r)
    }

    /// `Done` only when every attempted step succeeded; otherwise the first
    /// step that did not.
    #[must_use]
    pub fn state(&self) -> TeardownState {
        self.steps
            .iter()
            .find(|(_, r)| !r.is_ok())
            .map_or(TeardownState::Done, |(step, r)| TeardownState::Failed {
                step: *step,
                reason: match r {
                    StepResult::Failed(reason) | StepResult::Skipped(reason) => reason.clone(),
                    StepResult::Deleted | StepResult::AlreadyGone => String::new(),
                },
            })
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == TeardownState::Done
    }
}
