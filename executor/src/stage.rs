//! Pipeline stages and the trace of one run.

use std::fmt;

use intentroute_common::{IntentError, Result, TxHash};
use serde::Serialize;

/// Stage of a transaction pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Init,
    Validate,
    Wrap,
    Build,
    BalanceCheck,
    Approve,
    Execute,
    Invalidate,
    Done,
    Failed,
}

impl PipelineStage {
    /// Check if a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (*self, next),
            (Init, Validate)
                | (Validate, Wrap)
                | (Validate, Build)
                | (Wrap, Build)
                | (Build, BalanceCheck)
                | (BalanceCheck, Approve)
                | (BalanceCheck, Execute)
                | (Approve, Execute)
                | (Execute, Invalidate)
                | (Execute, Done)
                | (Invalidate, Done)
        )
    }

    /// Check if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    /// Stage name as it appears in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Init => "INIT",
            PipelineStage::Validate => "VALIDATE",
            PipelineStage::Wrap => "WRAP",
            PipelineStage::Build => "BUILD",
            PipelineStage::BalanceCheck => "BALANCE_CHECK",
            PipelineStage::Approve => "APPROVE",
            PipelineStage::Execute => "EXECUTE",
            PipelineStage::Invalidate => "INVALIDATE",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages visited by one pipeline run, plus side transaction hashes.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTrace {
    stages: Vec<PipelineStage>,
    /// Hash of the native wrap transaction.
    pub wrap_hash: Option<TxHash>,
    /// Hash of the approval transaction.
    pub approval_hash: Option<TxHash>,
}

impl PipelineTrace {
    /// Start a trace at `Init`.
    pub fn new() -> Self {
        Self {
            stages: vec![PipelineStage::Init],
            wrap_hash: None,
            approval_hash: None,
        }
    }

    /// Current stage.
    pub fn current(&self) -> PipelineStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(PipelineStage::Init)
    }

    /// Every stage visited, in order.
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Whether the run passed through `stage`.
    pub fn visited(&self, stage: PipelineStage) -> bool {
        self.stages.contains(&stage)
    }

    /// Move to the next stage.
    pub fn advance(&mut self, next: PipelineStage) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(IntentError::transaction_failed(
                current.as_str(),
                format!("invalid pipeline transition {} -> {}", current, next),
            ));
        }
        self.stages.push(next);
        Ok(())
    }

    /// Mark the run failed, returning the stage it failed in.
    pub fn fail(&mut self) -> PipelineStage {
        let current = self.current();
        if !current.is_terminal() {
            self.stages.push(PipelineStage::Failed);
        }
        current
    }
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineStage::*;

    #[test]
    fn test_full_path() {
        let mut trace = PipelineTrace::new();
        for stage in [Validate, Wrap, Build, BalanceCheck, Approve, Execute, Invalidate, Done] {
            trace.advance(stage).unwrap();
        }
        assert_eq!(trace.current(), Done);
        assert_eq!(trace.stages().len(), 9);
    }

    #[test]
    fn test_optional_stages_can_be_skipped() {
        let mut trace = PipelineTrace::new();
        for stage in [Validate, Build, BalanceCheck, Execute, Done] {
            trace.advance(stage).unwrap();
        }
        assert!(!trace.visited(Approve));
        assert!(!trace.visited(Wrap));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Init.can_transition_to(Execute));
        assert!(!BalanceCheck.can_transition_to(Build));
        assert!(!Approve.can_transition_to(Done));

        let mut trace = PipelineTrace::new();
        assert!(trace.advance(Execute).is_err());
        assert_eq!(trace.current(), Init);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut trace = PipelineTrace::new();
        trace.advance(Validate).unwrap();

        assert_eq!(trace.fail(), Validate);
        assert_eq!(trace.current(), Failed);
        assert!(!Failed.can_transition_to(Init));
        assert!(!Done.can_transition_to(Failed));
    }
}
