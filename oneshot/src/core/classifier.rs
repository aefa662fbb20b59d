//! Heuristic classification of agent output into progress stages.
//!
//! The agent streams free text, so stages are inferred from substrings. All of
//! the heuristics live here; the orchestrator only sees stage transitions.

use crate::core::types::Stage;

/// Lowercase substrings that indicate the agent is acting on the workspace.
///
/// Matching is case-insensitive against each output chunk.
pub const ACTION_KEYWORDS: &[&str] = &[
    "creating",
    "created",
    "writing",
    "wrote",
    "editing",
    "edited",
    "updating",
    "updated",
    "modifying",
    "modified",
    "adding",
    "added",
    "deleting",
    "deleted",
    "running",
    "implementing",
    "refactoring",
    "fixing",
    "fixed",
];

/// Coarse agent phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgentPhase {
    Init,
    Thinking,
    Executing,
}

impl AgentPhase {
    pub fn stage(self) -> Stage {
        match self {
            AgentPhase::Init => Stage::ClaudeInit,
            AgentPhase::Thinking => Stage::ClaudeThinking,
            AgentPhase::Executing => Stage::ClaudeExecuting,
        }
    }
}

/// Monotonic stage tracker: `Init -> Thinking -> Executing`, never backwards.
#[derive(Debug, Clone)]
pub struct StageClassifier {
    phase: AgentPhase,
}

impl Default for StageClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StageClassifier {
    pub fn new() -> Self {
        Self {
            phase: AgentPhase::Init,
        }
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Record that the prompt reached the agent's input stream.
    ///
    /// Returns the new stage if this caused a transition.
    pub fn prompt_delivered(&mut self) -> Option<Stage> {
        self.advance(AgentPhase::Thinking)
    }

    /// Classify one output chunk. Returns the new stage on a transition.
    pub fn observe(&mut self, chunk: &str) -> Option<Stage> {
        if chunk.trim().is_empty() {
            return None;
        }
        if contains_action_keyword(chunk) {
            return self.advance(AgentPhase::Executing);
        }
        self.advance(AgentPhase::Thinking)
    }

    fn advance(&mut self, next: AgentPhase) -> Option<Stage> {
        if next <= self.phase {
            return None;
        }
        self.phase = next;
        Some(next.stage())
    }
}

/// True if `chunk` contains any entry of [`ACTION_KEYWORDS`].
pub fn contains_action_keyword(chunk: &str) -> bool {
    let lower = chunk.to_lowercase();
    ACTION_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_output_moves_to_thinking() {
        let mut classifier = StageClassifier::new();
        assert_eq!(classifier.observe("   \n"), None);
        assert_eq!(
            classifier.observe("Let me look at the code"),
            Some(Stage::ClaudeThinking)
        );
        assert_eq!(classifier.observe("still reading"), None);
    }

    #[test]
    fn action_keyword_moves_to_executing() {
        let mut classifier = StageClassifier::new();
        classifier.observe("Looking around");
        assert_eq!(
            classifier.observe("Editing src/login.ts"),
            Some(Stage::ClaudeExecuting)
        );
        assert_eq!(classifier.phase(), AgentPhase::Executing);
    }

    #[test]
    fn executing_never_reverts() {
        let mut classifier = StageClassifier::new();
        classifier.observe("Created file");
        assert_eq!(classifier.observe("thinking again"), None);
        assert_eq!(classifier.prompt_delivered(), None);
        assert_eq!(classifier.phase(), AgentPhase::Executing);
    }

    #[test]
    fn prompt_delivery_only_transitions_once() {
        let mut classifier = StageClassifier::new();
        assert_eq!(classifier.prompt_delivered(), Some(Stage::ClaudeThinking));
        assert_eq!(classifier.observe("hello"), None);
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        assert!(contains_action_keyword("UPDATED README"));
        assert!(!contains_action_keyword("nothing to see"));
    }
}
