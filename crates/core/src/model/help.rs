use serde::{Deserialize, Serialize};

/// Help content returned by the collaborator for a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpResponse {
    pub help_content: String,
    pub thinking_process: String,
    pub solution_steps: Vec<String>,
    /// Set by the collaborator when the content came from an LLM fallback
    /// path rather than the primary model.
    #[serde(default)]
    pub is_fallback: bool,
}

impl HelpResponse {
    /// A usable response has non-empty content, a non-empty thinking trace,
    /// and at least one non-empty solution step.
    #[must_use]
    pub fn is_structurally_complete(&self) -> bool {
        !self.help_content.trim().is_empty()
            && !self.thinking_process.trim().is_empty()
            && !self.solution_steps.is_empty()
            && self.solution_steps.iter().all(|step| !step.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> HelpResponse {
        HelpResponse {
            help_content: "Line the digits up by place value.".into(),
            thinking_process: "Add the ones column first.".into(),
            solution_steps: vec!["2 + 4 = 6".into(), "1 + 3 = 4".into()],
            is_fallback: false,
        }
    }

    #[test]
    fn complete_response_passes() {
        assert!(complete().is_structurally_complete());
    }

    #[test]
    fn blank_content_fails() {
        let mut response = complete();
        response.help_content = "   ".into();
        assert!(!response.is_structurally_complete());
    }

    #[test]
    fn empty_steps_fail() {
        let mut response = complete();
        response.solution_steps.clear();
        assert!(!response.is_structurally_complete());

        let mut response = complete();
        response.solution_steps = vec![String::new()];
        assert!(!response.is_structurally_complete());
    }
}
