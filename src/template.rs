//! Chat-turn prompt template and assistant-segment extraction.

use serde::{Deserialize, Serialize};

/// Turn markers wrapped around every prompt before generation.
///
/// Rendering is a pure function of the prompt; the template is `Send + Sync`
/// and can be shared across a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTemplate {
    pub user_open: String,
    pub turn_close: String,
    pub assistant_open: String,
    /// Completions are cut after this marker when it shows up in the output.
    pub assistant_marker: String,
}

impl Default for ChatTemplate {
    fn default() -> Self {
        Self {
            user_open: "<start_of_turn>user\n".to_string(),
            turn_close: "\n<end_of_turn>\n".to_string(),
            assistant_open: "<start_of_turn>model\n".to_string(),
            assistant_marker: "Assistant:".to_string(),
        }
    }
}

/// Result of pulling the answer out of one raw completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    /// `false` when the marker was absent and the raw text was used as-is.
    pub marker_found: bool,
}

impl ChatTemplate {
    pub fn render(&self, query: &str) -> String {
        format!(
            "{}{}{}{}",
            self.user_open, query, self.turn_close, self.assistant_open
        )
    }

    pub fn render_all<S: AsRef<str>>(&self, queries: &[S]) -> Vec<String> {
        queries.iter().map(|q| self.render(q.as_ref())).collect()
    }

    /// Text after the first assistant marker, trimmed; the whole trimmed
    /// completion when the marker is missing.
    pub fn extract(&self, raw: &str) -> Extracted {
        let raw = raw.trim();
        match raw.split_once(self.assistant_marker.as_str()) {
            Some((_, answer)) if !self.assistant_marker.is_empty() => Extracted {
                text: answer.trim().to_string(),
                marker_found: true,
            },
            _ => Extracted {
                text: raw.to_string(),
                marker_found: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_turn_markers() {
        let t = ChatTemplate::default();
        assert_eq!(
            t.render("What is Rust?"),
            "<start_of_turn>user\nWhat is Rust?\n<end_of_turn>\n<start_of_turn>model\n"
        );
    }

    #[test]
    fn extracts_after_marker() {
        let t = ChatTemplate::default();
        let e = t.extract("  User: hi\nAssistant:  Hello there. Assistant: again \n");
        assert!(e.marker_found);
        assert_eq!(e.text, "Hello there. Assistant: again");
    }

    #[test]
    fn falls_back_to_raw_text() {
        let t = ChatTemplate::default();
        let e = t.extract("\n  plain answer  \n");
        assert!(!e.marker_found);
        assert_eq!(e.text, "plain answer");
    }

    #[test]
    fn empty_completion_stays_empty() {
        let e = ChatTemplate::default().extract("   ");
        assert_eq!(e.text, "");
        assert!(!e.marker_found);
    }
}
