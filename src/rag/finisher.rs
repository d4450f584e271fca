// Response finishing: citation section and assistant turn commit
use crate::cli::config::PersonaConfig;
use crate::generation::GenerationResult;
use crate::rag::context::Citation;
use crate::session::{SessionState, Turn};

/// Appends citations and records the assistant turn
#[derive(Debug, Clone)]
pub struct ResponseFinisher {
    sources_heading: String,
}

impl ResponseFinisher {
    pub fn new(sources_heading: impl Into<String>) -> Self {
        Self {
            sources_heading: sources_heading.into(),
        }
    }

    /// Generated text followed by one `- source (P.page)` line per citation.
    ///
    /// No section is added when there are no citations.
    pub fn render(&self, text: &str, citations: &[Citation]) -> String {
        if citations.is_empty() {
            return text.to_string();
        }

        let lines = citations
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n\n{}\n{}", text, self.sources_heading, lines)
    }

    /// Render `result` and commit it as the assistant turn
    pub fn finish(&self, session: &mut SessionState, result: &GenerationResult) -> String {
        let finished = self.render(&result.text, &result.citations);
        session.append(Turn::assistant(finished.clone()));
        finished
    }
}

impl From<&PersonaConfig> for ResponseFinisher {
    fn from(persona: &PersonaConfig) -> Self {
        Self::new(persona.sources_heading.clone())
    }
}

impl Default for ResponseFinisher {
    fn default() -> Self {
        Self::from(&PersonaConfig::default())
    }
}
