// Context assembly: ranked passages to a context block plus citations
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::cli::config::PersonaConfig;
use crate::upload::UploadContext;
use crate::vector_db::RetrievalMatch;

/// One referenced document page.
///
/// Ordering is lexicographic on (source, page), which fixes the order the
/// citation section is printed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub page: i64,
}

impl Citation {
    pub fn new(source: impl Into<String>, page: i64) -> Self {
        Self {
            source: source.into(),
            page,
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (P.{})", self.source, self.page)
    }
}

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Label in front of each passage, e.g. `출처`
    pub source_label: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            source_label: PersonaConfig::default().source_label,
        }
    }
}

impl From<&PersonaConfig> for ContextConfig {
    fn from(persona: &PersonaConfig) -> Self {
        Self {
            source_label: persona.source_label.clone(),
        }
    }
}

/// Assembled context for one exchange
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Passages in retrieval rank order
    pub text: String,
    /// Unique (source, page) pairs, sorted
    pub citations: Vec<Citation>,
    /// Uploaded-file summary staged for this exchange
    pub uploaded: Option<UploadContext>,
    /// Number of passages included
    pub match_count: usize,
}

impl AssembledContext {
    /// True when there is neither a passage nor an upload
    pub fn is_empty(&self) -> bool {
        self.match_count == 0 && self.uploaded.is_none()
    }
}

/// Context builder for assembling RAG context
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build the context block from ranked matches.
    ///
    /// Passage order follows `matches`; citations do not.
    pub fn assemble(
        &self,
        matches: &[RetrievalMatch],
        uploaded: Option<&UploadContext>,
    ) -> AssembledContext {
        let mut text = String::new();
        let mut citations = BTreeSet::new();

        for m in matches {
            let meta = &m.metadata;
            text.push_str(&format!(
                "\n[{}: {} (P.{})]\n{}\n---",
                self.config.source_label, meta.source, meta.page, meta.text
            ));
            citations.insert(Citation::new(meta.source.clone(), meta.page));
        }

        AssembledContext {
            text,
            citations: citations.into_iter().collect(),
            uploaded: uploaded.cloned(),
            match_count: matches.len(),
        }
    }
}
