// Prompt composition: persona, context, history and query to one request
use serde::{Deserialize, Serialize};

use crate::cli::config::PersonaConfig;
use crate::rag::context::{AssembledContext, Citation};
use crate::session::{Role, Turn};
use crate::upload::Attachment;

/// Where the behavioral instructions go in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionPlacement {
    /// Dedicated system-instruction slot of the backend
    SystemSlot,
    /// First block of the final user turn
    LeadingUserBlock,
}

impl InstructionPlacement {
    /// Placement for a backend with or without a system slot
    pub fn for_backend(supports_system_instruction: bool) -> Self {
        if supports_system_instruction {
            Self::SystemSlot
        } else {
            Self::LeadingUserBlock
        }
    }
}

/// One piece of a turn's content
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Inline(Attachment),
}

/// One turn as sent to the generation backend
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    role: Role,
    parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

/// Immutable generation request.
///
/// Built once by [`PromptComposer::compose`] and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    system_instruction: Option<String>,
    contents: Vec<Content>,
    history: Vec<Turn>,
    context: String,
    citations: Vec<Citation>,
    query: String,
    attachment: Option<Attachment>,
}

impl GenerationRequest {
    /// Instructions for the system slot, when that placement was chosen
    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    /// History turns followed by the final user turn
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// History snapshot taken at compose time
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Serialized context block
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Every text part of the request, system slot first
    pub fn full_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(system) = &self.system_instruction {
            parts.push(system);
        }
        for content in &self.contents {
            for part in &content.parts {
                if let Part::Text(text) = part {
                    parts.push(text);
                }
            }
        }
        parts.join("\n\n")
    }
}

/// Composes generation requests for one persona
#[derive(Debug, Clone)]
pub struct PromptComposer {
    persona: PersonaConfig,
    placement: InstructionPlacement,
}

impl PromptComposer {
    pub fn new(persona: PersonaConfig, placement: InstructionPlacement) -> Self {
        Self { persona, placement }
    }

    pub fn placement(&self) -> InstructionPlacement {
        self.placement
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    /// Build the request for `query`.
    ///
    /// `history` must not include the in-flight user turn.
    pub fn compose(
        &self,
        context: &AssembledContext,
        history: &[Turn],
        query: &str,
    ) -> GenerationRequest {
        let instructions = self.instructions(&context.text);

        let mut user_text = String::new();
        if self.placement == InstructionPlacement::LeadingUserBlock {
            user_text.push_str(&instructions);
            user_text.push_str("\n\n");
        }
        if let Some(upload) = &context.uploaded {
            user_text.push_str(&format!(
                "{}\n{}\n\n",
                self.persona.upload_heading,
                upload.summary()
            ));
        }
        user_text.push_str(&format!("{} {}", self.persona.question_label, query));

        let attachment = context
            .uploaded
            .as_ref()
            .and_then(|u| u.attachment())
            .cloned();

        let mut user_parts = vec![Part::Text(user_text)];
        if let Some(attachment) = &attachment {
            user_parts.push(Part::Inline(attachment.clone()));
        }

        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content::new(turn.role(), vec![Part::Text(turn.text().to_string())]))
            .collect();
        contents.push(Content::new(Role::User, user_parts));

        let system_instruction = match self.placement {
            InstructionPlacement::SystemSlot => Some(instructions),
            InstructionPlacement::LeadingUserBlock => None,
        };

        GenerationRequest {
            system_instruction,
            contents,
            history: history.to_vec(),
            context: context.text.clone(),
            citations: context.citations.clone(),
            query: query.to_string(),
            attachment,
        }
    }

    /// Persona statement, context block and numbered directives
    fn instructions(&self, context_text: &str) -> String {
        let directives = self
            .persona
            .directives
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{}. {}", i + 1, d))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\n{}\n{}\n\n{}\n{}",
            self.persona.persona,
            self.persona.context_heading,
            context_text,
            self.persona.directives_heading,
            directives
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::context::ContextBuilder;
    use crate::upload::UploadContext;
    use crate::vector_db::{MatchMetadata, RetrievalMatch};

    fn context_with(upload: Option<&UploadContext>) -> AssembledContext {
        let hit = RetrievalMatch::new(
            "1",
            0.9,
            MatchMetadata {
                source: "manual_a".into(),
                page: 12,
                text: "kiln inlet O2 target".into(),
            },
        );
        ContextBuilder::new().assemble(&[hit], upload)
    }

    fn composer(placement: InstructionPlacement) -> PromptComposer {
        PromptComposer::new(PersonaConfig::default(), placement)
    }

    #[test]
    fn test_placement_from_capability() {
        assert_eq!(InstructionPlacement::for_backend(true), InstructionPlacement::SystemSlot);
        assert_eq!(
            InstructionPlacement::for_backend(false),
            InstructionPlacement::LeadingUserBlock
        );
    }

    #[test]
    fn test_system_slot_placement() {
        let request = composer(InstructionPlacement::SystemSlot).compose(
            &context_with(None),
            &[],
            "f-CaO가 높은 이유는?",
        );

        let system = request.system_instruction().unwrap();
        assert!(system.starts_with(&PersonaConfig::default().persona));
        assert!(system.contains("kiln inlet O2 target"));
        assert!(system.contains("1. **심층적 인과관계 분석**"));
        assert!(system.contains("5. **전문가적 제언**"));

        assert_eq!(request.contents().len(), 1);
        match &request.contents()[0].parts()[0] {
            Part::Text(text) => assert_eq!(text, "최종 질문: f-CaO가 높은 이유는?"),
            other => panic!("unexpected part {:?}", other),
        }
    }

    #[test]
    fn test_leading_user_block_placement() {
        let request = composer(InstructionPlacement::LeadingUserBlock).compose(
            &context_with(None),
            &[],
            "question",
        );

        assert!(request.system_instruction().is_none());
        match &request.contents()[0].parts()[0] {
            Part::Text(text) => {
                assert!(text.starts_with(&PersonaConfig::default().persona));
                assert!(text.ends_with("최종 질문: question"));
            }
            other => panic!("unexpected part {:?}", other),
        }
    }

    #[test]
    fn test_history_precedes_final_turn() {
        let history = vec![Turn::user("first"), Turn::assistant("answer")];
        let request = composer(InstructionPlacement::SystemSlot).compose(
            &context_with(None),
            &history,
            "second",
        );

        let roles: Vec<Role> = request.contents().iter().map(|c| c.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.history().len(), 2);
    }

    #[test]
    fn test_upload_summary_and_attachment() {
        let upload = UploadContext::note("data.csv", "Rows: 100, Columns: 5");
        let request = composer(InstructionPlacement::SystemSlot).compose(
            &context_with(Some(&upload)),
            &[],
            "q",
        );

        let text = request.full_text();
        assert!(text.contains("[Uploaded file context]\nRows: 100, Columns: 5"));
        assert!(request.attachment().is_none());
        assert_eq!(request.citations(), &[Citation::new("manual_a", 12)]);
    }

    #[test]
    fn test_inline_attachment_follows_text() {
        let upload = UploadContext::with_attachment(
            "kiln.png",
            "Type: image",
            Attachment::new("image/png", vec![1, 2, 3]),
        );
        let request = composer(InstructionPlacement::SystemSlot).compose(
            &context_with(Some(&upload)),
            &[],
            "q",
        );

        let parts = request.contents()[0].parts();
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[1], Part::Inline(a) if a.mime_type() == "image/png"));
        assert!(request.attachment().is_some());
    }
}
