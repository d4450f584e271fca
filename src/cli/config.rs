//! Configuration management for ragbuddy
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.ragbuddy/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{RagError, Result};

/// Lowest sampling temperature the advisor accepts
pub const MIN_TEMPERATURE: f32 = 0.1;

/// Highest sampling temperature the advisor accepts
pub const MAX_TEMPERATURE: f32 = 0.4;

/// Complete configuration for ragbuddy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Target output dimensionality; must equal the index dimension
    pub dimension: usize,
    pub base_url: String,
}

/// Which vector index service holds the knowledge store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    Pinecone,
    Qdrant,
}

/// Vector index and retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: IndexBackend,
    /// Pinecone index name (resolved to a data-plane host at startup)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pinecone data-plane host, skips name resolution when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Qdrant server URL
    pub qdrant_url: String,
    /// Qdrant collection holding the documents
    pub collection: String,
    pub top_k: usize,
}

/// Generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model identifiers tried in order when one is unavailable
    pub models: Vec<String>,
    pub base_url: String,
}

/// Behavioral instructions and wording of the advisor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub temperature: f32,
    /// Let the model run a live web search during generation
    pub live_search: bool,
    pub persona: String,
    pub context_heading: String,
    pub directives_heading: String,
    pub directives: Vec<String>,
    pub upload_heading: String,
    pub question_label: String,
    /// Label in front of each retrieved passage
    pub source_label: String,
    /// Heading of the citation section appended to answers
    pub sources_heading: String,
}

/// What to do when retrieval finds nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroMatchPolicy {
    /// Generate from general and live-search knowledge only
    Proceed,
    /// Answer with `no_match_message` without calling the model
    ShortCircuit,
}

/// Orchestration knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub zero_match_policy: ZeroMatchPolicy,
    pub no_match_message: String,
    /// Timeout for the embed and retrieve stages
    pub stage_timeout_secs: u64,
    /// Timeout for the generate stage
    pub generation_timeout_secs: u64,
}

/// File system paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub state_dir: String,
    pub log_dir: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "gemini-embedding-001".to_string(),
            dimension: 768,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Pinecone,
            name: None,
            host: None,
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "documents".to_string(),
            top_k: 15,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "gemini-3-flash-preview".to_string(),
                "gemini-2.5-flash".to_string(),
            ],
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            live_search: true,
            persona: "당신은 30년 경력의 세계 최고 시멘트 생산 및 품질 관리 기술 고문입니다.\n\
                      관리자와의 대화 흐름을 완벽히 파악하여, 이전 질문에서 다룬 맥락을 유지하며 답변하세요."
                .to_string(),
            context_heading: "- 이번 질문에 대한 전문 문서 근거:".to_string(),
            directives_heading: "[필수 응답 지침]".to_string(),
            directives: vec![
                "**심층적 인과관계 분석**: 표면적인 현상(예: f-CaO 상승) 이면에 숨겨진 열역학적, 화학적 메커니즘을 상세히 설명하세요. 복합적인 변수들 간의 상관관계를 파악하여 기술하세요.".to_string(),
                "**풍부한 지식 활용**: 제공된 기술 문서 내용을 꼼꼼히 검토하여 수치, 화학식($CaO$, $C_3S$ 등), 설비 사양을 구체적으로 인용하며 신뢰도를 높이세요.".to_string(),
                "**자유롭고 상세한 서술**: 전문가가 직접 보고서를 작성하듯 논리적이고 유려하게 답변하세요. 전체적인 설명의 깊이를 최우선으로 하여 최소 1000자 이상 상세히 서술하세요.".to_string(),
                "**하이브리드 지식 결합**: 문서에 없는 내용은 실시간 웹 검색 정보를 활용하고, 당신의 공학적 추론을 결합하여 'Deep Insight'를 제공하세요.".to_string(),
                "**전문가적 제언**: 관리자가 미처 생각하지 못한 공정상의 유연성(Buffer), 설비 안정성, 원료 균일성 등의 관점에서 능동적인 조언을 아끼지 마세요.".to_string(),
            ],
            upload_heading: "[Uploaded file context]".to_string(),
            question_label: "최종 질문:".to_string(),
            source_label: "출처".to_string(),
            sources_heading: "**📌 참조 문서:**".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            zero_match_policy: ZeroMatchPolicy::Proceed,
            no_match_message: "관련 문서를 찾지 못했습니다. 질문을 더 구체적으로 입력해 주세요."
                .to_string(),
            stage_timeout_secs: 30,
            generation_timeout_secs: 180,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: "~/.ragbuddy".to_string(),
            log_dir: "~/.ragbuddy/logs".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".ragbuddy").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(RagError::Configuration(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }

        if self.index.top_k == 0 {
            return Err(RagError::Configuration(
                "index.top_k must be greater than 0".to_string(),
            ));
        }

        if self.generation.models.iter().all(|m| m.trim().is_empty()) {
            return Err(RagError::Configuration(
                "generation.models must name at least one model".to_string(),
            ));
        }

        let t = self.persona.temperature;
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t) {
            return Err(RagError::Configuration(format!(
                "persona.temperature must be between {} and {}, got {}",
                MIN_TEMPERATURE, MAX_TEMPERATURE, t
            )));
        }

        if self.pipeline.stage_timeout_secs == 0 || self.pipeline.generation_timeout_secs == 0 {
            return Err(RagError::Configuration(
                "pipeline timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RagError::Configuration(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Configuration(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get state directory path
    pub fn state_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.state_dir)
    }

    /// Get log directory path
    pub fn log_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.log_dir)
    }
}
