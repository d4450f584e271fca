//! Service credentials, read from the environment at startup
//!
//! Secrets never live in config.toml. They come from the process
//! environment, optionally seeded from a `.env` file. Anything missing here
//! is a configuration error and stops the process before a query is served.

use std::path::{Path, PathBuf};

use crate::cli::config::{IndexBackend, RetrievalConfig};
use crate::errors::{RagError, Result};

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";
pub const PINECONE_INDEX_NAME: &str = "PINECONE_INDEX_NAME";
pub const PINECONE_INDEX_HOST: &str = "PINECONE_INDEX_HOST";
pub const QDRANT_URL: &str = "QDRANT_URL";
pub const QDRANT_API_KEY: &str = "QDRANT_API_KEY";

/// Load a `.env` file into the process environment.
///
/// Variables that are already set win over the file. Without `path` the
/// file is searched for from the working directory upwards. Returns the
/// file that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenv::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenv::dotenv().ok(),
    }
}

/// Where and how to reach the vector index
#[derive(Clone, PartialEq, Eq)]
pub enum IndexCredentials {
    Pinecone {
        api_key: String,
        /// Data-plane host, when known up front
        host: Option<String>,
        /// Index name, resolved to a host when `host` is absent
        name: Option<String>,
    },
    Qdrant {
        url: String,
        api_key: Option<String>,
        collection: String,
    },
}

/// All secrets the pipeline needs
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub index: IndexCredentials,
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env(index: &RetrievalConfig) -> Result<Self> {
        Self::from_lookup(index, |key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary key lookup
    pub fn from_lookup<F>(index: &RetrievalConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = get(GEMINI_API_KEY)
            .ok_or_else(|| RagError::Configuration(format!("{} is not set", GEMINI_API_KEY)))?;

        let index = match index.backend {
            IndexBackend::Pinecone => {
                let api_key = get(PINECONE_API_KEY).ok_or_else(|| {
                    RagError::Configuration(format!("{} is not set", PINECONE_API_KEY))
                })?;
                let host = get(PINECONE_INDEX_HOST).or_else(|| index.host.clone());
                let name = get(PINECONE_INDEX_NAME).or_else(|| index.name.clone());
                if host.is_none() && name.is_none() {
                    return Err(RagError::Configuration(format!(
                        "set {} or {} (or index.host / index.name in config)",
                        PINECONE_INDEX_NAME, PINECONE_INDEX_HOST
                    )));
                }
                IndexCredentials::Pinecone { api_key, host, name }
            }
            IndexBackend::Qdrant => IndexCredentials::Qdrant {
                url: get(QDRANT_URL).unwrap_or_else(|| index.qdrant_url.clone()),
                api_key: get(QDRANT_API_KEY),
                collection: index.collection.clone(),
            },
        };

        Ok(Self {
            gemini_api_key,
            index,
        })
    }
}

// Keys stay out of logs and panics.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"***")
            .field("index", &self.index)
            .finish()
    }
}

impl std::fmt::Debug for IndexCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexCredentials::Pinecone { host, name, .. } => f
                .debug_struct("Pinecone")
                .field("host", host)
                .field("name", name)
                .finish_non_exhaustive(),
            IndexCredentials::Qdrant { url, collection, .. } => f
                .debug_struct("Qdrant")
                .field("url", url)
                .field("collection", collection)
                .finish_non_exhaustive(),
        }
    }
}
