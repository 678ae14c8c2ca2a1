//! Content-addressed image layers
//!
//! A layer's hash covers its parent's hash, its kind, its instructions and
//! the digest of whatever files it copies. Changing anything in an earlier
//! layer therefore changes every later hash, and identical inputs always
//! reproduce identical hashes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the short hash used in tags and listings
pub const SHORT_HASH_LEN: usize = 12;

/// Build stage a layer belongs to, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    /// Pinned base runtime
    Base,
    /// Compiler toolchain and headers for native extensions
    OsPackages,
    /// Language dependencies from the manifest
    Dependencies,
    /// Application source and runtime settings
    Source,
}

impl LayerKind {
    /// All kinds in build order
    pub fn all() -> &'static [Self] {
        &[Self::Base, Self::OsPackages, Self::Dependencies, Self::Source]
    }

    /// Stable identifier, also fed into the layer hash
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::OsPackages => "os-packages",
            Self::Dependencies => "dependencies",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One planned image layer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub kind: LayerKind,

    /// Containerfile instructions, in order
    pub instructions: Vec<String>,

    /// Digest of files copied by this layer, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_digest: Option<String>,

    /// Hash of the previous layer (None for the base)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    pub hash: String,
}

impl Layer {
    /// Plan a layer on top of `parent`
    pub fn new(
        kind: LayerKind,
        instructions: Vec<String>,
        content_digest: Option<String>,
        parent: Option<&Layer>,
    ) -> Self {
        let parent = parent.map(|p| p.hash.clone());
        let hash = layer_hash(
            parent.as_deref(),
            kind,
            &instructions,
            content_digest.as_deref(),
        );

        Self {
            kind,
            instructions,
            content_digest,
            parent,
            hash,
        }
    }

    /// First [`SHORT_HASH_LEN`] hex chars of the hash
    pub fn short_hash(&self) -> &str {
        &self.hash[..SHORT_HASH_LEN]
    }
}

fn layer_hash(
    parent: Option<&str>,
    kind: LayerKind,
    instructions: &[String],
    content_digest: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();

    // Every field is length-prefixed so adjacent fields cannot alias
    let mut field = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };

    field(parent.unwrap_or("").as_bytes());
    field(kind.as_str().as_bytes());
    for instruction in instructions {
        field(instruction.as_bytes());
    }
    field(content_digest.unwrap_or("").as_bytes());

    hex::encode(hasher.finalize())
}
