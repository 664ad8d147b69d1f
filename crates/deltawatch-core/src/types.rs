//! Delta data model and the request/acknowledgment wire shapes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file reported as modified by the watcher
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangedFile {
    path: PathBuf,
}

impl ChangedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// One compiled delta for a single module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdate {
    /// Identifier of the module the delta targets
    pub module_id: Uuid,
    /// Intermediate bytecode delta
    #[serde(with = "base64_bytes")]
    pub il_delta: Vec<u8>,
    /// Metadata delta
    #[serde(with = "base64_bytes")]
    pub metadata_delta: Vec<u8>,
    /// Tokens of the methods touched by this delta
    pub updated_methods: Vec<i32>,
}

impl ModuleUpdate {
    pub fn new(module_id: Uuid, il_delta: Vec<u8>, metadata_delta: Vec<u8>) -> Self {
        Self {
            module_id,
            il_delta,
            metadata_delta,
            updated_methods: Vec::new(),
        }
    }

    pub fn with_updated_methods(mut self, tokens: impl IntoIterator<Item = i32>) -> Self {
        self.updated_methods.extend(tokens);
        self
    }
}

/// All deltas produced by one compilation pass, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleUpdateBatch(Vec<ModuleUpdate>);

impl ModuleUpdateBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[ModuleUpdate] {
        &self.0
    }
}

impl From<Vec<ModuleUpdate>> for ModuleUpdateBatch {
    fn from(updates: Vec<ModuleUpdate>) -> Self {
        Self(updates)
    }
}

impl FromIterator<ModuleUpdate> for ModuleUpdateBatch {
    fn from_iter<I: IntoIterator<Item = ModuleUpdate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Request sent to the target process.
///
/// Serialized as a single JSON object with no length prefix; readers rely on
/// the object's own structure to find where it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub changed_file: String,
    pub deltas: ModuleUpdateBatch,
}

impl UpdatePayload {
    pub fn new(changed_file: &ChangedFile, deltas: &ModuleUpdateBatch) -> Self {
        Self {
            changed_file: changed_file.path().to_string_lossy().into_owned(),
            deltas: deltas.clone(),
        }
    }

    /// Encode for the wire
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Outcome reported by the target after applying a batch.
///
/// Encoded on the wire as exactly one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyResult {
    Failed = 0,
    Success = 1,
    SuccessRefreshBrowser = 2,
}

impl ApplyResult {
    /// Decode an acknowledgment byte. Anything other than 1 or 2 is a failure.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => ApplyResult::Success,
            2 => ApplyResult::SuccessRefreshBrowser,
            _ => ApplyResult::Failed,
        }
    }

    /// Decode the outcome of an acknowledgment read; a missing byte is a failure.
    pub fn from_ack(ack: Option<u8>) -> Self {
        ack.map_or(ApplyResult::Failed, Self::from_byte)
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        !matches!(self, ApplyResult::Failed)
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyResult::Failed => write!(f, "failed"),
            ApplyResult::Success => write!(f, "success"),
            ApplyResult::SuccessRefreshBrowser => write!(f, "success (refresh browser)"),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
