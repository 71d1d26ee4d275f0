//! Target-build profile: page size, segment signatures and carrier layout.
//!
//! Everything that ties the toolkit to one particular firmware or runtime
//! build lives here as plain data. Supporting another build means loading a
//! different profile, not changing code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{ProbeError, Result};

/// Default target page size (16 KiB).
pub const DEFAULT_PAGE_SIZE: u64 = 0x4000;

/// Largest accepted page size (4 GiB).
pub const MAX_PAGE_SIZE: u64 = 1 << 32;

/// Which kind of loaded segment a signature identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Executable code ("text")
    Code,
    /// Initialised data
    Data,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Code => write!(f, "code"),
            SegmentKind::Data => write!(f, "data"),
        }
    }
}

/// Direction of a page-by-page search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards lower addresses
    Backward,
    /// Towards higher addresses
    Forward,
}

impl Direction {
    /// Signed step for one page in this direction.
    pub fn step(&self, page_size: u64) -> i64 {
        match self {
            Direction::Backward => -(page_size as i64),
            Direction::Forward => page_size as i64,
        }
    }
}

/// The first 16 bytes expected at a segment boundary, as two
/// little-endian 64-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MagicSignature {
    pub words: [u64; 2],
}

impl MagicSignature {
    pub const LEN: usize = 16;

    pub const fn new(first: u64, second: u64) -> Self {
        Self {
            words: [first, second],
        }
    }

    /// Build from the raw 16 bytes as they appear in memory.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut first = [0u8; 8];
        let mut second = [0u8; 8];
        first.copy_from_slice(&bytes[..8]);
        second.copy_from_slice(&bytes[8..]);
        Self::new(u64::from_le_bytes(first), u64::from_le_bytes(second))
    }

    /// Parse a 32 hex digit string of the in-memory bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim())
            .map_err(|e| ProbeError::Config(format!("bad signature hex {:?}: {}", s, e)))?;
        let bytes: [u8; 16] = raw.try_into().map_err(|v: Vec<u8>| {
            ProbeError::Config(format!("signature must be 16 bytes, got {}", v.len()))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Signature bytes in memory order.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.words[0].to_le_bytes());
        out[8..].copy_from_slice(&self.words[1].to_le_bytes());
        out
    }

    /// Exact comparison of both words.
    pub fn matches(&self, first: u64, second: u64) -> bool {
        self.words[0] == first && self.words[1] == second
    }
}

impl fmt::Display for MagicSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl TryFrom<String> for MagicSignature {
    type Error = ProbeError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<MagicSignature> for String {
    fn from(sig: MagicSignature) -> Self {
        sig.to_string()
    }
}

/// One active signature per segment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    pub code: MagicSignature,
    pub data: MagicSignature,
}

impl SignatureSet {
    /// Signature for `kind`.
    pub fn get(&self, kind: SegmentKind) -> &MagicSignature {
        match kind {
            SegmentKind::Code => &self.code,
            SegmentKind::Data => &self.data,
        }
    }
}

/// Field offsets inside the host runtime's buffer-view object, plus the
/// mode tag meaning "no separate backing buffer object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierLayout {
    /// Backing-data pointer field (64-bit)
    pub vector_offset: u64,
    /// Length field (32-bit)
    pub length_offset: u64,
    /// Allocation mode tag field (32-bit)
    pub mode_offset: u64,
    /// Mode tag value for a fast view with no separate backing buffer
    pub fast_mode: u32,
}

impl Default for CarrierLayout {
    fn default() -> Self {
        Self {
            vector_offset: 0x10,
            length_offset: 0x18,
            mode_offset: 0x1c,
            fast_mode: 0,
        }
    }
}

/// Complete description of one target build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Human-readable build identifier
    #[serde(default)]
    pub name: String,
    /// Target page size in bytes
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub signatures: SignatureSet,
    #[serde(default)]
    pub layout: CarrierLayout,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl TargetProfile {
    /// Profile with default page size and carrier layout.
    pub fn new(name: impl Into<String>, signatures: SignatureSet) -> Self {
        Self {
            name: name.into(),
            page_size: DEFAULT_PAGE_SIZE,
            signatures,
            layout: CarrierLayout::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_layout(mut self, layout: CarrierLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        validate_page_size(self.page_size)?;
        let l = &self.layout;
        if l.vector_offset % 8 != 0 || l.length_offset % 4 != 0 || l.mode_offset % 4 != 0 {
            return Err(ProbeError::Config(format!(
                "misaligned carrier layout: vector={:#x} length={:#x} mode={:#x}",
                l.vector_offset, l.length_offset, l.mode_offset
            )));
        }
        Ok(())
    }

    /// Deserialize and validate a profile from JSON.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json_str)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn validate_page_size(page_size: u64) -> Result<()> {
    if page_size == 0 || !page_size.is_power_of_two() {
        return Err(ProbeError::InvalidInput(format!(
            "page size must be a non-zero power of two, got {:#x}",
            page_size
        )));
    }
    if page_size > MAX_PAGE_SIZE {
        return Err(ProbeError::InvalidInput(format!(
            "page size {:#x} exceeds {:#x}",
            page_size, MAX_PAGE_SIZE
        )));
    }
    Ok(())
}
