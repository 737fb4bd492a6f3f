use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Semantic type of a tensor's samples.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Htype {
    #[default]
    Generic,
    ClassLabel,
    Bbox,
    Image,
    Text,
    Json,
    Custom(String),
}

impl fmt::Display for Htype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => f.write_str("generic"),
            Self::ClassLabel => f.write_str("class_label"),
            Self::Bbox => f.write_str("bbox"),
            Self::Image => f.write_str("image"),
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for Htype {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Self::Generic),
            "class_label" => Ok(Self::ClassLabel),
            "bbox" => Ok(Self::Bbox),
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "" => Err(TypeError::UnknownHtype(s.to_string())),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

/// Codec applied to each stored sample of a tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
}

impl Compression {
    /// Stable single-byte code used in the sample frame header.
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zstd => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Zstd => f.write_str("zstd"),
        }
    }
}

impl FromStr for Compression {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "zstd" => Ok(Self::Zstd),
            other => Err(TypeError::UnknownCompression(other.to_string())),
        }
    }
}

/// Metadata fixed at tensor creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMeta {
    pub htype: Htype,
    pub sample_compression: Compression,
    /// Whether sample ids are tracked. Merges need them to correlate
    /// samples across branches.
    pub with_identity: bool,
}

impl Default for TensorMeta {
    fn default() -> Self {
        Self {
            htype: Htype::Generic,
            sample_compression: Compression::None,
            with_identity: true,
        }
    }
}

impl TensorMeta {
    pub fn new(htype: Htype) -> Self {
        Self {
            htype,
            ..Self::default()
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.sample_compression = compression;
        self
    }

    pub fn without_identity(mut self) -> Self {
        self.with_identity = false;
        self
    }

    /// First field in which two independently created tensors disagree,
    /// as `(field, ours, theirs)`.
    pub fn mismatch(&self, other: &TensorMeta) -> Option<(&'static str, String, String)> {
        if self.htype != other.htype {
            return Some(("htype", self.htype.to_string(), other.htype.to_string()));
        }
        if self.sample_compression != other.sample_compression {
            return Some((
                "sample_compression",
                self.sample_compression.to_string(),
                other.sample_compression.to_string(),
            ));
        }
        None
    }
}
