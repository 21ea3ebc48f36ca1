use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Closed set of tags attached to every entry.
///
/// Categories only drive filtered listings; they never change how an entry is encrypted or laid out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    /// Arbitrary serialized objects and raw bytes.
    #[default]
    Data,
    /// Photos and other image payloads.
    Image,
}

impl FileCategory {
    pub const ALL: [FileCategory; 2] = [FileCategory::Data, FileCategory::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Data => "data",
            FileCategory::Image => "image",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(FileCategory::Data),
            "image" => Ok(FileCategory::Image),
            other => Err(format!("unknown file category: {other}")),
        }
    }
}
