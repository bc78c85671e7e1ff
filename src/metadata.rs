//! Passage metadata, tagged by the granularity of the embedded chunk.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Phrase,
    Ayah,
    Surah,
    Quran,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Phrase => "phrase",
            Granularity::Ayah => "ayah",
            Granularity::Surah => "surah",
            Granularity::Quran => "quran",
        };
        f.write_str(name)
    }
}

/// Metadata stored with a chunk. The `granularity` field selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum ChunkMetadata {
    Phrase {
        #[serde(default)]
        surah_name: String,
        surah_number: u16,
        ayah_number: u16,
        phrase: String,
    },
    Ayah {
        #[serde(default)]
        surah_name: String,
        surah_number: u16,
        ayah_number: u16,
        /// Verse text
        #[serde(default, skip_serializing_if = "String::is_empty")]
        ayah: String,
    },
    Surah {
        #[serde(default)]
        surah_name: String,
        surah_number: u16,
    },
    Quran {
        #[serde(default)]
        note: String,
    },
}

impl ChunkMetadata {
    pub fn granularity(&self) -> Granularity {
        match self {
            ChunkMetadata::Phrase { .. } => Granularity::Phrase,
            ChunkMetadata::Ayah { .. } => Granularity::Ayah,
            ChunkMetadata::Surah { .. } => Granularity::Surah,
            ChunkMetadata::Quran { .. } => Granularity::Quran,
        }
    }

    pub fn surah(&self) -> Option<u16> {
        match self {
            ChunkMetadata::Phrase { surah_number, .. }
            | ChunkMetadata::Ayah { surah_number, .. }
            | ChunkMetadata::Surah { surah_number, .. } => Some(*surah_number),
            ChunkMetadata::Quran { .. } => None,
        }
    }

    pub fn ayah(&self) -> Option<u16> {
        match self {
            ChunkMetadata::Phrase { ayah_number, .. } | ChunkMetadata::Ayah { ayah_number, .. } => {
                Some(*ayah_number)
            }
            ChunkMetadata::Surah { .. } | ChunkMetadata::Quran { .. } => None,
        }
    }

    /// Human-readable reference, e.g. `Al-Baqarah 2:255`.
    pub fn describe(&self) -> String {
        match self {
            ChunkMetadata::Phrase {
                surah_name,
                surah_number,
                ayah_number,
                phrase,
            } => format!("{surah_name} {surah_number}:{ayah_number} | phrase: {phrase}"),
            ChunkMetadata::Ayah {
                surah_name,
                surah_number,
                ayah_number,
                ..
            } => format!("{surah_name} {surah_number}:{ayah_number}"),
            ChunkMetadata::Surah {
                surah_name,
                surah_number,
            } => format!("Surah: {surah_name} ({surah_number})"),
            ChunkMetadata::Quran { note } => format!("Note: {note}"),
        }
    }
}
