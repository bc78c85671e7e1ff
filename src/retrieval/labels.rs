//! Facet labels: small integers encoding one filterable fact about a passage.
//!
//! Label spaces are disjoint integer ranges, so a single flat list can carry
//! content-type, source, surah and ayah constraints at once:
//!
//! | facet        | labels        |
//! |--------------|---------------|
//! | content type | 1..=100       |
//! | source       | 101..=999     |
//! | surah `n`    | 1000 + n      |
//! | ayah `n`     | 2000 + n      |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::retrieval::filters::{ContentType, Source, SurahScope, ValidatedSubQuery};

pub const SURAH_COUNT: u16 = 114;
pub const MAX_AYAH: u16 = 286;

const SURAH_LABEL_OFFSET: u16 = 1000;
const AYAH_LABEL_OFFSET: u16 = 2000;

const CONTENT_TYPE_LABELS: &[(ContentType, u16)] = &[(ContentType::Tafsir, 1)];

const SOURCE_LABELS: &[(Source, u16)] = &[
    (Source::IbnKathir, 101),
    (Source::AlTabari, 102),
    (Source::AlQurtubi, 103),
    (Source::AlBaghawi, 104),
    (Source::AlSaadi, 105),
    (Source::AlMuyassar, 106),
    (Source::AlWasit, 107),
    (Source::AlJalalayn, 108),
    // Stored passages may name this work, but the upstream label set stops at
    // 108. It gets the next free value so a filter on it still narrows the
    // vector search.
    (Source::TanwirAlMiqbas, 109),
];

/// Ayah count of each surah, in mushaf order.
const AYAH_COUNTS: [u16; SURAH_COUNT as usize] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88, 75, 85, 54, 53, 89,
    59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12, 12, 30,
    52, 52, 44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26, 30, 20, 15,
    21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

/// Number of ayahs in `surah`, or `None` for an unknown surah.
pub fn ayah_count(surah: u16) -> Option<u16> {
    surah
        .checked_sub(1)
        .and_then(|i| AYAH_COUNTS.get(i as usize))
        .copied()
}

/// Which fact a label describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facet {
    ContentType,
    Source,
    Surah,
    Ayah,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetLabel(u16);

impl FacetLabel {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Facet recovered from the label's range; `None` outside every range.
    pub fn facet(self) -> Option<Facet> {
        match self.0 {
            1..=100 => Some(Facet::ContentType),
            101..=999 => Some(Facet::Source),
            v if v > SURAH_LABEL_OFFSET && v <= SURAH_LABEL_OFFSET + SURAH_COUNT => {
                Some(Facet::Surah)
            }
            v if v > AYAH_LABEL_OFFSET && v <= AYAH_LABEL_OFFSET + MAX_AYAH => Some(Facet::Ayah),
            _ => None,
        }
    }

    pub fn for_content_type(content_type: ContentType) -> Self {
        table().content_types[&content_type]
    }

    pub fn for_source(source: Source) -> Self {
        table().sources[&source]
    }

    pub fn for_surah(surah: u16) -> Option<Self> {
        surah
            .checked_sub(1)
            .and_then(|i| table().surahs.get(i as usize))
            .copied()
    }

    pub fn for_ayah(ayah: u16) -> Option<Self> {
        ayah.checked_sub(1)
            .and_then(|i| table().ayahs.get(i as usize))
            .copied()
    }
}

impl fmt::Display for FacetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup tables materialised once from the declarative lists above.
pub struct LabelTable {
    content_types: HashMap<ContentType, FacetLabel>,
    sources: HashMap<Source, FacetLabel>,
    surahs: Vec<FacetLabel>,
    ayahs: Vec<FacetLabel>,
    reverse: HashMap<FacetLabel, String>,
}

impl LabelTable {
    fn build() -> Self {
        let content_types: HashMap<_, _> = CONTENT_TYPE_LABELS
            .iter()
            .map(|&(ct, v)| (ct, FacetLabel(v)))
            .collect();
        let sources: HashMap<_, _> = SOURCE_LABELS
            .iter()
            .map(|&(src, v)| (src, FacetLabel(v)))
            .collect();
        let surahs: Vec<_> = (1..=SURAH_COUNT)
            .map(|n| FacetLabel(SURAH_LABEL_OFFSET + n))
            .collect();
        let ayahs: Vec<_> = (1..=MAX_AYAH)
            .map(|n| FacetLabel(AYAH_LABEL_OFFSET + n))
            .collect();

        let mut reverse = HashMap::new();
        for (ct, label) in &content_types {
            reverse.insert(*label, format!("content_type:{ct}"));
        }
        for (src, label) in &sources {
            reverse.insert(*label, format!("source:{src}"));
        }
        for (i, label) in surahs.iter().enumerate() {
            reverse.insert(*label, format!("surah:{}", i + 1));
        }
        for (i, label) in ayahs.iter().enumerate() {
            reverse.insert(*label, format!("ayah:{}", i + 1));
        }

        Self {
            content_types,
            sources,
            surahs,
            ayahs,
            reverse,
        }
    }

    /// Human-readable name of a label, e.g. `surah:2`.
    pub fn describe(&self, label: FacetLabel) -> String {
        self.reverse
            .get(&label)
            .cloned()
            .unwrap_or_else(|| format!("unknown:{label}"))
    }
}

/// Process-wide label table.
pub fn table() -> &'static LabelTable {
    static TABLE: OnceLock<LabelTable> = OnceLock::new();
    TABLE.get_or_init(LabelTable::build)
}

/// Translates validated filters into flat label lists.
pub struct LabelEncoder;

impl LabelEncoder {
    /// Labels for one sub-query's filters; empty when unfiltered.
    pub fn encode(query: &ValidatedSubQuery) -> Vec<FacetLabel> {
        let mut labels = Vec::new();

        if let Some(ct) = query.content_type {
            labels.push(FacetLabel::for_content_type(ct));
        }
        if let Some(src) = query.source {
            labels.push(FacetLabel::for_source(src));
        }

        match query.scope {
            SurahScope::Range { start, end } => {
                labels.extend((start..=end).filter_map(FacetLabel::for_surah));
            }
            SurahScope::Ayahs { surah, start, end } => {
                labels.extend(FacetLabel::for_surah(surah));
                labels.extend((start..=end).filter_map(FacetLabel::for_ayah));
            }
            SurahScope::Surah(surah) => labels.extend(FacetLabel::for_surah(surah)),
            SurahScope::Any => {}
        }

        labels
    }

    /// Labels describing a stored passage.
    pub fn encode_passage(
        content_type: Option<ContentType>,
        source: Option<Source>,
        surah: Option<u16>,
        ayah: Option<u16>,
    ) -> Vec<FacetLabel> {
        let mut labels = Vec::with_capacity(4);
        labels.extend(content_type.map(FacetLabel::for_content_type));
        labels.extend(source.map(FacetLabel::for_source));
        labels.extend(surah.and_then(FacetLabel::for_surah));
        labels.extend(ayah.and_then(FacetLabel::for_ayah));
        labels
    }
}

/// True when, for every facet constrained by `filter`, the passage carries at
/// least one of that facet's filter labels. An empty filter matches anything.
pub fn matches_facets(filter: &[FacetLabel], passage: &[FacetLabel]) -> bool {
    let mut required: HashMap<Option<Facet>, bool> = HashMap::new();
    for label in filter {
        let hit = passage.contains(label);
        let entry = required.entry(label.facet()).or_insert(false);
        *entry |= hit;
    }
    required.values().all(|&hit| hit)
}
