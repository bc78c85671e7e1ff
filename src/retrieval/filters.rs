//! Facet filters attached to sub-queries and the validator that turns a raw
//! [`SearchRequest`] into a [`ValidatedRequest`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::retrieval::labels::{ayah_count, SURAH_COUNT};
use crate::store::LexicalFilters;

/// Upper bound on sub-queries per request.
pub const MAX_SUB_QUERIES: usize = 3;

/// Kind of passage content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Tafsir,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Tafsir => "tafsir",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work (author/commentary) a passage is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "Tafsir Ibn Kathir")]
    IbnKathir,
    #[serde(rename = "Tafsir Al Tabari")]
    AlTabari,
    #[serde(rename = "Tafsir Al Qurtubi")]
    AlQurtubi,
    #[serde(rename = "Tafsir Al Baghawi")]
    AlBaghawi,
    #[serde(rename = "Tafsir Al Saadi")]
    AlSaadi,
    #[serde(rename = "Tafsir Al Muyassar")]
    AlMuyassar,
    #[serde(rename = "Tafsir Al Wasit")]
    AlWasit,
    #[serde(rename = "Tafsir Al Jalalayn")]
    AlJalalayn,
    #[serde(rename = "Tafsir Tanwir Al Miqbas")]
    TanwirAlMiqbas,
}

impl Source {
    pub const ALL: [Source; 9] = [
        Source::IbnKathir,
        Source::AlTabari,
        Source::AlQurtubi,
        Source::AlBaghawi,
        Source::AlSaadi,
        Source::AlMuyassar,
        Source::AlWasit,
        Source::AlJalalayn,
        Source::TanwirAlMiqbas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::IbnKathir => "Tafsir Ibn Kathir",
            Source::AlTabari => "Tafsir Al Tabari",
            Source::AlQurtubi => "Tafsir Al Qurtubi",
            Source::AlBaghawi => "Tafsir Al Baghawi",
            Source::AlSaadi => "Tafsir Al Saadi",
            Source::AlMuyassar => "Tafsir Al Muyassar",
            Source::AlWasit => "Tafsir Al Wasit",
            Source::AlJalalayn => "Tafsir Al Jalalayn",
            Source::TanwirAlMiqbas => "Tafsir Tanwir Al Miqbas",
        }
    }

    /// Parse the display name used in stored passages.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of surah numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurahRange {
    pub start: u16,
    pub end: u16,
}

/// Inclusive range of ayah numbers within a single surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AyahRange {
    pub start: u16,
    pub end: u16,
}

/// One decomposed question with its optional facet filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surah: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surah_range: Option<SurahRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ayah_range: Option<AyahRange>,
}

impl SubQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_surah(mut self, surah: u16) -> Self {
        self.surah = Some(surah);
        self
    }

    pub fn with_surah_range(mut self, start: u16, end: u16) -> Self {
        self.surah_range = Some(SurahRange { start, end });
        self
    }

    pub fn with_ayah_range(mut self, start: u16, end: u16) -> Self {
        self.ayah_range = Some(AyahRange { start, end });
        self
    }
}

/// Input of the search operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The user's undecomposed prompt
    #[serde(default)]
    pub raw_prompt: String,
    pub sub_queries: Vec<SubQuery>,
    /// Number of passages the caller ultimately wants
    pub final_k: usize,
}

impl SearchRequest {
    pub fn new(raw_prompt: impl Into<String>, sub_queries: Vec<SubQuery>, final_k: usize) -> Self {
        Self {
            raw_prompt: raw_prompt.into(),
            sub_queries,
            final_k,
        }
    }
}

/// How the surah/ayah facets of a sub-query are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    SurahRange,
    SurahAyahRange,
    SurahOnly,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterMode::SurahRange => "surah_range",
            FilterMode::SurahAyahRange => "surah_ayah_range",
            FilterMode::SurahOnly => "surah_only",
        };
        f.write_str(name)
    }
}

/// Validated surah/ayah facet of one sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurahScope {
    /// Surahs `start..=end`, `end > start`
    Range { start: u16, end: u16 },
    /// Ayahs `start..=end` of one surah
    Ayahs { surah: u16, start: u16, end: u16 },
    Surah(u16),
    Any,
}

impl SurahScope {
    pub fn mode(&self) -> FilterMode {
        match self {
            SurahScope::Range { .. } => FilterMode::SurahRange,
            SurahScope::Ayahs { .. } => FilterMode::SurahAyahRange,
            SurahScope::Surah(_) | SurahScope::Any => FilterMode::SurahOnly,
        }
    }
}

/// A sub-query whose filters passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubQuery {
    /// Position of the sub-query in the request
    pub index: usize,
    pub text: String,
    pub content_type: Option<ContentType>,
    pub source: Option<Source>,
    pub scope: SurahScope,
}

impl ValidatedSubQuery {
    pub fn mode(&self) -> FilterMode {
        self.scope.mode()
    }

    /// Structured filters handed to the lexical store.
    pub fn lexical_filters(&self) -> LexicalFilters {
        let mut filters = LexicalFilters {
            content_type: self.content_type,
            source: self.source,
            ..LexicalFilters::default()
        };

        match self.scope {
            SurahScope::Range { start, end } => {
                filters.surah_start = Some(start);
                filters.surah_end = Some(end);
            }
            SurahScope::Ayahs { surah, start, end } => {
                filters.surah = Some(surah);
                filters.ayah_start = Some(start);
                filters.ayah_end = Some(end);
            }
            SurahScope::Surah(surah) => filters.surah = Some(surah),
            SurahScope::Any => {}
        }

        filters
    }
}

/// A request whose sub-queries all passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub raw_prompt: String,
    pub queries: Vec<ValidatedSubQuery>,
    pub final_k: usize,
}

impl ValidatedRequest {
    /// Per-sub-query modes, aligned with `queries`.
    pub fn modes(&self) -> Vec<FilterMode> {
        self.queries.iter().map(ValidatedSubQuery::mode).collect()
    }

    /// The mode shared by every sub-query, or `None` when they differ.
    pub fn shared_mode(&self) -> Option<FilterMode> {
        let first = self.queries.first()?.mode();
        self.queries
            .iter()
            .all(|q| q.mode() == first)
            .then_some(first)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("at least one sub-query is required")]
    NoSubQueries,

    #[error("{count} sub-queries supplied, at most {max} are allowed")]
    TooManySubQueries { count: usize, max: usize },

    #[error("final_k must be at least 1")]
    ZeroFinalK,

    #[error("sub-query {index}: query text cannot be empty")]
    EmptyText { index: usize },

    #[error("sub-query {index}: a surah range cannot be combined with a surah or ayah range filter")]
    RangeWithSurahFilter { index: usize },

    #[error("sub-query {index}: surah range {start}..{end} must end after it starts (use the surah filter for a single surah)")]
    EmptySurahRange { index: usize, start: u16, end: u16 },

    #[error("sub-query {index}: an ayah range requires a surah filter")]
    AyahRangeWithoutSurah { index: usize },

    #[error("sub-query {index}: ayah range {start}..{end} ends before it starts")]
    ReversedAyahRange { index: usize, start: u16, end: u16 },

    #[error("sub-query {index}: surah {surah} is outside 1..={}", SURAH_COUNT)]
    SurahOutOfBounds { index: usize, surah: u16 },

    #[error("sub-query {index}: ayah {ayah} is outside 1..={max} for surah {surah}")]
    AyahOutOfBounds {
        index: usize,
        surah: u16,
        ayah: u16,
        max: u16,
    },
}

impl FilterError {
    /// Index of the offending sub-query, when the error concerns one.
    pub fn sub_query(&self) -> Option<usize> {
        match self {
            FilterError::NoSubQueries
            | FilterError::TooManySubQueries { .. }
            | FilterError::ZeroFinalK => None,
            FilterError::EmptyText { index }
            | FilterError::RangeWithSurahFilter { index }
            | FilterError::EmptySurahRange { index, .. }
            | FilterError::AyahRangeWithoutSurah { index }
            | FilterError::ReversedAyahRange { index, .. }
            | FilterError::SurahOutOfBounds { index, .. }
            | FilterError::AyahOutOfBounds { index, .. } => Some(*index),
        }
    }
}

/// Checks filter shapes across all sub-queries of a request.
#[derive(Debug, Clone, Copy)]
pub struct FilterValidator {
    max_sub_queries: usize,
}

impl Default for FilterValidator {
    fn default() -> Self {
        Self {
            max_sub_queries: MAX_SUB_QUERIES,
        }
    }
}

impl FilterValidator {
    /// `max_sub_queries` is clamped to `1..=MAX_SUB_QUERIES`.
    pub fn new(max_sub_queries: usize) -> Self {
        Self {
            max_sub_queries: max_sub_queries.clamp(1, MAX_SUB_QUERIES),
        }
    }

    pub fn validate(&self, request: &SearchRequest) -> Result<ValidatedRequest, FilterError> {
        let count = request.sub_queries.len();
        if count == 0 {
            return Err(FilterError::NoSubQueries);
        }
        if count > self.max_sub_queries {
            return Err(FilterError::TooManySubQueries {
                count,
                max: self.max_sub_queries,
            });
        }
        if request.final_k == 0 {
            return Err(FilterError::ZeroFinalK);
        }

        let queries = request
            .sub_queries
            .iter()
            .enumerate()
            .map(|(index, query)| Self::validate_sub_query(index, query))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedRequest {
            raw_prompt: request.raw_prompt.clone(),
            queries,
            final_k: request.final_k,
        })
    }

    fn validate_sub_query(index: usize, query: &SubQuery) -> Result<ValidatedSubQuery, FilterError> {
        if query.text.trim().is_empty() {
            return Err(FilterError::EmptyText { index });
        }

        let scope = Self::scope(index, query)?;

        Ok(ValidatedSubQuery {
            index,
            text: query.text.clone(),
            content_type: query.content_type,
            source: query.source,
            scope,
        })
    }

    fn scope(index: usize, query: &SubQuery) -> Result<SurahScope, FilterError> {
        if let Some(range) = query.surah_range {
            if query.surah.is_some() || query.ayah_range.is_some() {
                return Err(FilterError::RangeWithSurahFilter { index });
            }
            check_surah(index, range.start)?;
            check_surah(index, range.end)?;
            if range.end <= range.start {
                return Err(FilterError::EmptySurahRange {
                    index,
                    start: range.start,
                    end: range.end,
                });
            }
            return Ok(SurahScope::Range {
                start: range.start,
                end: range.end,
            });
        }

        if let Some(range) = query.ayah_range {
            let surah = query
                .surah
                .ok_or(FilterError::AyahRangeWithoutSurah { index })?;
            check_surah(index, surah)?;
            if range.end < range.start {
                return Err(FilterError::ReversedAyahRange {
                    index,
                    start: range.start,
                    end: range.end,
                });
            }
            check_ayah(index, surah, range.start)?;
            check_ayah(index, surah, range.end)?;
            return Ok(SurahScope::Ayahs {
                surah,
                start: range.start,
                end: range.end,
            });
        }

        match query.surah {
            Some(surah) => {
                check_surah(index, surah)?;
                Ok(SurahScope::Surah(surah))
            }
            None => Ok(SurahScope::Any),
        }
    }
}

fn check_surah(index: usize, surah: u16) -> Result<(), FilterError> {
    if (1..=SURAH_COUNT).contains(&surah) {
        Ok(())
    } else {
        Err(FilterError::SurahOutOfBounds { index, surah })
    }
}

fn check_ayah(index: usize, surah: u16, ayah: u16) -> Result<(), FilterError> {
    let max = ayah_count(surah).unwrap_or(0);
    if ayah >= 1 && ayah <= max {
        Ok(())
    } else {
        Err(FilterError::AyahOutOfBounds {
            index,
            surah,
            ayah,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(queries: Vec<SubQuery>) -> SearchRequest {
        SearchRequest::new("prompt", queries, 10)
    }

    fn validate_one(query: SubQuery) -> Result<ValidatedSubQuery, FilterError> {
        FilterValidator::default()
            .validate(&request(vec![query]))
            .map(|mut v| v.queries.remove(0))
    }

    #[test]
    fn test_sub_query_count_bounds() {
        let validator = FilterValidator::default();
        assert_eq!(
            validator.validate(&request(vec![])),
            Err(FilterError::NoSubQueries)
        );

        let four = vec![SubQuery::new("q"); 4];
        assert_eq!(
            validator.validate(&request(four)),
            Err(FilterError::TooManySubQueries { count: 4, max: 3 })
        );

        let three = vec![SubQuery::new("q"); 3];
        assert_eq!(validator.validate(&request(three)).unwrap().queries.len(), 3);
    }

    #[test]
    fn test_zero_final_k_rejected() {
        let req = SearchRequest::new("p", vec![SubQuery::new("q")], 0);
        assert_eq!(
            FilterValidator::default().validate(&req),
            Err(FilterError::ZeroFinalK)
        );
    }

    #[test]
    fn test_surah_range_truth_table() {
        let ok = validate_one(SubQuery::new("q").with_surah_range(2, 5)).unwrap();
        assert_eq!(ok.scope, SurahScope::Range { start: 2, end: 5 });
        assert_eq!(ok.mode(), FilterMode::SurahRange);

        assert_eq!(
            validate_one(SubQuery::new("q").with_surah_range(5, 5)),
            Err(FilterError::EmptySurahRange {
                index: 0,
                start: 5,
                end: 5
            })
        );
        assert!(matches!(
            validate_one(SubQuery::new("q").with_surah_range(6, 5)),
            Err(FilterError::EmptySurahRange { .. })
        ));
        assert_eq!(
            validate_one(SubQuery::new("q").with_surah_range(2, 5).with_surah(3)),
            Err(FilterError::RangeWithSurahFilter { index: 0 })
        );
        assert_eq!(
            validate_one(
                SubQuery::new("q")
                    .with_surah_range(2, 5)
                    .with_ayah_range(1, 3)
            ),
            Err(FilterError::RangeWithSurahFilter { index: 0 })
        );
        assert!(matches!(
            validate_one(SubQuery::new("q").with_surah_range(100, 115)),
            Err(FilterError::SurahOutOfBounds { surah: 115, .. })
        ));
    }

    #[test]
    fn test_ayah_range_truth_table() {
        let ok = validate_one(SubQuery::new("q").with_surah(2).with_ayah_range(255, 257)).unwrap();
        assert_eq!(
            ok.scope,
            SurahScope::Ayahs {
                surah: 2,
                start: 255,
                end: 257
            }
        );
        assert_eq!(ok.mode(), FilterMode::SurahAyahRange);

        // A single ayah is a valid range
        assert!(validate_one(SubQuery::new("q").with_surah(1).with_ayah_range(7, 7)).is_ok());

        assert_eq!(
            validate_one(SubQuery::new("q").with_ayah_range(1, 3)),
            Err(FilterError::AyahRangeWithoutSurah { index: 0 })
        );
        assert_eq!(
            validate_one(SubQuery::new("q").with_surah(2).with_ayah_range(5, 4)),
            Err(FilterError::ReversedAyahRange {
                index: 0,
                start: 5,
                end: 4
            })
        );
        assert_eq!(
            validate_one(SubQuery::new("q").with_surah(1).with_ayah_range(1, 8)),
            Err(FilterError::AyahOutOfBounds {
                index: 0,
                surah: 1,
                ayah: 8,
                max: 7
            })
        );
        assert!(matches!(
            validate_one(SubQuery::new("q").with_surah(2).with_ayah_range(0, 3)),
            Err(FilterError::AyahOutOfBounds { ayah: 0, .. })
        ));
    }

    #[test]
    fn test_surah_only_and_unfiltered() {
        let surah = validate_one(SubQuery::new("q").with_surah(18)).unwrap();
        assert_eq!(surah.scope, SurahScope::Surah(18));
        assert_eq!(surah.mode(), FilterMode::SurahOnly);

        let any = validate_one(SubQuery::new("q")).unwrap();
        assert_eq!(any.scope, SurahScope::Any);
        assert_eq!(any.mode(), FilterMode::SurahOnly);

        assert!(matches!(
            validate_one(SubQuery::new("q").with_surah(0)),
            Err(FilterError::SurahOutOfBounds { surah: 0, .. })
        ));
    }

    #[test]
    fn test_blank_text_rejected() {
        assert_eq!(
            validate_one(SubQuery::new("   ")),
            Err(FilterError::EmptyText { index: 0 })
        );
    }

    #[test]
    fn test_error_names_offending_sub_query() {
        let req = request(vec![
            SubQuery::new("fine").with_surah(2),
            SubQuery::new("broken").with_ayah_range(1, 2),
        ]);
        let err = FilterValidator::default().validate(&req).unwrap_err();
        assert_eq!(err.sub_query(), Some(1));
    }

    #[test]
    fn test_modes_are_tracked_per_sub_query() {
        let req = request(vec![
            SubQuery::new("a").with_surah_range(2, 4),
            SubQuery::new("b").with_surah(2).with_ayah_range(1, 5),
            SubQuery::new("c"),
        ]);
        let validated = FilterValidator::default().validate(&req).unwrap();
        assert_eq!(
            validated.modes(),
            vec![
                FilterMode::SurahRange,
                FilterMode::SurahAyahRange,
                FilterMode::SurahOnly
            ]
        );
        assert_eq!(validated.shared_mode(), None);

        let req = request(vec![SubQuery::new("a").with_surah(3), SubQuery::new("b")]);
        let validated = FilterValidator::default().validate(&req).unwrap();
        assert_eq!(validated.shared_mode(), Some(FilterMode::SurahOnly));
    }

    #[test]
    fn test_lexical_filters_follow_scope() {
        let q = validate_one(
            SubQuery::new("q")
                .with_content_type(ContentType::Tafsir)
                .with_source(Source::AlSaadi)
                .with_surah(2)
                .with_ayah_range(1, 5),
        )
        .unwrap();
        let f = q.lexical_filters();
        assert_eq!(f.content_type, Some(ContentType::Tafsir));
        assert_eq!(f.source, Some(Source::AlSaadi));
        assert_eq!(f.surah, Some(2));
        assert_eq!((f.ayah_start, f.ayah_end), (Some(1), Some(5)));
        assert_eq!((f.surah_start, f.surah_end), (None, None));

        let q = validate_one(SubQuery::new("q").with_surah_range(3, 9)).unwrap();
        let f = q.lexical_filters();
        assert_eq!((f.surah_start, f.surah_end), (Some(3), Some(9)));
        assert_eq!(f.surah, None);
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "raw_prompt": "What does Ibn Kathir say about Ayat al-Kursi?",
            "final_k": 10,
            "sub_queries": [
                {"text": "ayat al kursi", "source": "Tafsir Ibn Kathir", "surah": 2, "ayah_range": {"start": 255, "end": 255}},
                {"text": "throne verse", "content_type": "tafsir"}
            ]
        }"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.sub_queries[0].source, Some(Source::IbnKathir));
        assert_eq!(req.sub_queries[1].content_type, Some(ContentType::Tafsir));
        assert!(FilterValidator::default().validate(&req).is_ok());
    }
}
