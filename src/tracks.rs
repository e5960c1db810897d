//! Track discovery from `mkvinfo` dumps.
//!
//! `mkvinfo` prints a container as an indented tree where the position of
//! the `+` marker gives the nesting depth:
//!
//! ```text
//! + Segment: size 1234567
//! |+ Tracks
//! | + Track
//! |  + Track number: 3 (track ID for mkvmerge & mkvextract: 2)
//! |  + Track type: subtitles
//! |  + "Default track" flag: 1
//! |  + Codec ID: S_HDMV/PGS
//! |  + Language: eng
//! |+ Clusters
//! ```
//!
//! [`parse_tracks`] scans that dump once, accumulating the fields named by a
//! [`TrackFilter`] for each `Track` block and materialising a
//! [`TrackRecord`] when the block closes. The dump layout is a compatibility
//! contract with MKVToolNix.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// The track type eligible for export.
pub const SUBTITLES: &str = "subtitles";

/// Depth of the `Tracks` element under `Segment`.
const SECTION_DEPTH: usize = 1;
/// Depth of each `Track` element.
const TRACK_DEPTH: usize = 2;
/// Depth of a track's own properties.
const FIELD_DEPTH: usize = 3;

/// A track property the parser knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackField {
    /// Extraction index (`track ID for mkvmerge & mkvextract`).
    Id,
    /// `Track type` (`video`, `audio`, `subtitles`, ...).
    Type,
    /// `Codec ID`.
    Codec,
    /// `Language` (ISO 639-2).
    Language,
    /// `"Default track" flag`.
    Default,
    /// `"Forced display" flag`.
    Forced,
    /// `Name`.
    Name,
}

impl TrackField {
    /// Every field, in the order they are usually printed.
    pub const ALL: [TrackField; 7] = [
        TrackField::Id,
        TrackField::Type,
        TrackField::Default,
        TrackField::Forced,
        TrackField::Codec,
        TrackField::Language,
        TrackField::Name,
    ];

    /// Map a dump key to its field. Keys differ slightly between
    /// MKVToolNix releases.
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "Track number" => Some(TrackField::Id),
            "Track type" => Some(TrackField::Type),
            "Codec ID" => Some(TrackField::Codec),
            "Language" => Some(TrackField::Language),
            "\"Default track\" flag" | "Default track flag" | "\"Default\" flag"
            | "Default flag" => Some(TrackField::Default),
            "\"Forced display\" flag" | "Forced display flag" | "\"Forced\" flag"
            | "Forced flag" => Some(TrackField::Forced),
            "Name" => Some(TrackField::Name),
            _ => None,
        }
    }
}

impl Display for TrackField {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TrackField::Id => write!(f, "id"),
            TrackField::Type => write!(f, "type"),
            TrackField::Codec => write!(f, "codec"),
            TrackField::Language => write!(f, "language"),
            TrackField::Default => write!(f, "default"),
            TrackField::Forced => write!(f, "forced"),
            TrackField::Name => write!(f, "name"),
        }
    }
}

/// Which fields to read, and which values to accept for each.
///
/// An empty allow-list accepts any value. Fields absent from the filter are
/// not read at all.
///
/// # Example
///
/// ```
/// use sub2srt::{TrackField, TrackFilter};
///
/// let filter = TrackFilter::new()
///     .with_allowed(TrackField::Type, ["subtitles"])
///     .with_allowed(TrackField::Codec, ["S_HDMV/PGS"])
///     .with_any(TrackField::Id)
///     .with_allowed(TrackField::Language, ["eng", "en"]);
/// assert!(filter.accepts(TrackField::Language, "ENG"));
/// assert!(!filter.accepts(TrackField::Language, "ger"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFilter {
    rules: Vec<(TrackField, Vec<String>)>,
}

impl TrackFilter {
    /// An empty filter; no fields are read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every field and accept any value.
    pub fn unrestricted() -> Self {
        TrackField::ALL
            .iter()
            .fold(Self::new(), |filter, &field| filter.with_any(field))
    }

    /// Read `field` and accept any value.
    #[must_use]
    pub fn with_any(self, field: TrackField) -> Self {
        self.with_allowed(field, std::iter::empty::<String>())
    }

    /// Read `field` and accept only the listed values (case-insensitive).
    /// Replaces an earlier rule for the same field.
    #[must_use]
    pub fn with_allowed<I, S>(mut self, field: TrackField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.rules.iter_mut().find(|(existing, _)| *existing == field) {
            Some(rule) => rule.1 = values,
            None => self.rules.push((field, values)),
        }
        self
    }

    /// The allow-list for `field`, or `None` when the field is not read.
    pub fn allowed(&self, field: TrackField) -> Option<&[String]> {
        self.rules
            .iter()
            .find(|(existing, _)| *existing == field)
            .map(|(_, values)| values.as_slice())
    }

    /// Returns `true` if `value` may be recorded for `field`.
    pub fn accepts(&self, field: TrackField, value: &str) -> bool {
        self.allowed(field).is_some_and(|values| {
            values.is_empty() || values.iter().any(|v| v.eq_ignore_ascii_case(value))
        })
    }
}

/// One track discovered in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    /// Extraction index passed to `mkvextract`.
    pub id: u32,
    /// Track type, e.g. `"subtitles"`.
    pub track_type: String,
    /// Codec identifier, e.g. `"S_HDMV/PGS"`.
    pub codec: String,
    /// ISO 639-2 language code; `"und"` when the dump carries none.
    pub language: String,
    /// Whether the track is flagged as the default.
    pub is_default: bool,
    /// Whether the track is flagged as forced.
    pub is_forced: bool,
    /// Optional track title.
    pub name: Option<String>,
}

impl TrackRecord {
    /// Returns `true` for subtitle tracks.
    pub fn is_subtitles(&self) -> bool {
        self.track_type.eq_ignore_ascii_case(SUBTITLES)
    }

    /// File extension of the codec's native format.
    pub fn extension(&self) -> &'static str {
        codec_extension(&self.codec)
    }

    /// File name the track is exported under:
    /// `{container}.{id}.{language}[.default].{extension}`.
    ///
    /// # Example
    ///
    /// ```
    /// use sub2srt::TrackRecord;
    ///
    /// let track = TrackRecord {
    ///     id: 2,
    ///     track_type: "subtitles".to_string(),
    ///     codec: "S_HDMV/PGS".to_string(),
    ///     language: "eng".to_string(),
    ///     is_default: true,
    ///     is_forced: false,
    ///     name: None,
    /// };
    /// assert_eq!(track.derived_filename("movie"), "movie.2.eng.default.sup");
    /// ```
    pub fn derived_filename(&self, container_stem: &str) -> String {
        let marker = if self.is_default { ".default" } else { "" };
        format!(
            "{container_stem}.{}.{}{marker}.{}",
            self.id,
            self.language,
            self.extension()
        )
    }
}

/// Native file extension for a Matroska codec ID.
pub fn codec_extension(codec: &str) -> &'static str {
    match codec.to_ascii_uppercase().as_str() {
        "S_HDMV/PGS" => "sup",
        "S_VOBSUB" => "sub",
        "S_DVBSUB" => "dvb",
        "S_TEXT/UTF8" | "S_TEXT/ASCII" => "srt",
        "S_TEXT/ASS" | "S_ASS" => "ass",
        "S_TEXT/SSA" | "S_SSA" => "ssa",
        "S_TEXT/WEBVTT" => "vtt",
        "S_TEXT/USF" => "usf",
        _ => "bin",
    }
}

/// A parsed property, ready to apply to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldUpdate {
    Id(u32),
    Type(String),
    Codec(String),
    Language(String),
    Default(bool),
    Forced(bool),
    Name(String),
}

impl FieldUpdate {
    fn parse(field: TrackField, value: &str) -> Option<Self> {
        match field {
            TrackField::Id => parse_track_id(value).map(FieldUpdate::Id),
            TrackField::Type => Some(FieldUpdate::Type(value.to_string())),
            TrackField::Codec => Some(FieldUpdate::Codec(value.to_string())),
            TrackField::Language => Some(FieldUpdate::Language(value.to_string())),
            TrackField::Default => parse_flag(value).map(FieldUpdate::Default),
            TrackField::Forced => parse_flag(value).map(FieldUpdate::Forced),
            TrackField::Name => Some(FieldUpdate::Name(value.to_string())),
        }
    }
}

/// The fields seen so far inside one `Track` block.
#[derive(Debug, Default)]
struct TrackAccumulator {
    id: Option<u32>,
    track_type: Option<String>,
    codec: Option<String>,
    language: Option<String>,
    is_default: Option<bool>,
    is_forced: Option<bool>,
    name: Option<String>,
    rejected: Option<TrackField>,
}

impl TrackAccumulator {
    fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Id(id) => self.id = Some(id),
            FieldUpdate::Type(value) => self.track_type = Some(value),
            FieldUpdate::Codec(value) => self.codec = Some(value),
            FieldUpdate::Language(value) => self.language = Some(value),
            FieldUpdate::Default(flag) => self.is_default = Some(flag),
            FieldUpdate::Forced(flag) => self.is_forced = Some(flag),
            FieldUpdate::Name(value) => self.name = Some(value),
        }
    }

    fn into_record(self, filter: &TrackFilter) -> Option<TrackRecord> {
        if let Some(field) = self.rejected {
            log::debug!("Dropping track {:?}: {field} not in allow-list", self.id);
            return None;
        }
        let language_required = filter
            .allowed(TrackField::Language)
            .is_some_and(|values| !values.is_empty());
        if language_required && self.language.is_none() {
            log::debug!("Dropping track {:?}: no language to match", self.id);
            return None;
        }
        let (Some(track_type), Some(codec), Some(id)) = (self.track_type, self.codec, self.id)
        else {
            return None;
        };
        if !track_type.eq_ignore_ascii_case(SUBTITLES) {
            return None;
        }
        Some(TrackRecord {
            id,
            track_type,
            codec,
            language: self.language.unwrap_or_else(|| "und".to_string()),
            is_default: self.is_default.unwrap_or(false),
            is_forced: self.is_forced.unwrap_or(false),
            name: self.name,
        })
    }
}

/// Parse an `mkvinfo` dump into the tracks accepted by `filter`, in dump
/// order.
///
/// A block is materialised once its `type`, `codec` and `id` have all been
/// recorded and its type is `subtitles`. A block where a restricted field
/// showed a value outside its allow-list is dropped, as is a block missing
/// any of the three required fields, or one without a `Language` line when
/// the filter restricts languages. Lines without a `+` marker or a `key: value` separator are
/// ignored. This function never fails.
pub fn parse_tracks(dump: &str, filter: &TrackFilter) -> Vec<TrackRecord> {
    let mut records = Vec::new();
    let mut inside_tracks_section = false;
    let mut current: Option<TrackAccumulator> = None;

    for line in dump.lines() {
        let Some((depth, text)) = split_marker(line) else {
            continue;
        };

        if depth <= TRACK_DEPTH {
            if let Some(track) = current.take() {
                records.extend(track.into_record(filter));
            }
        }

        if depth <= SECTION_DEPTH {
            inside_tracks_section = depth == SECTION_DEPTH && text == "Tracks";
            continue;
        }
        if !inside_tracks_section {
            continue;
        }

        if depth == TRACK_DEPTH {
            if text == "Track" {
                current = Some(TrackAccumulator::default());
            }
            continue;
        }

        let Some(track) = current.as_mut() else {
            continue;
        };
        if depth != FIELD_DEPTH {
            continue;
        }
        let Some((key, value)) = text.split_once(':') else {
            continue;
        };
        let Some(field) = TrackField::from_key(key.trim()) else {
            continue;
        };
        let Some(update) = FieldUpdate::parse(field, value.trim()) else {
            continue;
        };

        let Some(allowed) = filter.allowed(field) else {
            continue;
        };
        if filter.accepts(field, &update_value(&update)) {
            track.apply(update);
        } else if !allowed.is_empty() {
            track.rejected.get_or_insert(field);
        }
    }

    if let Some(track) = current.take() {
        records.extend(track.into_record(filter));
    }

    log::debug!("Discovered {} matching track(s)", records.len());
    records
}

/// The comparable value of an update, as an allow-list would spell it.
fn update_value(update: &FieldUpdate) -> String {
    match update {
        FieldUpdate::Id(id) => id.to_string(),
        FieldUpdate::Default(flag) | FieldUpdate::Forced(flag) => {
            String::from(if *flag { "1" } else { "0" })
        }
        FieldUpdate::Type(value)
        | FieldUpdate::Codec(value)
        | FieldUpdate::Language(value)
        | FieldUpdate::Name(value) => value.clone(),
    }
}

/// Split a dump line into the depth of its `+` marker and the text after it.
fn split_marker(line: &str) -> Option<(usize, &str)> {
    let marker = line.find('+')?;
    let prefix = &line[..marker];
    if !prefix.chars().all(|c| c == '|' || c == ' ') {
        return None;
    }
    Some((marker, line[marker + 1..].trim()))
}

/// `3 (track ID for mkvmerge & mkvextract: 2)` gives `2`; a bare track
/// number `n` gives `n - 1`.
fn parse_track_id(value: &str) -> Option<u32> {
    if let Some((_, tail)) = value.split_once("mkvextract:") {
        return tail.trim().trim_end_matches(')').trim().parse().ok();
    }
    value
        .split_whitespace()
        .next()?
        .parse::<u32>()
        .ok()?
        .checked_sub(1)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "yes" | "true" => Some(true),
        "0" | "no" | "false" => Some(false),
        _ => None,
    }
}
