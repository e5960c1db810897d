//! XML event lists produced by the subtitle converter.
//!
//! The converter writes a document of this shape next to one PNG per cue:
//!
//! ```xml
//! <BDN Version="0.93">
//!   <Description>
//!     <Format VideoFormat="1080p" FrameRate="25" DropFrame="False"/>
//!     <Language Code="eng"/>
//!   </Description>
//!   <Events>
//!     <Event InTC="00:00:01:12" OutTC="00:00:03:00" Forced="False">
//!       <Graphic Width="720" Height="80" X="600" Y="950">movie_0001.png</Graphic>
//!     </Event>
//!   </Events>
//! </BDN>
//! ```
//!
//! [`parse_event_list`] reads the metadata and every `Event` across all
//! `Events` sections, in document order.

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::error::Sub2SrtError;
use crate::timecode::parse_frame_rate;

/// Language code used when the document does not name one.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// One cue of an event list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEvent {
    /// `InTC` attribute (`HH:MM:SS:FF`), if present.
    pub start_timecode: Option<String>,
    /// `OutTC` attribute (`HH:MM:SS:FF`), if present.
    pub end_timecode: Option<String>,
    /// Text of the `Graphic` child: the cue bitmap, relative to the
    /// document's directory.
    pub image_ref: Option<String>,
}

impl CaptionEvent {
    /// Resolve the cue bitmap against the directory holding the event list.
    pub fn image_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.image_ref.as_deref().map(|image| base_dir.join(image))
    }
}

/// A parsed event list.
#[derive(Debug, Clone, PartialEq)]
pub struct EventList {
    /// Integer frame rate used for timecode conversion.
    pub frame_rate: u32,
    /// The `FrameRate` attribute as written, e.g. `23.976`.
    pub frame_rate_label: String,
    /// The `VideoFormat` attribute, e.g. `1080p`.
    pub video_format: String,
    /// The `Language Code` attribute.
    pub language: String,
    /// Number of `Events` sections in the document.
    pub sections: usize,
    /// Every cue in document order.
    pub events: Vec<CaptionEvent>,
}

/// Read and parse the event list at `path`.
///
/// # Errors
///
/// - [`Sub2SrtError::IoError`] if the file cannot be read.
/// - [`Sub2SrtError::MalformedEvents`] if the XML is invalid or lacks a
///   usable frame rate.
pub fn load_event_list(path: &Path) -> Result<EventList, Sub2SrtError> {
    let content = fs::read_to_string(path)?;
    parse_event_list(&content, path)
}

/// Parse an event list. `path` is used for error context only.
///
/// # Errors
///
/// [`Sub2SrtError::MalformedEvents`] if the XML is invalid or lacks a
/// usable frame rate.
pub fn parse_event_list(xml: &str, path: &Path) -> Result<EventList, Sub2SrtError> {
    let malformed = |reason: String| Sub2SrtError::MalformedEvents {
        path: path.to_path_buf(),
        reason,
    };

    let document = Document::parse(xml).map_err(|e| malformed(format!("XML parse error: {e}")))?;
    let root = document.root_element();

    let description = child_element(root, "Description")
        .ok_or_else(|| malformed("missing <Description> element".to_string()))?;
    let format = child_element(description, "Format")
        .ok_or_else(|| malformed("missing <Description/Format> element".to_string()))?;

    let frame_rate_label = format
        .attribute("FrameRate")
        .ok_or_else(|| malformed("missing FrameRate attribute".to_string()))?
        .trim()
        .to_string();
    let frame_rate =
        parse_frame_rate(&frame_rate_label).map_err(|error| malformed(error.to_string()))?;
    let video_format = format.attribute("VideoFormat").unwrap_or_default().to_string();

    let language = child_element(description, "Language")
        .and_then(|language| language.attribute("Code"))
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or(UNDETERMINED_LANGUAGE)
        .to_string();

    let mut sections = 0;
    let mut events = Vec::new();
    for section in root
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "Events")
    {
        sections += 1;
        events.extend(
            section
                .children()
                .filter(|node| node.is_element() && node.tag_name().name() == "Event")
                .map(parse_event),
        );
    }

    log::debug!(
        "Parsed {} events in {sections} sections from {}",
        events.len(),
        path.display()
    );

    Ok(EventList {
        frame_rate,
        frame_rate_label,
        video_format,
        language,
        sections,
        events,
    })
}

fn parse_event(event: Node<'_, '_>) -> CaptionEvent {
    let timecode = |name: &str| {
        event
            .attribute(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    CaptionEvent {
        start_timecode: timecode("InTC"),
        end_timecode: timecode("OutTC"),
        image_ref: child_element(event, "Graphic")
            .and_then(|graphic| graphic.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}
