//! Language-code resolution.
//!
//! Container dumps label tracks with ISO 639-2 codes (bibliographic form,
//! e.g. `ger`), newer tools add IETF tags (`de`), and users type whichever
//! they remember. [`resolve_language`] maps any of the two- or three-letter
//! forms to every canonical alternate so a track filter can match them all.

use crate::error::Sub2SrtError;

/// `(ISO 639-1, ISO 639-2/B, ISO 639-2/T, English name)`.
const LANGUAGES: &[(&str, &str, &str, &str)] = &[
    ("ar", "ara", "ara", "Arabic"),
    ("bg", "bul", "bul", "Bulgarian"),
    ("ca", "cat", "cat", "Catalan"),
    ("cs", "cze", "ces", "Czech"),
    ("da", "dan", "dan", "Danish"),
    ("de", "ger", "deu", "German"),
    ("el", "gre", "ell", "Greek"),
    ("en", "eng", "eng", "English"),
    ("es", "spa", "spa", "Spanish"),
    ("et", "est", "est", "Estonian"),
    ("eu", "baq", "eus", "Basque"),
    ("fa", "per", "fas", "Persian"),
    ("fi", "fin", "fin", "Finnish"),
    ("fr", "fre", "fra", "French"),
    ("ga", "gle", "gle", "Irish"),
    ("he", "heb", "heb", "Hebrew"),
    ("hi", "hin", "hin", "Hindi"),
    ("hr", "hrv", "hrv", "Croatian"),
    ("hu", "hun", "hun", "Hungarian"),
    ("id", "ind", "ind", "Indonesian"),
    ("is", "ice", "isl", "Icelandic"),
    ("it", "ita", "ita", "Italian"),
    ("ja", "jpn", "jpn", "Japanese"),
    ("ko", "kor", "kor", "Korean"),
    ("lt", "lit", "lit", "Lithuanian"),
    ("lv", "lav", "lav", "Latvian"),
    ("ms", "may", "msa", "Malay"),
    ("nl", "dut", "nld", "Dutch"),
    ("no", "nor", "nor", "Norwegian"),
    ("pl", "pol", "pol", "Polish"),
    ("pt", "por", "por", "Portuguese"),
    ("ro", "rum", "ron", "Romanian"),
    ("ru", "rus", "rus", "Russian"),
    ("sk", "slo", "slk", "Slovak"),
    ("sl", "slv", "slv", "Slovenian"),
    ("sr", "srp", "srp", "Serbian"),
    ("sv", "swe", "swe", "Swedish"),
    ("ta", "tam", "tam", "Tamil"),
    ("th", "tha", "tha", "Thai"),
    ("tr", "tur", "tur", "Turkish"),
    ("uk", "ukr", "ukr", "Ukrainian"),
    ("vi", "vie", "vie", "Vietnamese"),
    ("zh", "chi", "zho", "Chinese"),
];

/// Every accepted spelling of one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageCodes {
    /// Two-letter ISO 639-1 code.
    pub alpha2: &'static str,
    /// Three-letter ISO 639-2 bibliographic code, as written by Matroska
    /// tools.
    pub bibliographic: &'static str,
    /// Three-letter ISO 639-2 terminologic code.
    pub terminologic: &'static str,
    /// English name.
    pub name: &'static str,
}

impl LanguageCodes {
    /// The distinct codes, three-letter forms first.
    pub fn alternates(&self) -> Vec<String> {
        let mut codes = vec![self.bibliographic.to_string()];
        if self.terminologic != self.bibliographic {
            codes.push(self.terminologic.to_string());
        }
        codes.push(self.alpha2.to_string());
        codes
    }
}

/// Resolve a two- or three-letter code, case-insensitively.
///
/// # Errors
///
/// [`Sub2SrtError::InvalidLanguage`] for unknown codes.
///
/// # Example
///
/// ```
/// use sub2srt::resolve_language;
///
/// let german = resolve_language("DE")?;
/// assert_eq!(german.alternates(), ["ger", "deu", "de"]);
/// # Ok::<(), sub2srt::Sub2SrtError>(())
/// ```
pub fn resolve_language(code: &str) -> Result<LanguageCodes, Sub2SrtError> {
    let wanted = code.trim().to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(alpha2, bibliographic, terminologic, _)| {
            [*alpha2, *bibliographic, *terminologic].contains(&wanted.as_str())
        })
        .map(|&(alpha2, bibliographic, terminologic, name)| LanguageCodes {
            alpha2,
            bibliographic,
            terminologic,
            name,
        })
        .ok_or_else(|| Sub2SrtError::InvalidLanguage(code.to_string()))
}

/// Resolve several codes into one flat allow-list, preserving order and
/// dropping duplicates.
///
/// # Errors
///
/// [`Sub2SrtError::InvalidLanguage`] for the first unknown code.
pub fn language_allow_list<S: AsRef<str>>(codes: &[S]) -> Result<Vec<String>, Sub2SrtError> {
    let mut allowed: Vec<String> = Vec::new();
    for code in codes {
        for alternate in resolve_language(code.as_ref())?.alternates() {
            if !allowed.contains(&alternate) {
                allowed.push(alternate);
            }
        }
    }
    Ok(allowed)
}
