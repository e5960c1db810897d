//! Language-code resolution tests.

use sub2srt::{Sub2SrtError, language_allow_list, resolve_language};

#[test]
fn every_spelling_resolves_to_the_same_language() {
    for code in ["fr", "fre", "fra", "FRA", " Fr "] {
        let french = resolve_language(code).expect("French should resolve");
        assert_eq!(french.name, "French");
        assert_eq!(french.alternates(), ["fre", "fra", "fr"]);
    }
}

#[test]
fn identical_bibliographic_and_terminologic_codes_appear_once() {
    let english = resolve_language("eng").expect("English should resolve");
    assert_eq!(english.alternates(), ["eng", "en"]);
}

#[test]
fn unknown_code_is_rejected() {
    match resolve_language("xx") {
        Err(Sub2SrtError::InvalidLanguage(code)) => assert_eq!(code, "xx"),
        other => panic!("Expected InvalidLanguage, got {other:?}"),
    }
    assert!(resolve_language("").is_err());
}

#[test]
fn allow_list_is_flat_ordered_and_deduplicated() {
    let allowed = language_allow_list(&["de", "en", "ger"]).expect("Codes should resolve");
    assert_eq!(allowed, ["ger", "deu", "de", "eng", "en"]);
}

#[test]
fn allow_list_fails_on_first_unknown_code() {
    let result = language_allow_list(&["en", "klingon", "de"]);
    assert!(matches!(result, Err(Sub2SrtError::InvalidLanguage(code)) if code == "klingon"));
}

#[test]
fn empty_allow_list_accepts_any_language() {
    let allowed = language_allow_list::<&str>(&[]).expect("Empty list is valid");
    assert!(allowed.is_empty());
}
