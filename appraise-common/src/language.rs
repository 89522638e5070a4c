//! Language and language pair vocabulary
//!
//! Languages are identified by their ISO 639-3 code. Only the pairs listed in
//! [`LanguagePair::ALL`] are accepted for HITs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages supported by the evaluation campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    English,
    Czech,
    German,
    Spanish,
    French,
    Russian,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Czech,
        Language::German,
        Language::Spanish,
        Language::French,
        Language::Russian,
    ];

    /// ISO 639-3 code, as used in `source-language`/`target-language` attributes
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::Czech => "ces",
            Language::German => "deu",
            Language::Spanish => "spa",
            Language::French => "fra",
            Language::Russian => "rus",
        }
    }

    /// English display name, as used in CSV exports
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Czech => "Czech",
            Language::German => "German",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::Russian => "Russian",
        }
    }

    /// Look up a language by ISO 639-3 code
    pub fn from_code(code: &str) -> Option<Language> {
        Language::ALL.iter().copied().find(|l| l.code() == code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered (source, target) language pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguagePair {
    source: Language,
    target: Language,
}

impl LanguagePair {
    /// All supported pairs: English into every other language and back
    pub const ALL: [LanguagePair; 10] = [
        LanguagePair::new_unchecked(Language::English, Language::Czech),
        LanguagePair::new_unchecked(Language::English, Language::German),
        LanguagePair::new_unchecked(Language::English, Language::Spanish),
        LanguagePair::new_unchecked(Language::English, Language::French),
        LanguagePair::new_unchecked(Language::English, Language::Russian),
        LanguagePair::new_unchecked(Language::Czech, Language::English),
        LanguagePair::new_unchecked(Language::German, Language::English),
        LanguagePair::new_unchecked(Language::Spanish, Language::English),
        LanguagePair::new_unchecked(Language::French, Language::English),
        LanguagePair::new_unchecked(Language::Russian, Language::English),
    ];

    const fn new_unchecked(source: Language, target: Language) -> Self {
        Self { source, target }
    }

    /// Build a pair, rejecting combinations outside the supported set
    pub fn new(source: Language, target: Language) -> Result<Self> {
        let pair = Self { source, target };
        if LanguagePair::ALL.contains(&pair) {
            Ok(pair)
        } else {
            Err(Error::UnsupportedLanguagePair {
                from: source.name(),
                to: target.name(),
            })
        }
    }

    /// Build a pair from ISO 639-3 codes such as `eng` and `deu`
    pub fn from_codes(source: &str, target: &str) -> Result<Self> {
        let lookup = |code: &str| {
            Language::from_code(code)
                .ok_or_else(|| Error::UnknownLanguage(code.to_string()))
        };
        Self::new(lookup(source)?, lookup(target)?)
    }

    pub fn source(&self) -> Language {
        self.source
    }

    pub fn target(&self) -> Language {
        self.target
    }

    /// Storage code, e.g. `eng2deu`
    pub fn code(&self) -> String {
        format!("{}2{}", self.source.code(), self.target.code())
    }

    /// Display label, e.g. `English->German`
    pub fn label(&self) -> String {
        format!("{}->{}", self.source.name(), self.target.name())
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}2{}", self.source.code(), self.target.code())
    }
}

impl FromStr for LanguagePair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (source, target) = s
            .split_once('2')
            .ok_or_else(|| Error::MalformedLanguagePair(s.to_string()))?;
        Self::from_codes(source, target)
    }
}

impl TryFrom<String> for LanguagePair {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LanguagePair> for String {
    fn from(pair: LanguagePair) -> String {
        pair.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported_pair() {
        let pair: LanguagePair = "eng2deu".parse().unwrap();
        assert_eq!(pair.source(), Language::English);
        assert_eq!(pair.target(), Language::German);
        assert_eq!(pair.code(), "eng2deu");
        assert_eq!(pair.label(), "English->German");
    }

    #[test]
    fn test_all_pairs_round_trip_through_code() {
        for pair in LanguagePair::ALL {
            let parsed: LanguagePair = pair.code().parse().unwrap();
            assert_eq!(parsed, pair);
        }
    }

    #[test]
    fn test_reject_unsupported_pair() {
        // Both languages exist but the pair does not involve English
        let err = "ces2deu".parse::<LanguagePair>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguagePair { from: "Czech", to: "German" }));
    }

    #[test]
    fn test_reject_unknown_code() {
        assert!(matches!("eng2xyz".parse::<LanguagePair>(), Err(Error::UnknownLanguage(code)) if code == "xyz"));
        assert!(matches!("english".parse::<LanguagePair>(), Err(Error::MalformedLanguagePair(_))));
    }

    #[test]
    fn test_language_lookup() {
        assert_eq!(Language::from_code("rus"), Some(Language::Russian));
        assert_eq!(Language::from_code("RUS"), None);
        assert_eq!(Language::Spanish.name(), "Spanish");
    }
}
