#![forbid(unsafe_code)]

//! Fixed-size language and country codes.
//!
//! A [`LocaleCode`] is either empty or exactly two ASCII alphanumeric bytes,
//! case preserved. Codes are never checked against ISO lists. A
//! [`LocalePair`] bundles a language and a country so the two can only ever
//! be replaced together.

use std::env;
use std::fmt;

use crate::error::LocaleError;

/// A two-byte language or country code (or the empty code).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LocaleCode {
    bytes: [u8; 2],
    len: u8,
}

impl LocaleCode {
    /// The empty code.
    pub const EMPTY: Self = Self {
        bytes: [0; 2],
        len: 0,
    };

    /// Validate and copy a code.
    ///
    /// Accepts the empty string or exactly two ASCII alphanumeric bytes.
    pub fn new(code: &str) -> Result<Self, LocaleError> {
        match code.as_bytes() {
            [] => Ok(Self::EMPTY),
            &[a, b] if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => Ok(Self {
                bytes: [a, b],
                len: 2,
            }),
            _ => Err(LocaleError::InvalidCode(code.to_string())),
        }
    }

    /// The code as a string slice (empty for [`LocaleCode::EMPTY`]).
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Construction admits only ASCII bytes.
        std::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocaleCode({:?})", self.as_str())
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for LocaleCode {
    type Error = LocaleError;

    fn try_from(code: &str) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

/// A (language, country) pair selecting the active resource set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LocalePair {
    pub language: LocaleCode,
    pub country: LocaleCode,
}

impl LocalePair {
    /// Validate both codes. Either failing rejects the pair as a whole.
    pub fn new(language: &str, country: &str) -> Result<Self, LocaleError> {
        Ok(Self {
            language: LocaleCode::new(language)?,
            country: LocaleCode::new(country)?,
        })
    }

    /// Parse a POSIX-ish locale tag such as `fr_FR.UTF-8@euro`, `fr-FR` or `fr`.
    ///
    /// `C` and `POSIX` map to `en_US`. Returns `None` for empty input or
    /// segments that are not valid codes.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.split('@').next().unwrap_or(raw);
        let raw = raw.split('.').next().unwrap_or(raw).trim();
        if raw.is_empty() {
            return None;
        }
        if raw.eq_ignore_ascii_case("c") || raw.eq_ignore_ascii_case("posix") {
            return Some(Self::fallback());
        }
        let mut parts = raw.splitn(2, ['_', '-']);
        let language = parts.next().unwrap_or_default();
        let country = parts.next().unwrap_or_default();
        let pair = Self::new(language, country).ok()?;
        (!pair.language.is_empty()).then_some(pair)
    }

    /// Pair used when nothing better is known: `en_US`.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            language: LocaleCode {
                bytes: *b"en",
                len: 2,
            },
            country: LocaleCode {
                bytes: *b"US",
                len: 2,
            },
        }
    }

    /// Pair detected from the process environment.
    ///
    /// Preference order: `LC_ALL`, `LC_MESSAGES`, then `LANG`. Falls back to
    /// `en_US` when none parse.
    #[must_use]
    pub fn system() -> Self {
        detect_system_pair_with(|key| env::var(key).ok())
    }

    /// Whether both codes are empty.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.language.is_empty() && self.country.is_empty()
    }

    /// Resource name for this pair: `fr_FR`, or `fr` without a country.
    #[must_use]
    pub fn asset_name(&self) -> String {
        if self.country.is_empty() {
            self.language.to_string()
        } else {
            format!("{}_{}", self.language, self.country)
        }
    }
}

impl fmt::Debug for LocalePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalePair({}_{})", self.language, self.country)
    }
}

impl fmt::Display for LocalePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.asset_name())
    }
}

/// Detect the platform pair using a custom environment lookup.
pub fn detect_system_pair_with<F>(get_env: F) -> LocalePair
where
    F: Fn(&str) -> Option<String>,
{
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(|key| get_env(key))
        .find_map(|raw| LocalePair::parse(&raw))
        .unwrap_or_else(LocalePair::fallback)
}
