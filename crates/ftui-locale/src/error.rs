#![forbid(unsafe_code)]

//! Error taxonomy for string tables, locale codes, and the registry.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Malformed table | Header, bound, or ordering violation | Table rejected, context keeps "no table" |
//! | Unsupported version | Unknown format tag | Same as malformed |
//! | Missing resource | Provider has nothing for the pair | Not an error (`None`) |
//! | Allocation failure | Out of memory | Process abort via the global allocator |
//!
//! None of these ever surface through `LocaleContext::translate`.

/// Errors from locale operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleError {
    /// Table bytes violate a header, bound, or ordering check.
    MalformedTable(String),
    /// Table carries a version tag this reader does not understand.
    UnsupportedVersion(u16),
    /// A language or country code failed length/byte validation.
    InvalidCode(String),
    /// Builder was given more entries than the `u16` count can hold.
    TooManyEntries(usize),
    /// Builder blob grew past what a `u32` offset can address.
    BlobTooLarge(usize),
    /// The registry does not own the context being released.
    NotRegistered(String),
}

impl std::fmt::Display for LocaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedTable(reason) => write!(f, "malformed string table: {reason}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported string table version {v}"),
            Self::InvalidCode(code) => write!(f, "invalid locale code: {code:?}"),
            Self::TooManyEntries(n) => {
                write!(f, "too many string table entries: {n} (max {})", u16::MAX)
            }
            Self::BlobTooLarge(n) => write!(f, "string blob too large: {n} bytes"),
            Self::NotRegistered(name) => write!(f, "locale context not registered: {name}"),
        }
    }
}

impl std::error::Error for LocaleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            LocaleError::UnsupportedVersion(7).to_string(),
            "unsupported string table version 7"
        );
        assert_eq!(
            LocaleError::MalformedTable("truncated header".into()).to_string(),
            "malformed string table: truncated header"
        );
        assert_eq!(
            LocaleError::InvalidCode("eng".into()).to_string(),
            "invalid locale code: \"eng\""
        );
    }
}
