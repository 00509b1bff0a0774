#![forbid(unsafe_code)]

//! Translation hooks and translation results.
//!
//! A context resolves text through a fixed order, stopping at the first
//! step that yields a non-empty value:
//!
//! 1. [`Translator::Custom`] (user overrides win over shipped resources)
//! 2. the context's string table
//! 3. [`Translator::FallbackWithContext`]
//! 4. [`Translator::Fallback`]
//! 5. the input text unchanged
//!
//! Each slot holds at most one translator; installing a translator replaces
//! whatever occupied its slot.

use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

use crate::code::LocalePair;
use crate::table::StringTable;

/// Hook receiving only the text.
pub type PlainHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Hook receiving the active pair along with the text.
pub type ContextHook = Arc<dyn Fn(&LocalePair, &str) -> Option<String> + Send + Sync>;

/// Which resolution step produced a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationSource {
    Custom,
    Table,
    FallbackWithContext,
    Fallback,
    /// Nothing matched; the input text was returned.
    Identity,
}

/// Resolution order consulted by `LocaleContext::translate`.
pub const RESOLUTION_ORDER: [TranslationSource; 4] = [
    TranslationSource::Custom,
    TranslationSource::Table,
    TranslationSource::FallbackWithContext,
    TranslationSource::Fallback,
];

/// An external translation provider occupying one hook slot.
#[derive(Clone)]
pub enum Translator {
    /// Consulted before the string table.
    Custom(ContextHook),
    /// Consulted after the table, before [`Translator::Fallback`].
    FallbackWithContext(ContextHook),
    /// Consulted last.
    Fallback(PlainHook),
}

impl Translator {
    pub fn custom(
        hook: impl Fn(&LocalePair, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(Arc::new(hook))
    }

    pub fn fallback_with_context(
        hook: impl Fn(&LocalePair, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self::FallbackWithContext(Arc::new(hook))
    }

    pub fn fallback(hook: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self::Fallback(Arc::new(hook))
    }

    /// The resolution step this translator serves.
    #[must_use]
    pub fn source(&self) -> TranslationSource {
        match self {
            Self::Custom(_) => TranslationSource::Custom,
            Self::FallbackWithContext(_) => TranslationSource::FallbackWithContext,
            Self::Fallback(_) => TranslationSource::Fallback,
        }
    }

    /// Run the hook. Empty results count as "not found".
    pub(crate) fn apply(&self, pair: &LocalePair, text: &str) -> Option<String> {
        let result = match self {
            Self::Custom(hook) | Self::FallbackWithContext(hook) => hook(pair, text),
            Self::Fallback(hook) => hook(text),
        };
        result.filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Translator").field(&self.source()).finish()
    }
}

/// The three hook slots of a context.
#[derive(Debug, Clone, Default)]
pub(crate) struct HookSet {
    custom: Option<Translator>,
    fallback_with_context: Option<Translator>,
    fallback: Option<Translator>,
}

impl HookSet {
    fn slot_mut(&mut self, source: TranslationSource) -> Option<&mut Option<Translator>> {
        match source {
            TranslationSource::Custom => Some(&mut self.custom),
            TranslationSource::FallbackWithContext => Some(&mut self.fallback_with_context),
            TranslationSource::Fallback => Some(&mut self.fallback),
            TranslationSource::Table | TranslationSource::Identity => None,
        }
    }

    pub(crate) fn get(&self, source: TranslationSource) -> Option<&Translator> {
        match source {
            TranslationSource::Custom => self.custom.as_ref(),
            TranslationSource::FallbackWithContext => self.fallback_with_context.as_ref(),
            TranslationSource::Fallback => self.fallback.as_ref(),
            TranslationSource::Table | TranslationSource::Identity => None,
        }
    }

    /// Install `translator`, returning the one it displaced.
    pub(crate) fn install(&mut self, translator: Translator) -> Option<Translator> {
        self.slot_mut(translator.source())
            .and_then(|slot| slot.replace(translator))
    }

    pub(crate) fn remove(&mut self, source: TranslationSource) -> Option<Translator> {
        self.slot_mut(source).and_then(Option::take)
    }
}

enum Repr<'a> {
    Source(&'a str),
    Owned(String),
    Table {
        table: Arc<StringTable>,
        range: Range<usize>,
    },
}

/// Result of a translation: derefs to `str` and remembers its provenance.
///
/// Table-backed results keep the table alive, so they stay valid even if the
/// context swaps in a new table afterwards.
pub struct Translated<'a> {
    repr: Repr<'a>,
    source: TranslationSource,
}

impl<'a> Translated<'a> {
    pub(crate) fn identity(text: &'a str) -> Self {
        Self {
            repr: Repr::Source(text),
            source: TranslationSource::Identity,
        }
    }

    pub(crate) fn hooked(value: String, source: TranslationSource) -> Self {
        Self {
            repr: Repr::Owned(value),
            source,
        }
    }

    pub(crate) fn from_table(table: Arc<StringTable>, range: Range<usize>) -> Self {
        Self {
            repr: Repr::Table { table, range },
            source: TranslationSource::Table,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match &self.repr {
            Repr::Source(text) => text,
            Repr::Owned(value) => value,
            Repr::Table { table, range } => table.str_at(range.clone()),
        }
    }

    /// Which resolution step produced this value.
    #[must_use]
    pub fn source(&self) -> TranslationSource {
        self.source
    }

    /// Whether any step other than the identity fallback matched.
    #[must_use]
    pub fn is_translated(&self) -> bool {
        self.source != TranslationSource::Identity
    }

    #[must_use]
    pub fn into_owned(self) -> String {
        match self.repr {
            Repr::Owned(value) => value,
            _ => self.as_str().to_string(),
        }
    }
}

impl Deref for Translated<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Translated<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Translated<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Translated<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translated")
            .field("text", &self.as_str())
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq<str> for Translated<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Translated<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<Translated<'_>> for String {
    fn from(value: Translated<'_>) -> Self {
        value.into_owned()
    }
}
