#![forbid(unsafe_code)]

//! Binary string table: a sorted, hash-keyed index into a string blob.
//!
//! # Format
//!
//! All integers are little-endian.
//!
//! ```text
//! offset  size        field
//! 0       2           version (u16, currently 1)
//! 2       2           count (u16)
//! 4       8 * count   entries: { key_hash: u32, value_offset: u32 }
//! ...     rest        blob: NUL-terminated values, offsets relative to here
//! ```
//!
//! # Invariants
//!
//! 1. **Sorted index**: entries are non-decreasing by `key_hash`; a table
//!    with a descending pair is rejected at parse time.
//! 2. **Bounded offsets**: every `value_offset` is below the blob length.
//!    Value reads stop at the first NUL and never run past the blob.
//! 3. **Immutable**: a parsed table never changes; replacing it means
//!    swapping a whole `Arc<StringTable>`.
//!
//! # Known Limitations
//!
//! Lookup is by hash only. Two distinct keys with the same [`key_hash`] are
//! indistinguishable. When a table holds several entries with the same hash,
//! lookup returns the first one in table order.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Short header / entry region | Truncated bytes | `MalformedTable` |
//! | Unknown version | Newer producer | `UnsupportedVersion` |
//! | Offset past blob | Corrupt entry | `MalformedTable` |
//! | Descending hashes | Unsorted producer | `MalformedTable` |
//! | Missing NUL / non-UTF-8 value | Corrupt blob | `lookup` returns `None` |

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::error::LocaleError;

/// Format version understood by this reader and written by the builder.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4;
const ENTRY_LEN: usize = 8;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash a text key the way table producers do: 32-bit FNV-1a over the key
/// bytes up to (not including) the first NUL.
#[must_use]
pub fn key_hash(key: impl AsRef<[u8]>) -> u32 {
    let key = key.as_ref();
    let key = memchr::memchr(0, key).map_or(key, |nul| &key[..nul]);
    key.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    key_hash: u32,
    value_offset: u32,
}

/// A parsed, read-only string table.
#[derive(Clone)]
pub struct StringTable {
    version: u16,
    entries: Vec<Entry>,
    blob: Box<[u8]>,
}

impl fmt::Debug for StringTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringTable")
            .field("version", &self.version)
            .field("entries", &self.entries.len())
            .field("blob_len", &self.blob.len())
            .finish()
    }
}

impl StringTable {
    /// Parse and validate table bytes.
    ///
    /// Nothing from `bytes` is trusted: the header, the entry region, every
    /// offset, and the ordering of hashes are all checked before the table
    /// is returned.
    pub fn parse(bytes: &[u8]) -> Result<Self, LocaleError> {
        let header = bytes
            .get(..HEADER_LEN)
            .ok_or_else(|| malformed(format!("truncated header ({} bytes)", bytes.len())))?;
        let version = u16::from_le_bytes([header[0], header[1]]);
        if version != FORMAT_VERSION {
            return Err(LocaleError::UnsupportedVersion(version));
        }
        let count = usize::from(u16::from_le_bytes([header[2], header[3]]));

        let entries_end = HEADER_LEN + count * ENTRY_LEN;
        let raw_entries = bytes.get(HEADER_LEN..entries_end).ok_or_else(|| {
            malformed(format!(
                "{count} entries need {entries_end} bytes, have {}",
                bytes.len()
            ))
        })?;
        let blob = &bytes[entries_end..];

        let mut entries = Vec::with_capacity(count);
        for (index, raw) in raw_entries.chunks_exact(ENTRY_LEN).enumerate() {
            let entry = Entry {
                key_hash: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
                value_offset: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            };
            let in_blob = usize::try_from(entry.value_offset).is_ok_and(|off| off < blob.len());
            if !in_blob {
                return Err(malformed(format!(
                    "entry {index}: value offset {} outside blob of {} bytes",
                    entry.value_offset,
                    blob.len()
                )));
            }
            let prev = entries.last().map_or(0, |e: &Entry| e.key_hash);
            if entry.key_hash < prev {
                return Err(malformed(format!(
                    "entry {index}: key hash {:#010x} sorts before {prev:#010x}",
                    entry.key_hash
                )));
            }
            entries.push(entry);
        }

        Ok(Self {
            version,
            entries,
            blob: blob.into(),
        })
    }

    /// Look up the translated value for `key`.
    ///
    /// Returns `None` when the key is absent, or when the stored value is
    /// unterminated or not valid UTF-8.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.lookup_range(key).map(|range| self.str_at(range))
    }

    /// Look up the raw value bytes for `key` (without the NUL).
    #[must_use]
    pub fn lookup_bytes(&self, key: impl AsRef<[u8]>) -> Option<&[u8]> {
        let entry = self.find(key_hash(key))?;
        self.value_range(entry.value_offset)
            .map(|range| &self.blob[range])
    }

    /// Blob range of the UTF-8 value for `key`.
    pub(crate) fn lookup_range(&self, key: &str) -> Option<Range<usize>> {
        let entry = self.find(key_hash(key))?;
        let range = self.value_range(entry.value_offset)?;
        std::str::from_utf8(&self.blob[range.clone()]).ok()?;
        Some(range)
    }

    /// String view of a range previously returned by `lookup_range`.
    pub(crate) fn str_at(&self, range: Range<usize>) -> &str {
        self.blob
            .get(range)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .unwrap_or_default()
    }

    /// First entry (in table order) whose hash equals `hash`.
    fn find(&self, hash: u32) -> Option<&Entry> {
        let index = self.entries.partition_point(|e| e.key_hash < hash);
        self.entries.get(index).filter(|e| e.key_hash == hash)
    }

    fn value_range(&self, offset: u32) -> Option<Range<usize>> {
        let start = usize::try_from(offset).ok()?;
        let tail = self.blob.get(start..)?;
        let len = memchr::memchr(0, tail)?;
        Some(start..start + len)
    }

    /// Format version tag from the header.
    #[must_use]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in table order as `(key_hash, value)`.
    ///
    /// Values that fail the terminator or UTF-8 checks come back as `None`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<&str>)> + '_ {
        self.entries.iter().map(|entry| {
            let value = self
                .value_range(entry.value_offset)
                .and_then(|range| std::str::from_utf8(&self.blob[range]).ok());
            (entry.key_hash, value)
        })
    }
}

fn malformed(reason: String) -> LocaleError {
    LocaleError::MalformedTable(reason)
}

/// Producer for the binary table format.
///
/// Keys are deduplicated by exact text (the last insert wins). Distinct keys
/// whose hashes collide are written in key order, so the lexicographically
/// smallest key's value is the one lookup returns.
#[derive(Debug, Clone, Default)]
pub struct StringTableBuilder {
    strings: BTreeMap<String, String>,
}

impl StringTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.strings.insert(key.into(), value.into());
        self
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Serialize to table bytes.
    pub fn build(&self) -> Result<Vec<u8>, LocaleError> {
        let count = u16::try_from(self.strings.len())
            .map_err(|_| LocaleError::TooManyEntries(self.strings.len()))?;

        let mut hashed: Vec<(u32, &str)> = self
            .strings
            .iter()
            .map(|(key, value)| (key_hash(key), value.as_str()))
            .collect();
        // Stable: colliding keys keep their BTreeMap (key) order.
        hashed.sort_by_key(|&(hash, _)| hash);

        let mut index = Vec::with_capacity(hashed.len() * ENTRY_LEN);
        let mut blob = Vec::new();
        for (hash, value) in hashed {
            let offset =
                u32::try_from(blob.len()).map_err(|_| LocaleError::BlobTooLarge(blob.len()))?;
            index.extend_from_slice(&hash.to_le_bytes());
            index.extend_from_slice(&offset.to_le_bytes());
            blob.extend_from_slice(value.as_bytes());
            blob.push(0);
        }

        let mut out = Vec::with_capacity(HEADER_LEN + index.len() + blob.len());
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&index);
        out.extend_from_slice(&blob);
        Ok(out)
    }

    /// Serialize and parse in one step.
    pub fn build_table(&self) -> Result<StringTable, LocaleError> {
        StringTable::parse(&self.build()?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StringTableBuilder {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = Self::new();
        for (key, value) in iter {
            builder.insert(key, value);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble table bytes by hand, bypassing the builder's guarantees.
    fn raw_table(version: u16, entries: &[(u32, u32)], blob: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for &(hash, offset) in entries {
            out.extend_from_slice(&hash.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(blob);
        out
    }

    fn ok_cancel() -> StringTable {
        [("ok", "OK"), ("cancel", "Cancel")]
            .into_iter()
            .collect::<StringTableBuilder>()
            .build_table()
            .unwrap()
    }

    #[test]
    fn fnv1a_reference_vectors() {
        assert_eq!(key_hash(""), 0x811c_9dc5);
        assert_eq!(key_hash("a"), 0xe40c_292c);
        assert_eq!(key_hash("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn key_hash_stops_at_nul() {
        assert_eq!(key_hash("ok\0trailing"), key_hash("ok"));
        assert_eq!(key_hash(b"\0abc"), key_hash(""));
    }

    #[test]
    fn ok_cancel_scenario() {
        let table = ok_cancel();
        assert_eq!(table.lookup("ok"), Some("OK"));
        assert_eq!(table.lookup("cancel"), Some("Cancel"));
        assert_eq!(table.lookup("missing"), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.version(), FORMAT_VERSION);
    }

    #[test]
    fn lookup_bytes_matches_lookup() {
        let table = ok_cancel();
        assert_eq!(table.lookup_bytes("cancel"), Some(&b"Cancel"[..]));
        assert_eq!(table.lookup_bytes("nope"), None);
    }

    #[test]
    fn empty_table_parses() {
        let table = StringTable::parse(&raw_table(FORMAT_VERSION, &[], &[])).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.lookup("anything"), None);
    }

    #[test]
    fn empty_value_is_found() {
        let table = [("blank", "")]
            .into_iter()
            .collect::<StringTableBuilder>()
            .build_table()
            .unwrap();
        assert_eq!(table.lookup("blank"), Some(""));
    }

    #[test]
    fn rejects_truncated_header() {
        for len in 0..HEADER_LEN {
            let bytes = vec![1u8; len];
            assert!(matches!(
                StringTable::parse(&bytes),
                Err(LocaleError::MalformedTable(_))
            ));
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let bytes = raw_table(2, &[], &[]);
        assert_eq!(
            StringTable::parse(&bytes).unwrap_err(),
            LocaleError::UnsupportedVersion(2)
        );
        let bytes = raw_table(0, &[], &[]);
        assert_eq!(
            StringTable::parse(&bytes).unwrap_err(),
            LocaleError::UnsupportedVersion(0)
        );
    }

    #[test]
    fn rejects_count_past_end() {
        let mut bytes = raw_table(FORMAT_VERSION, &[(1, 0)], b"x\0");
        // Claim three entries while only one is present.
        bytes[2..4].copy_from_slice(&3u16.to_le_bytes());
        bytes.truncate(HEADER_LEN + ENTRY_LEN);
        assert!(matches!(
            StringTable::parse(&bytes),
            Err(LocaleError::MalformedTable(_))
        ));
    }

    #[test]
    fn rejects_offset_outside_blob() {
        let bytes = raw_table(FORMAT_VERSION, &[(1, 2)], b"x\0");
        assert!(matches!(
            StringTable::parse(&bytes),
            Err(LocaleError::MalformedTable(_))
        ));
        let bytes = raw_table(FORMAT_VERSION, &[(1, u32::MAX)], b"x\0");
        assert!(matches!(
            StringTable::parse(&bytes),
            Err(LocaleError::MalformedTable(_))
        ));
    }

    #[test]
    fn rejects_descending_hashes() {
        let bytes = raw_table(FORMAT_VERSION, &[(9, 0), (3, 2)], b"a\0b\0");
        assert!(matches!(
            StringTable::parse(&bytes),
            Err(LocaleError::MalformedTable(_))
        ));
    }

    #[test]
    fn unterminated_value_fails_closed() {
        let ok = key_hash("ok");
        let bytes = raw_table(FORMAT_VERSION, &[(ok, 0)], b"OK");
        let table = StringTable::parse(&bytes).unwrap();
        assert_eq!(table.lookup("ok"), None);
        assert_eq!(table.lookup_bytes("ok"), None);
    }

    #[test]
    fn invalid_utf8_value_fails_closed_for_str_lookup() {
        let ok = key_hash("ok");
        let bytes = raw_table(FORMAT_VERSION, &[(ok, 0)], b"\xff\xfe\0");
        let table = StringTable::parse(&bytes).unwrap();
        assert_eq!(table.lookup("ok"), None);
        assert_eq!(table.lookup_bytes("ok"), Some(&b"\xff\xfe"[..]));
    }

    #[test]
    fn duplicate_hashes_first_entry_wins() {
        let ok = key_hash("ok");
        let bytes = raw_table(
            FORMAT_VERSION,
            &[(1, 0), (ok, 2), (ok, 8), (ok, 2), (u32::MAX, 0)],
            b"z\0first\0second\0",
        );
        let table = StringTable::parse(&bytes).unwrap();
        assert_eq!(table.lookup("ok"), Some("first"));
    }

    #[test]
    fn shared_offsets_are_allowed() {
        let (a, b) = (key_hash("yes"), key_hash("ja"));
        let mut entries = vec![(a, 0), (b, 0)];
        entries.sort_unstable();
        let table = StringTable::parse(&raw_table(FORMAT_VERSION, &entries, b"Y\0")).unwrap();
        assert_eq!(table.lookup("yes"), Some("Y"));
        assert_eq!(table.lookup("ja"), Some("Y"));
    }

    #[test]
    fn builder_last_insert_wins() {
        let mut builder = StringTableBuilder::new();
        builder.insert("k", "one").insert("k", "two");
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.build_table().unwrap().lookup("k"), Some("two"));
    }

    #[test]
    fn builder_rejects_too_many_entries() {
        let builder: StringTableBuilder = (0..=usize::from(u16::MAX))
            .map(|i| (format!("k{i}"), String::new()))
            .collect();
        assert_eq!(
            builder.build().unwrap_err(),
            LocaleError::TooManyEntries(usize::from(u16::MAX) + 1)
        );
    }

    #[test]
    fn builder_output_layout() {
        let bytes = [("ok", "OK")]
            .into_iter()
            .collect::<StringTableBuilder>()
            .build()
            .unwrap();
        assert_eq!(&bytes[..2], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(&bytes[2..4], &1u16.to_le_bytes());
        assert_eq!(&bytes[4..8], &key_hash("ok").to_le_bytes());
        assert_eq!(&bytes[8..12], &0u32.to_le_bytes());
        assert_eq!(&bytes[12..], b"OK\0");
    }

    #[test]
    fn iter_yields_table_order() {
        let table = ok_cancel();
        let hashes: Vec<u32> = table.iter().map(|(hash, _)| hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        assert_eq!(hashes, sorted);
        assert!(table.iter().all(|(_, value)| value.is_some()));
    }
}
