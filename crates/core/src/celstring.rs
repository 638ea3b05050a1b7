//! CelString / CelBytes - shared immutable text and octet sequences
//!
//! Both types support two backings:
//! 1. Contiguous: a single shared allocation
//! 2. Chunked: a rope of shared chunks, so concatenation appends chunk
//!    handles instead of copying and slicing can share interior chunks
//!
//! The backing is an evaluation option; semantics are identical. Equality,
//! ordering, and hashing walk the byte stream so two strings with
//! different chunk boundaries compare and hash the same.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Which backing newly produced strings and bytes use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringBacking {
    /// One shared contiguous allocation per value
    #[default]
    Contiguous,
    /// Rope of shared chunks; concat and slicing avoid copying
    Chunked,
}

#[derive(Clone)]
enum StrRepr {
    Contiguous(Arc<str>),
    Chunked(Arc<[Arc<str>]>),
}

/// Immutable UTF-8 string value.
///
/// `size()` counts Unicode code points, per CEL semantics. Byte length is
/// available separately for hosts that need it.
#[derive(Clone)]
pub struct CelString {
    repr: StrRepr,
}

impl CelString {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        CelString {
            repr: StrRepr::Contiguous(s.into()),
        }
    }

    pub fn empty() -> Self {
        CelString::new("")
    }

    /// Build from chunks, normalizing the all-empty case.
    pub fn from_chunks(chunks: Vec<Arc<str>>) -> Self {
        let chunks: Vec<Arc<str>> = chunks.into_iter().filter(|c| !c.is_empty()).collect();
        match chunks.len() {
            0 => CelString::empty(),
            1 => CelString {
                repr: StrRepr::Contiguous(chunks.into_iter().next().unwrap()),
            },
            _ => CelString {
                repr: StrRepr::Chunked(chunks.into()),
            },
        }
    }

    /// Chunk views in order. Contiguous strings yield a single chunk.
    pub fn chunks(&self) -> impl Iterator<Item = &str> {
        let (single, many): (Option<&str>, &[Arc<str>]) = match &self.repr {
            StrRepr::Contiguous(s) => (Some(s.as_ref()), &[]),
            StrRepr::Chunked(chunks) => (None, chunks.as_ref()),
        };
        single
            .into_iter()
            .chain(many.iter().map(|c| c.as_ref()))
    }

    fn byte_iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.chunks().flat_map(|c| c.bytes())
    }

    pub fn len_bytes(&self) -> usize {
        self.chunks().map(str::len).sum()
    }

    /// Unicode code-point count (CEL `size(string)`)
    pub fn size(&self) -> usize {
        self.chunks().map(|c| c.chars().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks().all(str::is_empty)
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.repr, StrRepr::Chunked(_))
    }

    /// Borrow when contiguous, flatten otherwise.
    pub fn as_cow(&self) -> Cow<'_, str> {
        match &self.repr {
            StrRepr::Contiguous(s) => Cow::Borrowed(s.as_ref()),
            StrRepr::Chunked(chunks) => {
                let mut out = String::with_capacity(self.len_bytes());
                for c in chunks.iter() {
                    out.push_str(c);
                }
                Cow::Owned(out)
            }
        }
    }

    /// Concatenate, producing the requested backing.
    /// The chunked form appends chunk handles without copying text.
    pub fn concat(&self, other: &CelString, backing: StringBacking) -> CelString {
        match backing {
            StringBacking::Contiguous => {
                let mut out = String::with_capacity(self.len_bytes() + other.len_bytes());
                for c in self.chunks().chain(other.chunks()) {
                    out.push_str(c);
                }
                CelString::new(out)
            }
            StringBacking::Chunked => {
                let mut chunks: Vec<Arc<str>> = Vec::new();
                for repr in [&self.repr, &other.repr] {
                    match repr {
                        StrRepr::Contiguous(s) => chunks.push(Arc::clone(s)),
                        StrRepr::Chunked(cs) => chunks.extend(cs.iter().cloned()),
                    }
                }
                CelString::from_chunks(chunks)
            }
        }
    }

    /// Substring over code-point indices `[start, end)`.
    /// Returns None when the range is out of bounds or inverted.
    /// Chunked strings share interior chunks; only boundary chunks copy.
    pub fn substring(&self, start: usize, end: usize) -> Option<CelString> {
        if start > end || end > self.size() {
            return None;
        }
        if start == end {
            return Some(CelString::empty());
        }
        let mut out: Vec<Arc<str>> = Vec::new();
        let mut pos = 0usize; // code points consumed so far
        for chunk in self.chunks() {
            let chunk_len = chunk.chars().count();
            let chunk_start = pos;
            let chunk_end = pos + chunk_len;
            pos = chunk_end;
            if chunk_end <= start || chunk_start >= end {
                continue;
            }
            if start <= chunk_start && end >= chunk_end {
                // whole chunk survives; share it when we hold a handle
                out.push(match &self.repr {
                    StrRepr::Contiguous(s) => Arc::clone(s),
                    StrRepr::Chunked(_) => Arc::from(chunk),
                });
                continue;
            }
            let lo = start.saturating_sub(chunk_start);
            let hi = end.min(chunk_end) - chunk_start;
            let byte_lo = char_to_byte_index(chunk, lo);
            let byte_hi = char_to_byte_index(chunk, hi);
            out.push(Arc::from(&chunk[byte_lo..byte_hi]));
        }
        Some(CelString::from_chunks(out))
    }
}

fn char_to_byte_index(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl PartialEq for CelString {
    fn eq(&self, other: &Self) -> bool {
        self.len_bytes() == other.len_bytes() && self.byte_iter().eq(other.byte_iter())
    }
}

impl Eq for CelString {}

impl PartialOrd for CelString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CelString {
    /// Code-point order, which for UTF-8 equals byte order.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.byte_iter().cmp(other.byte_iter())
    }
}

impl Hash for CelString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for chunk in self.chunks() {
            state.write(chunk.as_bytes());
        }
        state.write_u8(0xff);
    }
}

impl PartialEq<str> for CelString {
    fn eq(&self, other: &str) -> bool {
        self.len_bytes() == other.len() && self.byte_iter().eq(other.bytes())
    }
}

impl PartialEq<&str> for CelString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl From<&str> for CelString {
    fn from(s: &str) -> Self {
        CelString::new(s)
    }
}

impl From<String> for CelString {
    fn from(s: String) -> Self {
        CelString::new(s)
    }
}

impl fmt::Display for CelString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CelString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_cow())
    }
}

#[derive(Clone)]
enum BytesRepr {
    Contiguous(Arc<[u8]>),
    Chunked(Arc<[Arc<[u8]>]>),
}

/// Immutable octet sequence with the same dual backing as CelString.
/// `size()` is the octet count.
#[derive(Clone)]
pub struct CelBytes {
    repr: BytesRepr,
}

impl CelBytes {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        CelBytes {
            repr: BytesRepr::Contiguous(bytes.into()),
        }
    }

    pub fn empty() -> Self {
        CelBytes::new(&[][..])
    }

    pub fn from_chunks(chunks: Vec<Arc<[u8]>>) -> Self {
        let chunks: Vec<Arc<[u8]>> = chunks.into_iter().filter(|c| !c.is_empty()).collect();
        match chunks.len() {
            0 => CelBytes::empty(),
            1 => CelBytes {
                repr: BytesRepr::Contiguous(chunks.into_iter().next().unwrap()),
            },
            _ => CelBytes {
                repr: BytesRepr::Chunked(chunks.into()),
            },
        }
    }

    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        let (single, many): (Option<&[u8]>, &[Arc<[u8]>]) = match &self.repr {
            BytesRepr::Contiguous(b) => (Some(b.as_ref()), &[]),
            BytesRepr::Chunked(chunks) => (None, chunks.as_ref()),
        };
        single
            .into_iter()
            .chain(many.iter().map(|c| c.as_ref()))
    }

    fn byte_iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.chunks().flat_map(|c| c.iter().copied())
    }

    /// Octet count (CEL `size(bytes)`)
    pub fn size(&self) -> usize {
        self.chunks().map(<[u8]>::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for c in self.chunks() {
            out.extend_from_slice(c);
        }
        out
    }

    pub fn as_cow(&self) -> Cow<'_, [u8]> {
        match &self.repr {
            BytesRepr::Contiguous(b) => Cow::Borrowed(b.as_ref()),
            BytesRepr::Chunked(_) => Cow::Owned(self.to_vec()),
        }
    }

    pub fn concat(&self, other: &CelBytes, backing: StringBacking) -> CelBytes {
        match backing {
            StringBacking::Contiguous => {
                let mut out = Vec::with_capacity(self.size() + other.size());
                for c in self.chunks().chain(other.chunks()) {
                    out.extend_from_slice(c);
                }
                CelBytes::new(out)
            }
            StringBacking::Chunked => {
                let mut chunks: Vec<Arc<[u8]>> = Vec::new();
                for repr in [&self.repr, &other.repr] {
                    match repr {
                        BytesRepr::Contiguous(b) => chunks.push(Arc::clone(b)),
                        BytesRepr::Chunked(cs) => chunks.extend(cs.iter().cloned()),
                    }
                }
                CelBytes::from_chunks(chunks)
            }
        }
    }
}

impl PartialEq for CelBytes {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.byte_iter().eq(other.byte_iter())
    }
}

impl Eq for CelBytes {}

impl PartialOrd for CelBytes {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CelBytes {
    /// Lexicographic octet order
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.byte_iter().cmp(other.byte_iter())
    }
}

impl Hash for CelBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for chunk in self.chunks() {
            state.write(chunk);
        }
        state.write_u8(0xff);
    }
}

impl From<&[u8]> for CelBytes {
    fn from(b: &[u8]) -> Self {
        CelBytes::new(b)
    }
}

impl From<Vec<u8>> for CelBytes {
    fn from(b: Vec<u8>) -> Self {
        CelBytes::new(b)
    }
}

impl fmt::Debug for CelBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"")?;
        for b in self.byte_iter() {
            match b {
                b'"' => write!(f, "\\\"")?,
                b'\\' => write!(f, "\\\\")?,
                0x20..=0x7e => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{:02x}", b)?,
            }
        }
        write!(f, "\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(v: &T) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_chunk_boundaries_are_invisible() {
        let flat = CelString::new("hello world");
        let rope = CelString::from_chunks(vec![Arc::from("hel"), Arc::from("lo wo"), Arc::from("rld")]);
        assert_eq!(flat, rope);
        assert_eq!(hash_of(&flat), hash_of(&rope), "hash must ignore chunking");
        assert_eq!(flat.cmp(&rope), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_size_counts_code_points() {
        let s = CelString::new("héllo жмых");
        assert_eq!(s.size(), 10);
        assert!(s.len_bytes() > 10);
    }

    #[test]
    fn test_chunked_concat_shares_chunks() {
        let a = CelString::new("left-");
        let b = CelString::new("right");
        let joined = a.concat(&b, StringBacking::Chunked);
        assert!(joined.is_chunked());
        assert_eq!(joined, "left-right");
        assert_eq!(joined.size(), 10);

        let flat = a.concat(&b, StringBacking::Contiguous);
        assert!(!flat.is_chunked());
        assert_eq!(flat, joined);
    }

    #[test]
    fn test_substring_by_code_points() {
        let s = CelString::new("aжcд");
        let mid = s.substring(1, 3).unwrap();
        assert_eq!(mid, "жc");
        assert!(s.substring(2, 9).is_none(), "out of range must be None");

        let rope = CelString::from_chunks(vec![Arc::from("ab"), Arc::from("cd"), Arc::from("ef")]);
        assert_eq!(rope.substring(1, 5).unwrap(), "bcde");
        assert_eq!(rope.substring(2, 4).unwrap(), "cd");
    }

    #[test]
    fn test_bytes_order_and_debug() {
        let a = CelBytes::from(&b"\x01\x02"[..]);
        let b = CelBytes::from(&b"\x01\x03"[..]);
        assert!(a < b);
        assert_eq!(format!("{:?}", CelBytes::from(&b"ok\x00"[..])), "b\"ok\\x00\"");
    }

    #[test]
    fn test_bytes_chunked_equality() {
        let flat = CelBytes::from(&b"abcdef"[..]);
        let rope = CelBytes::from_chunks(vec![Arc::from(&b"abc"[..]), Arc::from(&b"def"[..])]);
        assert_eq!(flat, rope);
        assert_eq!(flat.size(), 6);
        assert_eq!(hash_of(&flat), hash_of(&rope));
    }
}
