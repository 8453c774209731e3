//! Nucleotide sequences as seen by the scoring engine.

use std::fmt;

/// Gap characters accepted in aligned rows.
pub const GAP_SYMBOLS: [u8; 3] = [b'-', b'.', b'~'];

/// An RNA sequence: upper-case ASCII, `T` folded to `U`, gaps optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Sequence(String);

impl Sequence {
    /// Normalise an aligned row. Gaps are kept so columns stay aligned.
    #[must_use]
    pub fn from_aligned(row: &str) -> Self {
        Self::from_ascii(row.bytes())
    }

    /// Build a sequence from raw bytes, e.g. the output of a shuffler.
    /// Non-ASCII bytes become `N`.
    #[must_use]
    pub fn from_ascii(bytes: impl IntoIterator<Item = u8>) -> Self {
        Self(bytes.into_iter().map(normalize_symbol).map(char::from).collect())
    }

    /// The sequence with all gap characters removed.
    #[must_use]
    pub fn ungapped(&self) -> Self {
        Self(self.0.chars().filter(|c| !is_gap(*c as u8)).collect())
    }

    /// Reverse complement; gaps and ambiguity codes are kept in place.
    #[must_use]
    pub fn reverse_complement(&self) -> Self {
        Self(self.0.bytes().rev().map(complement).map(char::from).collect())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Sequence {
    fn from(value: &str) -> Self {
        Self::from_aligned(value)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[must_use]
pub fn is_gap(symbol: u8) -> bool {
    GAP_SYMBOLS.contains(&symbol)
}

fn normalize_symbol(symbol: u8) -> u8 {
    if !symbol.is_ascii() {
        return b'N';
    }
    match symbol.to_ascii_uppercase() {
        b'T' => b'U',
        other => other,
    }
}

fn complement(symbol: u8) -> u8 {
    match symbol {
        b'A' => b'U',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_aligned_normalises_case_and_thymine() {
        let seq = Sequence::from_aligned("acgT-n");
        assert_eq!(seq.as_str(), "ACGU-N");
    }

    #[test]
    fn ungapped_removes_all_gap_symbols() {
        let seq = Sequence::from_aligned("A-C.G~U");
        assert_eq!(seq.ungapped().as_str(), "ACGU");
        assert_eq!(seq.len(), 7);
    }

    #[test]
    fn reverse_complement_keeps_gaps() {
        let seq = Sequence::from_aligned("AAC-GN");
        assert_eq!(seq.reverse_complement().as_str(), "NC-GUU");
    }

    #[test]
    fn non_ascii_becomes_n() {
        // 'Ä' is two bytes in UTF-8
        let seq = Sequence::from_aligned("AÄC");
        assert_eq!(seq.as_str(), "ANNC");
    }
}
