//! Mono- and dinucleotide composition profiles.

/// The four nucleotide symbols in bin order.
pub const NUCLEOTIDES: [u8; 4] = *b"ACGU";

/// Number of symbol classes: A, C, G, T/U and everything else.
pub const SYMBOL_CLASSES: usize = 5;

/// Class index of unrecognised and ambiguous symbols.
pub const OTHER: usize = 4;

/// Map a symbol to its class index (A=0, C=1, G=2, T/U=3, other=4).
#[must_use]
pub fn symbol_class(symbol: u8) -> usize {
    match symbol.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' | b'U' => 3,
        _ => OTHER,
    }
}

/// The three composition ratios the regression models are trained on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BaseRatios {
    /// (G+C) / length
    pub gc: f64,
    /// A / (A+U)
    pub a: f64,
    /// C / (G+C)
    pub c: f64,
}

/// Frequency profile of a gap-free sequence.
///
/// Mononucleotide frequencies are taken over the full length (including
/// `other` symbols); dinucleotide frequencies over the `length - 1`
/// adjacent windows. Windows touching an `other` symbol count towards the
/// denominator but fall into none of the 16 bins.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionProfile {
    length: usize,
    counts: [usize; SYMBOL_CLASSES],
    mono: [f64; SYMBOL_CLASSES],
    di: [[f64; 4]; 4],
}

impl CompositionProfile {
    #[must_use]
    pub fn from_sequence(sequence: &[u8]) -> Self {
        let length = sequence.len();
        let mut mono = [0usize; SYMBOL_CLASSES];
        let mut di = [[0usize; 4]; 4];

        for pair in sequence.windows(2) {
            let (x, y) = (symbol_class(pair[0]), symbol_class(pair[1]));
            mono[x] += 1;
            if x != OTHER && y != OTHER {
                di[x][y] += 1;
            }
        }
        // the scan above never visits the final symbol as a left partner
        if let Some(&last) = sequence.last() {
            mono[symbol_class(last)] += 1;
        }

        let windows = length.saturating_sub(1);
        Self {
            length,
            counts: mono,
            mono: mono.map(|count| frequency(count, length)),
            di: di.map(|row| row.map(|count| frequency(count, windows))),
        }
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of symbols in a class (see [`symbol_class`]).
    #[must_use]
    pub fn count(&self, class: usize) -> usize {
        self.counts[class]
    }

    /// Frequency of a symbol class (see [`symbol_class`]).
    #[must_use]
    pub fn mono(&self, class: usize) -> f64 {
        self.mono[class]
    }

    /// Frequency of the ordered pair `x` then `y` over nucleotide classes 0..4.
    #[must_use]
    pub fn di(&self, x: usize, y: usize) -> f64 {
        self.di[x][y]
    }

    /// All 16 dinucleotide frequencies in AA, AC, AG, AU, CA, ... order.
    pub fn dinucleotides(&self) -> impl Iterator<Item = f64> + '_ {
        self.di.iter().flatten().copied()
    }

    /// Composition ratios, computed from whole counts so that a sequence
    /// with exactly 30% GC yields exactly `0.3`. All zero when the sequence
    /// lacks A/U or G/C entirely, since the ratios are then undefined.
    #[must_use]
    pub fn ratios(&self) -> BaseRatios {
        let [a, c, g, u, _] = self.counts;
        if self.length == 0 || a + u == 0 || g + c == 0 {
            return BaseRatios::default();
        }
        BaseRatios {
            gc: frequency(g + c, self.length),
            a: frequency(a, a + u),
            c: frequency(c, g + c),
        }
    }

    /// Largest relative deviation of any dinucleotide frequency from the
    /// product of its mononucleotide frequencies. Pairs with a zero
    /// expectation are skipped.
    #[must_use]
    pub fn max_dinucleotide_deviation(&self) -> f64 {
        let mut worst = 0.0f64;
        for x in 0..4 {
            for y in 0..4 {
                let expected = self.mono[x] * self.mono[y];
                if expected > 0.0 {
                    worst = worst.max((self.di[x][y] - expected).abs() / expected);
                }
            }
        }
        worst
    }
}

fn frequency(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn empty_sequence_is_all_zero() {
        let profile = CompositionProfile::from_sequence(b"");
        assert_eq!(profile.length(), 0);
        assert!((0..SYMBOL_CLASSES).all(|c| profile.mono(c) == 0.0));
        assert!(profile.dinucleotides().all(|f| f == 0.0));
        assert_eq!(profile.ratios(), BaseRatios::default());
    }

    #[test]
    fn single_symbol_counts_once() {
        let profile = CompositionProfile::from_sequence(b"G");
        assert!((profile.mono(2) - 1.0).abs() < EPS);
        assert!(profile.dinucleotides().all(|f| f == 0.0));
    }

    #[test]
    fn mononucleotide_frequencies_sum_to_one() {
        let profile = CompositionProfile::from_sequence(b"ACGUUGCANNA");
        let total: f64 = (0..SYMBOL_CLASSES).map(|c| profile.mono(c)).sum();
        assert!((total - 1.0).abs() < EPS);
        assert!((profile.mono(OTHER) - 2.0 / 11.0).abs() < EPS);
    }

    #[test]
    fn dinucleotide_frequencies_sum_to_one_without_other() {
        let profile = CompositionProfile::from_sequence(b"AACGUUGCAGGU");
        let total: f64 = profile.dinucleotides().sum();
        assert!((total - 1.0).abs() < EPS);
        // AA, AC, CG, GU, UU, UG, GC, CA, AG, GG, GU
        assert!((profile.di(2, 3) - 2.0 / 11.0).abs() < EPS);
    }

    #[test]
    fn thymine_counts_as_uracil() {
        let profile = CompositionProfile::from_sequence(b"ATTA");
        assert!((profile.mono(3) - 0.5).abs() < EPS);
        assert!((profile.di(3, 3) - 1.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn ratios_follow_counts() {
        let profile = CompositionProfile::from_sequence(b"AAACGGGU");
        let ratios = profile.ratios();
        assert!((ratios.gc - 0.5).abs() < EPS);
        assert!((ratios.a - 0.75).abs() < EPS);
        assert!((ratios.c - 0.25).abs() < EPS);
    }

    #[test]
    fn gc_content_is_exact_on_percent_boundaries() {
        for (c, g, gc) in [(10, 20, 0.30), (2, 18, 0.20), (10, 70, 0.80), (35, 40, 0.75)] {
            let mut sequence = b"C".repeat(c);
            sequence.extend(b"G".repeat(g));
            sequence.extend(b"AU".repeat((100 - c - g) / 2));
            let profile = CompositionProfile::from_sequence(&sequence);
            assert_eq!(profile.length(), 100);
            assert_eq!(profile.count(1), c);
            assert_eq!(profile.ratios().gc, gc);
        }
    }

    #[test]
    fn ratios_undefined_without_gc() {
        let profile = CompositionProfile::from_sequence(b"AUAUAUAU");
        assert_eq!(profile.ratios(), BaseRatios::default());
    }

    #[test]
    fn repeat_has_large_dinucleotide_deviation() {
        let repeat = b"ACGU".repeat(25);
        let profile = CompositionProfile::from_sequence(&repeat);
        assert!(profile.max_dinucleotide_deviation() > 1.5);
    }
}
