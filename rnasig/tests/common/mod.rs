#![allow(dead_code)]

use rnasig::{Folded, FoldingOracle, Result};

const PAIR_ENERGY: f64 = -0.6;

fn pairs(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'A', b'U') | (b'U', b'A') | (b'G', b'C') | (b'C', b'G') | (b'G', b'U') | (b'U', b'G')
    )
}

fn is_gap(symbol: u8) -> bool {
    matches!(symbol, b'-' | b'.' | b'~')
}

/// Closes a stem from both ends inwards; every complementary pair of
/// mirrored positions adds a fixed energy.
pub struct StemOracle;

impl StemOracle {
    fn stem(rows: &[&[u8]]) -> Folded {
        let n = rows.first().map_or(0, |r| r.len());
        let mut structure = vec![b'.'; n];
        let mut count = 0usize;
        for i in 0..n / 2 {
            let j = n - 1 - i;
            let pairing = rows
                .iter()
                .filter(|r| !is_gap(r[i]) && !is_gap(r[j]) && pairs(r[i], r[j]))
                .count();
            if j > i + 3 && 2 * pairing > rows.len() {
                structure[i] = b'(';
                structure[j] = b')';
                count += 1;
            }
        }
        Folded {
            energy: PAIR_ENERGY * count as f64,
            structure: structure.into_iter().map(char::from).collect(),
        }
    }
}

impl FoldingOracle for StemOracle {
    fn fold(&self, sequence: &str) -> Result<Folded> {
        Ok(Self::stem(&[sequence.as_bytes()]))
    }

    fn alifold(&self, alignment: &[&str]) -> Result<Folded> {
        let rows: Vec<&[u8]> = alignment.iter().map(|r| r.as_bytes()).collect();
        Ok(Self::stem(&rows))
    }
}

/// A stable hairpin of `len` nucleotides with balanced composition.
pub fn hairpin(len: usize) -> String {
    let arm = len / 2;
    let left: String = "GCAU".chars().cycle().take(arm).collect();
    let right: String = left
        .chars()
        .rev()
        .map(|c| match c {
            'G' => 'C',
            'C' => 'G',
            'A' => 'U',
            _ => 'A',
        })
        .collect();
    let loop_len = len - 2 * arm;
    format!("{left}{}{right}", "A".repeat(loop_len))
}
