//! Composition-preserving sequence shuffles.
//!
//! The mononucleotide shuffle is a uniform permutation. The dinucleotide
//! shuffle is the Altschul–Erickson construction: adjacent symbol pairs are
//! edges of a directed multigraph over the symbol classes, and a shuffled
//! sequence is a random Eulerian path through that graph with the same
//! start and end vertex as the original.
//!
//! Every function takes its random source explicitly, so a seeded
//! [`rand::rngs::StdRng`] reproduces a run exactly.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::composition::{symbol_class, SYMBOL_CLASSES};

/// Upper bound on random last-edge selections per dinucleotide shuffle.
pub const MAX_LAST_EDGE_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShuffleError {
    /// No last-edge choice formed a tree rooted at the final symbol.
    #[error("no valid last-edge tree after {attempts} attempts")]
    Unconverged { attempts: usize },
    /// The edge walk ran out of edges before consuming all of them.
    #[error("Eulerian walk stopped early at position {position}")]
    Stuck { position: usize },
}

/// Uniform random permutation of `sequence`.
pub fn mononucleotide_shuffle<R: Rng + ?Sized>(sequence: &[u8], rng: &mut R) -> Vec<u8> {
    let mut shuffled = sequence.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

/// Random sequence with exactly the same multiset of adjacent symbol-class
/// transitions, the same length, and the same first and last symbol.
pub fn dinucleotide_shuffle<R: Rng + ?Sized>(
    sequence: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, ShuffleError> {
    dinucleotide_shuffle_bounded(sequence, rng, MAX_LAST_EDGE_ATTEMPTS)
}

/// [`dinucleotide_shuffle`] with an explicit attempt bound.
pub fn dinucleotide_shuffle_bounded<R: Rng + ?Sized>(
    sequence: &[u8],
    rng: &mut R,
    max_attempts: usize,
) -> Result<Vec<u8>, ShuffleError> {
    let (Some(&first), Some(&last)) = (sequence.first(), sequence.last()) else {
        return Ok(Vec::new());
    };
    if sequence.len() < 3 {
        return Ok(sequence.to_vec());
    }

    // edges[v] holds the destination symbols of every pair starting in class v,
    // in original order
    let mut edges: [Vec<u8>; SYMBOL_CLASSES] = Default::default();
    for pair in sequence.windows(2) {
        edges[symbol_class(pair[0])].push(pair[1]);
    }
    let terminal = symbol_class(last);

    let last_edges = choose_last_edges(&edges, terminal, rng, max_attempts)?;

    for (vertex, out) in edges.iter_mut().enumerate() {
        match last_edges[vertex] {
            Some(chosen) => {
                let end = out.len() - 1;
                out.swap(chosen, end);
                out[..end].shuffle(rng);
            }
            None => out.shuffle(rng),
        }
    }

    let mut shuffled = Vec::with_capacity(sequence.len());
    shuffled.push(first);
    let mut next = [0usize; SYMBOL_CLASSES];
    let mut vertex = symbol_class(first);
    for position in 1..sequence.len() {
        let Some(&symbol) = edges[vertex].get(next[vertex]) else {
            return Err(ShuffleError::Stuck { position });
        };
        next[vertex] += 1;
        shuffled.push(symbol);
        vertex = symbol_class(symbol);
    }
    Ok(shuffled)
}

/// Pick one outgoing edge per non-terminal vertex to be consumed last, until
/// those edges form a tree in which every vertex reaches `terminal`.
/// Returns the index of the chosen edge for each vertex.
fn choose_last_edges<R: Rng + ?Sized>(
    edges: &[Vec<u8>; SYMBOL_CLASSES],
    terminal: usize,
    rng: &mut R,
    max_attempts: usize,
) -> Result<[Option<usize>; SYMBOL_CLASSES], ShuffleError> {
    let mut chosen = [None; SYMBOL_CLASSES];
    for _ in 0..max_attempts {
        let mut successor = [None; SYMBOL_CLASSES];
        for (vertex, out) in edges.iter().enumerate() {
            if vertex == terminal || out.is_empty() {
                chosen[vertex] = None;
                continue;
            }
            let index = rng.gen_range(0..out.len());
            chosen[vertex] = Some(index);
            successor[vertex] = Some(symbol_class(out[index]));
        }
        if reaches_terminal(edges, &successor, terminal) {
            return Ok(chosen);
        }
    }
    Err(ShuffleError::Unconverged { attempts: max_attempts })
}

fn reaches_terminal(
    edges: &[Vec<u8>; SYMBOL_CLASSES],
    successor: &[Option<usize>; SYMBOL_CLASSES],
    terminal: usize,
) -> bool {
    (0..SYMBOL_CLASSES)
        .filter(|&vertex| vertex != terminal && !edges[vertex].is_empty())
        .all(|start| {
            let mut vertex = start;
            // a path longer than the vertex count has entered a cycle
            for _ in 0..SYMBOL_CLASSES {
                match successor[vertex] {
                    Some(next) if next == terminal => return true,
                    Some(next) => vertex = next,
                    None => return false,
                }
            }
            false
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn transitions(sequence: &[u8]) -> HashMap<(u8, u8), usize> {
        let mut counts = HashMap::new();
        for pair in sequence.windows(2) {
            *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
        }
        counts
    }

    fn sorted(sequence: &[u8]) -> Vec<u8> {
        let mut copy = sequence.to_vec();
        copy.sort_unstable();
        copy
    }

    fn rna_seq(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(
            prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'U'), Just(b'N')],
            0..=max_len,
        )
    }

    #[test]
    fn short_sequences_are_returned_unchanged() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(dinucleotide_shuffle(b"", &mut rng).unwrap(), b"");
        assert_eq!(dinucleotide_shuffle(b"A", &mut rng).unwrap(), b"A");
        assert_eq!(dinucleotide_shuffle(b"AC", &mut rng).unwrap(), b"AC");
    }

    #[test]
    fn homopolymer_has_a_single_ordering() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(dinucleotide_shuffle(b"AAAAAA", &mut rng).unwrap(), b"AAAAAA");
    }

    #[test]
    fn shuffle_actually_reorders() {
        let source = b"GGGAAACCCUUUGCAUGCAUACGUACGUAAGGCCUU";
        let mut rng = StdRng::seed_from_u64(3);
        let differs = (0..20).any(|_| dinucleotide_shuffle(source, &mut rng).unwrap() != source);
        assert!(differs);
    }

    #[test]
    fn seeded_shuffles_are_reproducible() {
        let source = b"ACGUUGCAACGGUUCAGCAUGCAUCG";
        let a = dinucleotide_shuffle(source, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = dinucleotide_shuffle(source, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        let c = mononucleotide_shuffle(source, &mut StdRng::seed_from_u64(7));
        let d = mononucleotide_shuffle(source, &mut StdRng::seed_from_u64(7));
        assert_eq!(c, d);
    }

    #[test]
    fn zero_attempt_budget_does_not_converge() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            dinucleotide_shuffle_bounded(b"ACGUACGU", &mut rng, 0),
            Err(ShuffleError::Unconverged { attempts: 0 })
        );
    }

    proptest! {
        #[test]
        fn dinucleotide_shuffle_preserves_transitions(seq in rna_seq(120), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = dinucleotide_shuffle(&seq, &mut rng);
            prop_assume!(!matches!(result, Err(ShuffleError::Unconverged { .. })));
            let shuffled = result.unwrap();
            prop_assert_eq!(shuffled.len(), seq.len());
            prop_assert_eq!(shuffled.first(), seq.first());
            prop_assert_eq!(shuffled.last(), seq.last());
            prop_assert_eq!(transitions(&shuffled), transitions(&seq));
        }

        #[test]
        fn mononucleotide_shuffle_preserves_symbols(seq in rna_seq(120), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = mononucleotide_shuffle(&seq, &mut rng);
            prop_assert_eq!(sorted(&shuffled), sorted(&seq));
        }
    }
}
