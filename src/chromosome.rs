//! Fixed-length codon chromosomes.
//!
//! A [`Chromosome`] is the unit of structural variation. Its last three codons
//! are structural genes that are read after every mutation:
//!
//! | offset from end | gene        | start value | signal                 |
//! |-----------------|-------------|-------------|------------------------|
//! | 1               | elimination | `max_codon` | `< max_codon`: removed |
//! | 2               | duplication | 1           | `> 1`: duplicated      |
//! | 3               | scale       | 1           | mutates by at most one |

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LineageConfig;
use crate::selection::select_mutation_loci;

/// A single genome symbol in `[1, max_codon]`.
pub type Codon = u8;

/// Number of trailing structural genes every chromosome carries.
pub const STRUCTURAL_GENE_COUNT: usize = 3;

const ELIMINATION_GENE_OFFSET: usize = 1;
const DUPLICATION_GENE_OFFSET: usize = 2;
const SCALE_GENE_OFFSET: usize = 3;

/// Neutral value for the duplication and scale genes.
const NEUTRAL_CODON: Codon = 1;

/// Loci changed by the last mutation together with the codons they held before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Codons as they were before the mutation.
    pub previous: Vec<Codon>,
    /// Ascending positions that were redrawn.
    pub loci: Vec<usize>,
}

/// Count of codon positions at each absolute difference from a reference.
///
/// Bucket `d` holds the number of positions that differ by exactly `d`, so
/// bucket 0 counts exact matches and bucket 1 near matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceHistogram(Vec<u32>);

impl DifferenceHistogram {
    /// An all-zero histogram with one bucket per possible difference magnitude.
    #[must_use]
    pub fn zeros(max_codon: Codon) -> Self {
        Self(vec![0; usize::from(max_codon)])
    }

    /// Raw bucket counts.
    #[must_use]
    pub fn buckets(&self) -> &[u32] {
        &self.0
    }

    /// Count in bucket `difference`, or 0 past the last bucket.
    #[must_use]
    pub fn bucket(&self, difference: usize) -> u32 {
        self.0.get(difference).copied().unwrap_or(0)
    }

    /// Positions that match exactly.
    #[must_use]
    pub fn exact_matches(&self) -> u32 {
        self.bucket(0)
    }

    /// Positions that differ by one.
    #[must_use]
    pub fn near_matches(&self) -> u32 {
        self.bucket(1)
    }

    /// Sum of all buckets.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Element-wise add `other` into `self`.
    pub fn accumulate(&mut self, other: &DifferenceHistogram) {
        if other.0.len() > self.0.len() {
            self.0.resize(other.0.len(), 0);
        }
        for (mine, theirs) in self.0.iter_mut().zip(&other.0) {
            *mine += theirs;
        }
    }
}

/// An ordered, fixed-length codon sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    codons: Vec<Codon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mutation: Option<MutationRecord>,
}

impl Chromosome {
    /// Wrap an existing codon sequence.
    #[must_use]
    pub fn from_codons(codons: Vec<Codon>) -> Self {
        Self {
            codons,
            mutation: None,
        }
    }

    /// Create a chromosome of the configured length with uniform random codons.
    ///
    /// The structural genes start neutral so no chromosome is born
    /// pre-eliminated or pre-duplicated.
    #[must_use]
    pub fn random<R: Rng>(config: &LineageConfig, rng: &mut R) -> Self {
        let len = config.chromosome_length();
        let mut codons: Vec<Codon> = (0..len)
            .map(|_| rng.random_range(1..=config.max_codon))
            .collect();

        if len >= STRUCTURAL_GENE_COUNT {
            codons[len - SCALE_GENE_OFFSET] = NEUTRAL_CODON;
            codons[len - DUPLICATION_GENE_OFFSET] = NEUTRAL_CODON;
            codons[len - ELIMINATION_GENE_OFFSET] = config.max_codon;
        }

        Self::from_codons(codons)
    }

    /// Independent copy of the codons, without mutation history.
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self::from_codons(self.codons.clone())
    }

    #[must_use]
    pub fn codons(&self) -> &[Codon] {
        &self.codons
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }

    /// Record of the most recent mutation, if any.
    #[must_use]
    pub fn last_mutation(&self) -> Option<&MutationRecord> {
        self.mutation.as_ref()
    }

    /// Sum of absolute per-codon differences.
    #[must_use]
    pub fn numeric_difference(&self, other: &Chromosome) -> u32 {
        debug_assert_eq!(self.len(), other.len());
        self.codons
            .iter()
            .zip(&other.codons)
            .map(|(a, b)| u32::from(a.abs_diff(*b)))
            .sum()
    }

    /// Histogram of per-codon absolute differences against `other`.
    ///
    /// An absent `other` yields all-zero buckets.
    #[must_use]
    pub fn histogram_difference(
        &self,
        other: Option<&Chromosome>,
        max_codon: Codon,
    ) -> DifferenceHistogram {
        let mut histogram = DifferenceHistogram::zeros(max_codon);
        if let Some(other) = other {
            debug_assert_eq!(self.len(), other.len());
            for (a, b) in self.codons.iter().zip(&other.codons) {
                let d = usize::from(a.abs_diff(*b));
                if d >= histogram.0.len() {
                    histogram.0.resize(d + 1, 0);
                }
                histogram.0[d] += 1;
            }
        }
        histogram
    }

    /// Choose `count` distinct loci uniformly at random.
    #[must_use]
    pub fn select_mutation_loci<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        select_mutation_loci(self.len(), count, rng)
    }

    /// Redraw `mutations_per_chromosome` loci in place.
    ///
    /// Ordinary loci (structural genes included) get a fresh uniform codon. The
    /// scale gene only steps to a neighbor of its current value or stays put.
    ///
    /// Codons outside `[1, max_codon]`, left over from a configuration with a
    /// larger alphabet, are first clamped into range.
    pub fn mutate<R: Rng>(&mut self, config: &LineageConfig, rng: &mut R) -> &MutationRecord {
        let previous = self.codons.clone();
        self.clamp_codons(config.max_codon);
        let loci = self.select_mutation_loci(config.mutations_per_chromosome, rng);
        let scale_locus = self.scale_gene_locus();

        for &locus in &loci {
            self.codons[locus] = if Some(locus) == scale_locus {
                // Clamped above, so low <= old <= high.
                let old = self.codons[locus];
                let low = old.saturating_sub(1).max(1);
                let high = old.saturating_add(1).min(config.max_codon);
                rng.random_range(low..=high)
            } else {
                rng.random_range(1..=config.max_codon)
            };
        }
        log::trace!("mutated loci {:?}", loci);

        self.mutation.insert(MutationRecord { previous, loci })
    }

    /// A mutated replica; `self` is left untouched.
    #[must_use]
    pub fn mutated<R: Rng>(&self, config: &LineageConfig, rng: &mut R) -> Self {
        let mut child = self.replicate();
        child.mutate(config, rng);
        child
    }

    /// The elimination gene has dropped below `max_codon`.
    #[must_use]
    pub fn has_elimination_gene(&self, max_codon: Codon) -> bool {
        self.gene(ELIMINATION_GENE_OFFSET)
            .is_some_and(|c| c < max_codon)
    }

    /// The duplication gene has risen above neutral.
    #[must_use]
    pub fn has_duplication_gene(&self) -> bool {
        self.gene(DUPLICATION_GENE_OFFSET)
            .is_some_and(|c| c > NEUTRAL_CODON)
    }

    pub fn reset_duplication_gene(&mut self) {
        self.set_gene(DUPLICATION_GENE_OFFSET, NEUTRAL_CODON);
    }

    pub fn reset_scale_gene(&mut self) {
        self.set_gene(SCALE_GENE_OFFSET, NEUTRAL_CODON);
    }

    /// Current value of the scale gene.
    #[must_use]
    pub fn scale_gene(&self) -> Option<Codon> {
        self.gene(SCALE_GENE_OFFSET)
    }

    fn clamp_codons(&mut self, max_codon: Codon) {
        for codon in &mut self.codons {
            *codon = (*codon).clamp(1, max_codon);
        }
    }

    fn scale_gene_locus(&self) -> Option<usize> {
        self.len().checked_sub(SCALE_GENE_OFFSET)
    }

    fn gene(&self, offset: usize) -> Option<Codon> {
        let idx = self.len().checked_sub(offset)?;
        self.codons.get(idx).copied()
    }

    fn set_gene(&mut self, offset: usize, value: Codon) {
        if let Some(idx) = self.len().checked_sub(offset) {
            self.codons[idx] = value;
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for codon in &self.codons {
            write!(f, "{codon}")?;
        }
        Ok(())
    }
}
