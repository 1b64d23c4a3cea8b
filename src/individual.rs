//! Individuals: variable-length chromosome lists with recombination and
//! structural mutation.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chromosome::{Chromosome, Codon, DifferenceHistogram};
use crate::config::LineageConfig;
use crate::error::{LineageError, Result};
use crate::selection::weighted_index;

/// Numeric-difference penalty for each chromosome one side has and the other lacks.
pub const MISSING_CHROMOSOME_PENALTY: u32 = 95;

/// Position of an individual within the lineage.
///
/// Used for parent links so that generations never hold references into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndividualKey {
    pub generation: usize,
    pub index: usize,
}

/// Structural outcome of one [`Individual::mutate`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralChange {
    pub eliminated: usize,
    pub duplicated: usize,
}

/// An organism: an ordered list of chromosomes plus its lineage bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Chromosomes in order. May become empty, at which point the individual is extinct.
    pub chromosomes: Vec<Chromosome>,
    /// Generation this individual belongs to.
    pub generation: usize,
    /// Slot within its population.
    pub index: usize,
    /// The two parents in the previous generation; `None` for seeded individuals.
    #[serde(default)]
    pub parents: Option<[IndividualKey; 2]>,
    /// Chromosomes removed by the elimination gene during mutation.
    #[serde(default)]
    pub eliminated: Vec<Chromosome>,
    /// Set when the caller picks this individual as the generation's fitness reference.
    #[serde(default)]
    pub is_archetype: bool,
    #[serde(default)]
    mutated: bool,
}

impl Individual {
    /// Build an individual from explicit chromosomes with no parents.
    #[must_use]
    pub fn new(chromosomes: Vec<Chromosome>, generation: usize, index: usize) -> Self {
        Self {
            chromosomes,
            generation,
            index,
            parents: None,
            eliminated: Vec::new(),
            is_archetype: false,
            mutated: false,
        }
    }

    /// A first-generation individual with `initial_chromosome_count` random chromosomes.
    #[must_use]
    pub fn random<R: Rng>(
        generation: usize,
        index: usize,
        config: &LineageConfig,
        rng: &mut R,
    ) -> Self {
        let chromosomes = (0..config.initial_chromosome_count)
            .map(|_| Chromosome::random(config, rng))
            .collect();
        Self::new(chromosomes, generation, index)
    }

    #[must_use]
    pub fn key(&self) -> IndividualKey {
        IndividualKey {
            generation: self.generation,
            index: self.index,
        }
    }

    #[must_use]
    pub fn is_extinct(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Whether [`mutate`](Self::mutate) has already run on this individual.
    #[must_use]
    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    /// Element-wise sum of per-chromosome difference histograms against `archetype`.
    ///
    /// Chromosomes are aligned by position. A position missing on either side
    /// contributes nothing.
    #[must_use]
    pub fn difference_vector(
        &self,
        archetype: &Individual,
        max_codon: Codon,
    ) -> DifferenceHistogram {
        let mut total = DifferenceHistogram::zeros(max_codon);
        for (i, chromosome) in self.chromosomes.iter().enumerate() {
            let histogram = chromosome.histogram_difference(archetype.chromosomes.get(i), max_codon);
            total.accumulate(&histogram);
        }
        total
    }

    /// Summed absolute codon difference against `archetype`, plus
    /// [`MISSING_CHROMOSOME_PENALTY`] per unmatched chromosome.
    #[must_use]
    pub fn numeric_difference(&self, archetype: &Individual) -> u32 {
        let matched: u32 = self
            .chromosomes
            .iter()
            .zip(&archetype.chromosomes)
            .map(|(mine, theirs)| mine.numeric_difference(theirs))
            .sum();
        let unmatched = self.chromosomes.len().abs_diff(archetype.chromosomes.len()) as u32;
        matched + MISSING_CHROMOSOME_PENALTY * unmatched
    }

    /// Produce an offspring of `self` and `other`.
    ///
    /// The offspring's chromosome count is drawn uniformly between the parents'
    /// counts (inclusive). Each slot takes the chromosome at that position from
    /// one parent, chosen with probability proportional to the parents' weights
    /// among those that have a chromosome there.
    ///
    /// The child's `index` is left at 0; the caller assigns its slot.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::NoCandidateChromosome`] if neither parent has a
    /// chromosome at some slot.
    pub fn recombine<R: Rng>(
        &self,
        other: &Individual,
        my_weight: f64,
        other_weight: f64,
        rng: &mut R,
    ) -> Result<Individual> {
        let (shorter, longer) = {
            let (a, b) = (self.chromosomes.len(), other.chromosomes.len());
            (a.min(b), a.max(b))
        };
        let count = rng.random_range(shorter..=longer);

        let mut chromosomes = Vec::with_capacity(count);
        for slot in 0..count {
            let candidates: Vec<(&Chromosome, f64)> = [
                (self.chromosomes.get(slot), my_weight),
                (other.chromosomes.get(slot), other_weight),
            ]
            .into_iter()
            .filter_map(|(c, w)| c.map(|c| (c, w)))
            .collect();

            let weights: Vec<f64> = candidates.iter().map(|(_, w)| *w).collect();
            let pick = weighted_index(&weights, rng)
                .ok_or(LineageError::NoCandidateChromosome { slot })?;
            chromosomes.push(candidates[pick].0.replicate());
        }

        let mut child = Individual::new(chromosomes, self.generation + 1, 0);
        child.parents = Some([self.key(), other.key()]);
        Ok(child)
    }

    /// Mutate every chromosome, then apply elimination and duplication.
    ///
    /// Each chromosome is replaced by a mutated replica. The list is then
    /// rebuilt: chromosomes showing the elimination signal move to
    /// [`eliminated`](Self::eliminated); those showing the duplication signal
    /// have the gene reset and gain a copy (scale gene reset) placed just
    /// before them.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::AlreadyMutated`] on a second call.
    pub fn mutate<R: Rng>(
        &mut self,
        config: &LineageConfig,
        rng: &mut R,
    ) -> Result<StructuralChange> {
        if self.mutated {
            return Err(LineageError::AlreadyMutated {
                generation: self.generation,
                index: self.index,
            });
        }
        self.mutated = true;

        let mutated: Vec<Chromosome> = self
            .chromosomes
            .iter()
            .map(|c| c.mutated(config, rng))
            .collect();

        let mut change = StructuralChange::default();
        let mut next = Vec::with_capacity(mutated.len() * 2);
        for mut chromosome in mutated {
            if chromosome.has_elimination_gene(config.max_codon) {
                self.eliminated.push(chromosome);
                change.eliminated += 1;
                continue;
            }
            if chromosome.has_duplication_gene() {
                chromosome.reset_duplication_gene();
                let mut copy = chromosome.replicate();
                copy.reset_scale_gene();
                next.push(copy);
                change.duplicated += 1;
            }
            next.push(chromosome);
        }
        self.chromosomes = next;

        if change != StructuralChange::default() {
            log::debug!(
                "individual {}:{} eliminated {} duplicated {} -> {} chromosomes",
                self.generation,
                self.index,
                change.eliminated,
                change.duplicated,
                self.chromosomes.len()
            );
        }
        Ok(change)
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_archetype {
            write!(f, "(A) ")?;
        }
        for (i, chromosome) in self.chromosomes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{chromosome}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn config() -> LineageConfig {
        LineageConfig {
            gene_sizes: vec![3, 2, 1, 1, 1],
            ..LineageConfig::default()
        }
    }

    fn individual(chromosomes: &[&[Codon]], index: usize) -> Individual {
        Individual::new(
            chromosomes
                .iter()
                .map(|c| Chromosome::from_codons(c.to_vec()))
                .collect(),
            0,
            index,
        )
    }

    #[test]
    fn test_random_individual() {
        let config = config();
        let mut rng = test_rng();
        let ind = Individual::random(0, 3, &config, &mut rng);
        assert_eq!(ind.chromosomes.len(), config.initial_chromosome_count);
        assert_eq!(ind.key(), IndividualKey { generation: 0, index: 3 });
        assert!(ind.parents.is_none());
        assert!(!ind.is_extinct());
    }

    #[test]
    fn test_difference_vector_aligned() {
        let a = individual(&[&[1, 2, 3, 1, 1, 6], &[4, 4, 4, 1, 1, 6]], 0);
        let b = individual(&[&[1, 3, 3, 1, 1, 6], &[4, 4, 1, 1, 1, 6]], 1);
        let diff = a.difference_vector(&b, 6);
        assert_eq!(diff.exact_matches(), 10);
        assert_eq!(diff.near_matches(), 1);
        assert_eq!(diff.bucket(3), 1);
        assert_eq!(diff.total(), 12);
    }

    #[test]
    fn test_difference_vector_unequal_counts() {
        let long = individual(&[&[1, 2, 3, 1, 1, 6], &[4, 4, 4, 1, 1, 6]], 0);
        let short = individual(&[&[1, 2, 3, 1, 1, 6]], 1);

        // Unmatched positions contribute zeros in both directions.
        assert_eq!(long.difference_vector(&short, 6).total(), 6);
        assert_eq!(short.difference_vector(&long, 6).total(), 6);
    }

    #[test]
    fn test_numeric_difference_penalizes_missing() {
        let long = individual(&[&[1, 2, 3, 1, 1, 6], &[4, 4, 4, 1, 1, 6]], 0);
        let short = individual(&[&[1, 2, 4, 1, 1, 6]], 1);
        assert_eq!(short.numeric_difference(&long), 1 + MISSING_CHROMOSOME_PENALTY);
        assert_eq!(long.numeric_difference(&long), 0);
    }

    #[test]
    fn test_recombine_count_within_parent_bounds() {
        let config = config();
        let mut rng = test_rng();
        let mut a = Individual::random(0, 0, &config, &mut rng);
        let mut b = Individual::random(0, 1, &config, &mut rng);
        a.chromosomes.push(Chromosome::random(&config, &mut rng));
        a.chromosomes.push(Chromosome::random(&config, &mut rng));
        b.chromosomes.truncate(1);

        for _ in 0..200 {
            let child = a.recombine(&b, 0.3, 0.7, &mut rng).unwrap();
            assert!((1..=4).contains(&child.chromosomes.len()));
            assert_eq!(child.generation, 1);
            assert_eq!(child.parents, Some([a.key(), b.key()]));
        }
    }

    #[test]
    fn test_recombine_takes_chromosomes_from_parents() {
        let a = individual(&[&[1, 1, 1, 1, 1, 6], &[2, 2, 2, 1, 1, 6]], 0);
        let b = individual(&[&[3, 3, 3, 1, 1, 6]], 1);
        let mut rng = test_rng();

        for _ in 0..100 {
            let child = a.recombine(&b, 0.5, 0.5, &mut rng).unwrap();
            let first = child.chromosomes[0].codons();
            assert!(first == a.chromosomes[0].codons() || first == b.chromosomes[0].codons());
            if let Some(second) = child.chromosomes.get(1) {
                // Only one parent has a second chromosome.
                assert_eq!(second.codons(), a.chromosomes[1].codons());
            }
        }
    }

    #[test]
    fn test_recombine_zero_weight_parent_never_contributes() {
        let a = individual(&[&[1, 1, 1, 1, 1, 6]], 0);
        let b = individual(&[&[3, 3, 3, 1, 1, 6]], 1);
        let mut rng = test_rng();
        for _ in 0..100 {
            let child = a.recombine(&b, 1.0, 0.0, &mut rng).unwrap();
            assert_eq!(child.chromosomes[0].codons(), a.chromosomes[0].codons());
        }
    }

    #[test]
    fn test_recombine_extinct_parents() {
        let a = individual(&[], 0);
        let b = individual(&[], 1);
        let mut rng = test_rng();
        let child = a.recombine(&b, 0.5, 0.5, &mut rng).unwrap();
        assert!(child.is_extinct());
    }

    #[test]
    fn test_elimination_moves_chromosome() {
        // No point mutations, so only the structural pass acts.
        let config = LineageConfig {
            gene_sizes: vec![1, 1, 1],
            mutations_per_chromosome: 0,
            ..LineageConfig::default()
        };
        let mut rng = test_rng();
        let mut ind = individual(&[&[3, 1, 2], &[3, 1, 6]], 0);
        let change = ind.mutate(&config, &mut rng).unwrap();

        assert_eq!(change, StructuralChange { eliminated: 1, duplicated: 0 });
        assert_eq!(ind.chromosomes.len(), 1);
        assert_eq!(ind.eliminated.len(), 1);
        assert_eq!(ind.eliminated[0].codons(), &[3, 1, 2]);
    }

    #[test]
    fn test_duplication_inserts_reset_copy() {
        let config = LineageConfig {
            gene_sizes: vec![1, 1, 1, 1],
            mutations_per_chromosome: 0,
            ..LineageConfig::default()
        };
        let mut rng = test_rng();
        let mut ind = individual(&[&[5, 4, 3, 6]], 0);
        let change = ind.mutate(&config, &mut rng).unwrap();

        assert_eq!(change, StructuralChange { eliminated: 0, duplicated: 1 });
        assert_eq!(ind.chromosomes.len(), 2);
        assert_eq!(ind.chromosomes[0].codons(), &[5, 1, 1, 6]);
        assert_eq!(ind.chromosomes[1].codons(), &[5, 4, 1, 6]);
    }

    #[test]
    fn test_mutate_only_once() {
        let config = config();
        let mut rng = test_rng();
        let mut ind = Individual::random(0, 0, &config, &mut rng);
        assert!(ind.mutate(&config, &mut rng).is_ok());
        assert!(ind.is_mutated());

        let err = ind.mutate(&config, &mut rng).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_mutate_replaces_chromosomes_with_fresh_copies() {
        let config = config();
        let mut rng = test_rng();
        let mut ind = Individual::random(0, 0, &config, &mut rng);
        ind.mutate(&config, &mut rng).unwrap();

        for c in &ind.chromosomes {
            assert_eq!(c.len(), config.chromosome_length());
        }
        let total = ind.chromosomes.len() + ind.eliminated.len();
        assert!(total >= config.initial_chromosome_count);
    }

    #[test]
    fn test_display() {
        let mut ind = individual(&[&[1, 2, 1, 1, 6], &[3, 4, 1, 1, 6]], 0);
        assert_eq!(ind.to_string(), "12116, 34116");
        ind.is_archetype = true;
        assert_eq!(ind.to_string(), "(A) 12116, 34116");
    }
}
