//! A single generation: fitness shaping, parent selection and breeding.
//!
//! One call to [`Population::advance_generation`] performs the whole step:
//!
//! 1. mark the caller's archetype
//! 2. score every individual by similarity to it ([`Population::fitness`])
//! 3. draw a target size and that many parent couples by exponential race
//! 4. recombine each couple, then mutate every offspring
//! 5. drop offspring that lost all their chromosomes

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{FitnessMode, LineageConfig};
use crate::error::{LineageError, Result};
use crate::individual::Individual;
use crate::selection::{exponential_race_pair, uniform_count};

/// All individuals of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    generation: usize,
    individuals: Vec<Individual>,
    #[serde(default)]
    archetype: Option<usize>,
}

impl Population {
    /// Wrap `individuals` as generation `generation`, re-tagging each with the
    /// generation and its position.
    #[must_use]
    pub fn from_individuals(generation: usize, individuals: Vec<Individual>) -> Self {
        let mut population = Self {
            generation,
            individuals,
            archetype: None,
        };
        population.reindex();
        population
    }

    /// `count` random first-generation individuals.
    #[must_use]
    pub fn random<R: Rng>(
        generation: usize,
        count: usize,
        config: &LineageConfig,
        rng: &mut R,
    ) -> Self {
        let individuals = (0..count)
            .map(|index| Individual::random(generation, index, config, rng))
            .collect();
        Self::from_individuals(generation, individuals)
    }

    /// Random population whose size is uniform in `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::InvalidSizeRange`] if `min > max`.
    pub fn random_in_range<R: Rng>(
        generation: usize,
        min: usize,
        max: usize,
        config: &LineageConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let count = uniform_count(min, max, rng)?;
        Ok(Self::random(generation, count, config, rng))
    }

    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    #[must_use]
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Individual> {
        self.individuals.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Index of the archetype chosen for this generation, once one has been.
    #[must_use]
    pub fn archetype(&self) -> Option<usize> {
        self.archetype
    }

    /// Designate `index` as this generation's archetype.
    ///
    /// Marking the same index again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::ArchetypeOutOfRange`] for a missing individual and
    /// [`LineageError::ArchetypeAlreadyChosen`] if a different archetype is set.
    pub fn mark_archetype(&mut self, index: usize) -> Result<()> {
        self.check_archetype(index)?;
        self.archetype = Some(index);
        self.individuals[index].is_archetype = true;
        Ok(())
    }

    fn check_archetype(&self, index: usize) -> Result<()> {
        if index >= self.individuals.len() {
            return Err(LineageError::ArchetypeOutOfRange {
                index,
                len: self.individuals.len(),
            });
        }
        match self.archetype {
            Some(chosen) if chosen != index => Err(LineageError::ArchetypeAlreadyChosen {
                chosen,
                requested: index,
            }),
            _ => Ok(()),
        }
    }

    /// Selection probabilities for every individual, relative to the archetype.
    ///
    /// Raw fitness depends on [`LineageConfig::fitness_mode`]. The archetype's
    /// own score is capped at `archetype_fitness_cap` times the mean of the
    /// others, and the result is normalized to sum to 1. A population of one
    /// gets `[1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::EmptyPopulation`] for an empty population and
    /// [`LineageError::ArchetypeOutOfRange`] for a bad index.
    pub fn fitness(&self, archetype_index: usize, config: &LineageConfig) -> Result<Vec<f64>> {
        if self.individuals.is_empty() {
            return Err(LineageError::EmptyPopulation);
        }
        let archetype =
            self.individuals
                .get(archetype_index)
                .ok_or(LineageError::ArchetypeOutOfRange {
                    index: archetype_index,
                    len: self.individuals.len(),
                })?;

        if self.individuals.len() == 1 {
            return Ok(vec![1.0]);
        }

        let mut fitness = match config.fitness_mode {
            FitnessMode::Histogram => self.histogram_fitness(archetype, config),
            FitnessMode::Numeric => self.numeric_fitness(archetype),
        };
        log::debug!("initial fitness {:?}", fitness);

        cap_archetype(&mut fitness, archetype_index, config.archetype_fitness_cap);
        normalize(&mut fitness);
        Ok(fitness)
    }

    /// `exact + near / max_near`, where `max_near` is the largest near-match
    /// count in the population.
    fn histogram_fitness(&self, archetype: &Individual, config: &LineageConfig) -> Vec<f64> {
        let differences: Vec<_> = self
            .individuals
            .iter()
            .map(|ind| ind.difference_vector(archetype, config.max_codon))
            .collect();

        let max_near = differences
            .iter()
            .map(|d| d.near_matches())
            .max()
            .unwrap_or(0);

        differences
            .iter()
            .map(|d| {
                let near = if max_near > 0 {
                    f64::from(d.near_matches()) / f64::from(max_near)
                } else {
                    0.0
                };
                f64::from(d.exact_matches()) + near
            })
            .collect()
    }

    /// Inverse log of the numeric difference; identical genomes score 1.
    fn numeric_fitness(&self, archetype: &Individual) -> Vec<f64> {
        self.individuals
            .iter()
            .map(|ind| match ind.numeric_difference(archetype) {
                0 => 1.0,
                d => 1.0 / f64::from(d).ln().max(1.0),
            })
            .collect()
    }

    /// Draw `count` breeding couples, each by an independent exponential race
    /// over `fitness`.
    #[must_use]
    pub fn select_parent_couples<R: Rng>(
        &self,
        count: usize,
        fitness: &[f64],
        rng: &mut R,
    ) -> Vec<(usize, usize)> {
        (0..count)
            .filter_map(|_| exponential_race_pair(fitness, rng))
            .collect()
    }

    /// Recombine each couple, weighting chromosome inheritance by fitness.
    ///
    /// Offspring are indexed in couple order.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::IndividualNotFound`] for a couple index outside
    /// the population and propagates recombination failures.
    pub fn breed<R: Rng>(
        &self,
        couples: &[(usize, usize)],
        fitness: &[f64],
        rng: &mut R,
    ) -> Result<Vec<Individual>> {
        couples
            .iter()
            .enumerate()
            .map(|(slot, &(a, b))| -> Result<Individual> {
                let first = self.lookup(a)?;
                let second = self.lookup(b)?;
                let weight = |i: usize| fitness.get(i).copied().unwrap_or(0.0);
                let mut child = first.recombine(second, weight(a), weight(b), rng)?;
                child.index = slot;
                Ok(child)
            })
            .collect()
    }

    fn lookup(&self, index: usize) -> Result<&Individual> {
        self.individuals
            .get(index)
            .ok_or(LineageError::IndividualNotFound {
                generation: self.generation,
                index,
            })
    }

    /// Produce the next generation with `archetype_index` as fitness reference.
    ///
    /// The archetype and size range are validated before anything changes.
    /// The returned population can be smaller than the drawn target when
    /// offspring go extinct.
    ///
    /// # Errors
    ///
    /// Validation errors for the archetype or size range; invariant violations
    /// from fitness or recombination.
    pub fn advance_generation<R: Rng>(
        &mut self,
        archetype_index: usize,
        size_min: usize,
        size_max: usize,
        config: &LineageConfig,
        rng: &mut R,
    ) -> Result<Population> {
        self.check_archetype(archetype_index)?;
        // Validates the size range before the archetype mark is written.
        let target = uniform_count(size_min, size_max, rng)?;

        self.mark_archetype(archetype_index)?;
        let fitness = self.fitness(archetype_index, config)?;
        let couples = self.select_parent_couples(target, &fitness, rng);
        log::debug!("generation {} couples {:?}", self.generation, couples);

        let offspring = self.breed(&couples, &fitness, rng)?;
        let mut next = Population::from_individuals(self.generation + 1, offspring);
        let extinct = next.mutate_and_cull(config, rng)?;

        log::info!(
            "generation {} -> {}: target {}, {} survivors, {} extinct",
            self.generation,
            next.generation,
            target,
            next.len(),
            extinct
        );
        Ok(next)
    }

    /// Mutate every individual, drop the extinct ones and re-index.
    /// Returns how many were dropped.
    fn mutate_and_cull<R: Rng>(&mut self, config: &LineageConfig, rng: &mut R) -> Result<usize> {
        for individual in &mut self.individuals {
            individual.mutate(config, rng)?;
        }
        let before = self.individuals.len();
        self.individuals.retain(|ind| !ind.is_extinct());
        self.reindex();
        Ok(before - self.individuals.len())
    }

    fn reindex(&mut self) {
        for (index, individual) in self.individuals.iter_mut().enumerate() {
            individual.generation = self.generation;
            individual.index = index;
        }
    }
}

/// Cap the archetype at `cap` times the mean of everyone else.
fn cap_archetype(fitness: &mut [f64], archetype_index: usize, cap: f64) {
    let others = fitness.len().saturating_sub(1);
    if others == 0 {
        return;
    }
    let others_sum: f64 = fitness
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != archetype_index)
        .map(|(_, f)| *f)
        .sum();
    let limit = cap * others_sum / others as f64;
    if let Some(f) = fitness.get_mut(archetype_index) {
        *f = f.min(limit);
    }
}

/// Scale to a probability distribution; falls back to uniform when there is no mass.
fn normalize(fitness: &mut [f64]) {
    let total: f64 = fitness.iter().sum();
    if total.is_finite() && total > 0.0 {
        for f in fitness.iter_mut() {
            *f /= total;
        }
    } else {
        log::warn!("fitness total {} is degenerate, using uniform weights", total);
        let uniform = 1.0 / fitness.len() as f64;
        fitness.fill(uniform);
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, individual) in self.individuals.iter().enumerate() {
            if i > 0 {
                write!(f, " ::: ")?;
            }
            write!(f, "{individual}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::{Chromosome, Codon};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn config() -> LineageConfig {
        LineageConfig {
            gene_sizes: vec![4, 3, 1, 1, 1],
            ..LineageConfig::default()
        }
    }

    fn fixed(codons: &[&[Codon]]) -> Population {
        let individuals = codons
            .iter()
            .map(|c| Individual::new(vec![Chromosome::from_codons(c.to_vec())], 0, 0))
            .collect();
        Population::from_individuals(0, individuals)
    }

    fn assert_distribution(fitness: &[f64]) {
        let total: f64 = fitness.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "sum was {}", total);
        assert!(fitness.iter().all(|&f| f >= 0.0));
    }

    #[test]
    fn test_random_population_tags() {
        let config = config();
        let mut rng = test_rng();
        let pop = Population::random(3, 5, &config, &mut rng);
        assert_eq!(pop.len(), 5);
        for (i, ind) in pop.iter().enumerate() {
            assert_eq!(ind.generation, 3);
            assert_eq!(ind.index, i);
        }
    }

    #[test]
    fn test_random_in_range() {
        let config = config();
        let mut rng = test_rng();
        for _ in 0..20 {
            let pop = Population::random_in_range(0, 2, 4, &config, &mut rng).unwrap();
            assert!((2..=4).contains(&pop.len()));
        }
        assert!(matches!(
            Population::random_in_range(0, 4, 2, &config, &mut rng),
            Err(LineageError::InvalidSizeRange { .. })
        ));
    }

    #[test]
    fn test_histogram_fitness_formula() {
        let config = LineageConfig {
            archetype_fitness_cap: 100.0,
            ..config()
        };
        // Archetype, one near match, one far mismatch.
        let pop = fixed(&[&[1, 1, 1, 1, 1, 6], &[2, 1, 1, 1, 1, 6], &[5, 1, 1, 1, 1, 6]]);
        let fitness = pop.fitness(0, &config).unwrap();
        assert_distribution(&fitness);

        // Raw: archetype 6, near 5 + 1/1 = 6, far 5.
        let total = 17.0;
        assert!((fitness[0] - 6.0 / total).abs() < 1e-9);
        assert!((fitness[1] - 6.0 / total).abs() < 1e-9);
        assert!((fitness[2] - 5.0 / total).abs() < 1e-9);
    }

    #[test]
    fn test_archetype_cap() {
        let config = LineageConfig {
            archetype_fitness_cap: 1.0,
            ..config()
        };
        let pop = fixed(&[&[1, 1, 1, 1, 1, 6], &[6, 6, 6, 1, 1, 6], &[6, 6, 1, 1, 1, 6]]);
        let fitness = pop.fitness(0, &config).unwrap();
        assert_distribution(&fitness);

        // Raw: 6, 3, 4 -> archetype capped at mean(3, 4) = 3.5.
        let total = 3.5 + 3.0 + 4.0;
        assert!((fitness[0] - 3.5 / total).abs() < 1e-9);
        assert!(fitness[0] < fitness[2]);
    }

    #[test]
    fn test_numeric_fitness_mode() {
        let config = LineageConfig {
            fitness_mode: FitnessMode::Numeric,
            archetype_fitness_cap: 10.0,
            ..config()
        };
        let pop = fixed(&[&[1, 1, 1, 1, 1, 6], &[6, 6, 6, 6, 1, 6], &[2, 1, 1, 1, 1, 6]]);
        let fitness = pop.fitness(0, &config).unwrap();
        assert_distribution(&fitness);
        assert!(fitness[2] > fitness[1]);
        assert!((fitness[0] - fitness[2]).abs() < 1e-9);
    }

    #[test]
    fn test_fitness_singleton_and_empty() {
        let config = config();
        let pop = fixed(&[&[1, 1, 1, 1, 1, 6]]);
        assert_eq!(pop.fitness(0, &config).unwrap(), vec![1.0]);

        let empty = Population::from_individuals(0, Vec::new());
        assert!(matches!(
            empty.fitness(0, &config),
            Err(LineageError::EmptyPopulation)
        ));
        assert!(matches!(
            pop.fitness(1, &config),
            Err(LineageError::ArchetypeOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_normalize_degenerate_is_uniform() {
        let mut fitness = vec![0.0, 0.0, 0.0, 0.0];
        normalize(&mut fitness);
        assert_eq!(fitness, vec![0.25; 4]);
    }

    #[test]
    fn test_select_parent_couples() {
        let config = config();
        let mut rng = test_rng();
        let pop = Population::random(0, 6, &config, &mut rng);
        let fitness = pop.fitness(0, &config).unwrap();
        let couples = pop.select_parent_couples(25, &fitness, &mut rng);
        assert_eq!(couples.len(), 25);
        for (a, b) in couples {
            assert_ne!(a, b);
            assert!(a < 6 && b < 6);
        }
    }

    #[test]
    fn test_breed_assigns_slots() {
        let config = config();
        let mut rng = test_rng();
        let pop = Population::random(0, 4, &config, &mut rng);
        let fitness = vec![0.25; 4];
        let children = pop.breed(&[(0, 1), (2, 3), (1, 3)], &fitness, &mut rng).unwrap();
        assert_eq!(children.len(), 3);
        for (i, child) in children.iter().enumerate() {
            assert_eq!(child.index, i);
            assert_eq!(child.generation, 1);
        }
        assert_eq!(children[1].parents.unwrap()[0].index, 2);

        assert!(pop.breed(&[(0, 9)], &fitness, &mut rng).is_err());
    }

    #[test]
    fn test_mark_archetype_is_immutable() {
        let config = config();
        let mut rng = test_rng();
        let mut pop = Population::random(0, 3, &config, &mut rng);
        pop.mark_archetype(1).unwrap();
        pop.mark_archetype(1).unwrap();
        assert_eq!(pop.archetype(), Some(1));
        assert!(pop.get(1).unwrap().is_archetype);
        assert!(matches!(
            pop.mark_archetype(2),
            Err(LineageError::ArchetypeAlreadyChosen { chosen: 1, requested: 2 })
        ));
    }

    #[test]
    fn test_advance_generation() {
        let config = config();
        let mut rng = test_rng();
        let mut pop = Population::random(0, 5, &config, &mut rng);
        let next = pop.advance_generation(2, 4, 7, &config, &mut rng).unwrap();

        assert_eq!(pop.archetype(), Some(2));
        assert_eq!(next.generation(), 1);
        assert!(next.len() <= 7);
        for (i, ind) in next.iter().enumerate() {
            assert_eq!(ind.index, i);
            assert_eq!(ind.generation, 1);
            assert!(!ind.is_extinct());
            assert!(ind.is_mutated());
            let [p1, p2] = ind.parents.unwrap();
            assert!(p1.index < 5 && p2.index < 5);
            assert_eq!(p1.generation, 0);
        }
    }

    #[test]
    fn test_advance_validation_leaves_state() {
        let config = config();
        let mut rng = test_rng();
        let mut pop = Population::random(0, 3, &config, &mut rng);
        let snapshot = pop.clone();

        assert!(pop.advance_generation(3, 1, 2, &config, &mut rng).is_err());
        assert!(matches!(
            pop.advance_generation(0, 5, 2, &config, &mut rng),
            Err(LineageError::InvalidSizeRange { min: 5, max: 2 })
        ));
        assert_eq!(pop, snapshot);
        assert_eq!(pop.archetype(), None);
    }

    #[test]
    fn test_advance_singleton_selfs() {
        let config = config();
        let mut rng = test_rng();
        let mut pop = Population::random(0, 1, &config, &mut rng);
        let next = pop.advance_generation(0, 3, 3, &config, &mut rng).unwrap();
        for ind in next.iter() {
            let [p1, p2] = ind.parents.unwrap();
            assert_eq!(p1, p2);
        }
    }

    #[test]
    fn test_display() {
        let pop = fixed(&[&[1, 2, 1, 1, 6], &[3, 4, 1, 1, 6]]);
        assert_eq!(pop.to_string(), "12116 ::: 34116");
    }
}
