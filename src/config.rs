//! Configuration consumed by the engine at generation-advance time.

use serde::{Deserialize, Serialize};

use crate::chromosome::{Codon, STRUCTURAL_GENE_COUNT};
use crate::error::{LineageError, Result};

/// Default upper bound of the codon alphabet.
pub const DEFAULT_MAX_CODON: Codon = 6;

/// How raw differences to the archetype are turned into fitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitnessMode {
    /// `exact matches + near matches / population max near matches`.
    #[default]
    Histogram,
    /// Inverse log of the summed absolute codon difference.
    Numeric,
}

/// Configuration for lineage seeding, breeding and mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// Smallest population drawn for a new generation.
    pub individual_count_min: usize,
    /// Largest population drawn for a new generation (inclusive).
    pub individual_count_max: usize,
    /// Partition of a chromosome into named genes; the sum is the chromosome length.
    /// The last three codons are the scale, duplication and elimination genes.
    pub gene_sizes: Vec<usize>,
    /// Number of loci redrawn on each chromosome per mutation.
    pub mutations_per_chromosome: usize,
    /// Chromosomes given to each first-generation individual.
    pub initial_chromosome_count: usize,
    /// Archetype fitness is capped at this multiple of the mean fitness of the others.
    pub archetype_fitness_cap: f64,
    /// Largest codon value; codons live in `[1, max_codon]`.
    pub max_codon: Codon,
    /// Fitness formula.
    pub fitness_mode: FitnessMode,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            individual_count_min: 6,
            individual_count_max: 10,
            gene_sizes: vec![8, 8, 8, 8, 5, 1, 1, 1],
            mutations_per_chromosome: 2,
            initial_chromosome_count: 2,
            archetype_fitness_cap: 1.5,
            max_codon: DEFAULT_MAX_CODON,
            fitness_mode: FitnessMode::Histogram,
        }
    }
}

impl LineageConfig {
    /// Total number of codons per chromosome.
    #[must_use]
    pub fn chromosome_length(&self) -> usize {
        self.gene_sizes.iter().sum()
    }

    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Serde`] on malformed JSON and
    /// [`LineageError::InvalidConfig`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.gene_sizes.is_empty() {
            return Err(LineageError::InvalidConfig(
                "gene_sizes must not be empty".into(),
            ));
        }
        if let Some(pos) = self.gene_sizes.iter().position(|&s| s == 0) {
            return Err(LineageError::InvalidConfig(format!(
                "gene_sizes[{pos}] must be positive"
            )));
        }
        if self.chromosome_length() < STRUCTURAL_GENE_COUNT {
            return Err(LineageError::InvalidConfig(format!(
                "chromosome length {} cannot hold the {} structural genes",
                self.chromosome_length(),
                STRUCTURAL_GENE_COUNT
            )));
        }
        if self.max_codon < 2 {
            return Err(LineageError::InvalidConfig(format!(
                "max_codon must be at least 2, got {}",
                self.max_codon
            )));
        }
        if self.individual_count_min > self.individual_count_max {
            return Err(LineageError::InvalidConfig(format!(
                "individual_count_min ({}) > individual_count_max ({})",
                self.individual_count_min, self.individual_count_max
            )));
        }
        if self.initial_chromosome_count == 0 {
            return Err(LineageError::InvalidConfig(
                "initial_chromosome_count must be at least 1".into(),
            ));
        }
        if !self.archetype_fitness_cap.is_finite() || self.archetype_fitness_cap <= 0.0 {
            return Err(LineageError::InvalidConfig(format!(
                "archetype_fitness_cap must be positive, got {}",
                self.archetype_fitness_cap
            )));
        }
        Ok(())
    }
}
