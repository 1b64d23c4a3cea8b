//! Generation history and the advance-one-generation entry point.

use std::fmt;
use std::io::{Read, Write};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LineageConfig;
use crate::error::{LineageError, Result};
use crate::individual::Individual;
use crate::population::Population;

/// Append-only sequence of populations, generation 0 first.
///
/// The lineage carries the configuration it evolves under; it is read on every
/// [`advance`](Self::advance), so changes made with
/// [`set_config`](Self::set_config) apply from the next generation on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    config: LineageConfig,
    generations: Vec<Population>,
}

impl Lineage {
    /// An empty lineage.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: LineageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generations: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Replace the configuration used for subsequent generations.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::InvalidConfig`] and keeps the old configuration
    /// if `config` does not validate, or if it changes the chromosome length
    /// of a lineage that already has history.
    pub fn set_config(&mut self, config: LineageConfig) -> Result<()> {
        config.validate()?;
        let (old, new) = (self.config.chromosome_length(), config.chromosome_length());
        if !self.generations.is_empty() && old != new {
            return Err(LineageError::InvalidConfig(format!(
                "chromosome length cannot change from {} to {} mid-lineage",
                old, new
            )));
        }
        self.config = config;
        Ok(())
    }

    /// Discard any history and start over with a random generation 0 whose
    /// size is uniform in `[size_min, size_max]`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::InvalidSizeRange`] if `size_min > size_max`; the
    /// existing history is kept in that case.
    pub fn seed<R: Rng>(
        &mut self,
        size_min: usize,
        size_max: usize,
        rng: &mut R,
    ) -> Result<&Population> {
        let founders = Population::random_in_range(0, size_min, size_max, &self.config, rng)?;
        log::info!("seeded lineage with {} individuals", founders.len());
        self.generations = vec![founders];
        self.latest()
    }

    /// [`seed`](Self::seed) using the configured individual count bounds.
    ///
    /// # Errors
    ///
    /// See [`seed`](Self::seed).
    pub fn seed_from_config<R: Rng>(&mut self, rng: &mut R) -> Result<&Population> {
        let (min, max) = (
            self.config.individual_count_min,
            self.config.individual_count_max,
        );
        self.seed(min, max, rng)
    }

    /// Breed the next generation from the latest one, scored against the
    /// individual at `archetype_index`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::MissingArchetype`] when no archetype is given,
    /// [`LineageError::EmptyLineage`] before seeding, and any validation error
    /// from [`Population::advance_generation`]. On validation errors the
    /// lineage is left unchanged.
    pub fn advance<R: Rng>(
        &mut self,
        archetype_index: Option<usize>,
        rng: &mut R,
    ) -> Result<&Population> {
        let archetype_index = archetype_index.ok_or(LineageError::MissingArchetype)?;

        let config = &self.config;
        let latest = self
            .generations
            .last_mut()
            .ok_or(LineageError::EmptyLineage)?;
        let next = latest.advance_generation(
            archetype_index,
            config.individual_count_min,
            config.individual_count_max,
            config,
            rng,
        )?;

        self.generations.push(next);
        self.latest()
    }

    /// The most recent generation.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::EmptyLineage`] before seeding.
    pub fn latest(&self) -> Result<&Population> {
        self.generations.last().ok_or(LineageError::EmptyLineage)
    }

    #[must_use]
    pub fn population(&self, generation: usize) -> Option<&Population> {
        self.generations.get(generation)
    }

    #[must_use]
    pub fn generations(&self) -> &[Population] {
        &self.generations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Look up an individual by generation and slot.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::IndividualNotFound`] if either index is out of range.
    pub fn get_individual(&self, generation: usize, index: usize) -> Result<&Individual> {
        self.generations
            .get(generation)
            .and_then(|pop| pop.get(index))
            .ok_or(LineageError::IndividualNotFound { generation, index })
    }

    /// Resolve an individual's parent links. Seeded individuals have none.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::IndividualNotFound`] if a link points outside the history.
    pub fn parents_of(&self, individual: &Individual) -> Result<Option<[&Individual; 2]>> {
        match individual.parents {
            None => Ok(None),
            Some([a, b]) => Ok(Some([
                self.get_individual(a.generation, a.index)?,
                self.get_individual(b.generation, b.index)?,
            ])),
        }
    }

    /// Serialize the whole history, configuration included.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Serde`] on serialization failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty-printed variant of [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Serde`] on serialization failure.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a lineage saved with [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Serde`] on malformed input,
    /// [`LineageError::InvalidConfig`] if the embedded configuration is invalid
    /// and [`LineageError::InvalidHistory`] if the generations are inconsistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let lineage: Self = serde_json::from_str(json)?;
        lineage.check_loaded()?;
        Ok(lineage)
    }

    /// Write the JSON form to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Serde`] or [`LineageError::Io`].
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a lineage from JSON produced by [`write_json`](Self::write_json).
    ///
    /// # Errors
    ///
    /// See [`from_json`](Self::from_json); I/O failures surface as
    /// [`LineageError::Serde`].
    pub fn read_json<R: Read>(reader: R) -> Result<Self> {
        let lineage: Self = serde_json::from_reader(reader)?;
        lineage.check_loaded()?;
        Ok(lineage)
    }

    /// Validate a deserialized lineage before handing it out.
    ///
    /// Every chromosome must have the configured length and no zero codons.
    /// Codons above `max_codon` are accepted because the alphabet may have
    /// shrunk through [`set_config`](Self::set_config); mutation clamps them.
    /// Indices, generation tags, the archetype mark and parent links must all
    /// agree with positions in the history.
    fn check_loaded(&self) -> Result<()> {
        self.config.validate()?;
        let length = self.config.chromosome_length();

        for (generation, population) in self.generations.iter().enumerate() {
            let fail = |reason: String| LineageError::InvalidHistory { generation, reason };

            if population.generation() != generation {
                return Err(fail(format!(
                    "population is tagged generation {}",
                    population.generation()
                )));
            }
            if let Some(archetype) = population.archetype() {
                if archetype >= population.len() {
                    return Err(fail(format!(
                        "archetype {} is out of range for {} individuals",
                        archetype,
                        population.len()
                    )));
                }
            }
            let parent_count = generation
                .checked_sub(1)
                .map(|previous| self.generations[previous].len());

            for (position, individual) in population.iter().enumerate() {
                if individual.index != position || individual.generation != generation {
                    return Err(fail(format!(
                        "individual at position {} is tagged {}:{}",
                        position, individual.generation, individual.index
                    )));
                }
                if individual.is_archetype != (population.archetype() == Some(position)) {
                    return Err(fail(format!(
                        "archetype flag of individual {} disagrees with the population",
                        position
                    )));
                }
                match (individual.parents, parent_count) {
                    (None, _) => {}
                    (Some(keys), Some(count))
                        if keys
                            .iter()
                            .all(|k| k.generation + 1 == generation && k.index < count) => {}
                    (Some(_), _) => {
                        return Err(fail(format!(
                            "individual {} links to parents outside the previous generation",
                            position
                        )));
                    }
                }
                for chromosome in individual.chromosomes.iter().chain(&individual.eliminated) {
                    if chromosome.len() != length {
                        return Err(fail(format!(
                            "individual {} has a chromosome of length {}, expected {}",
                            position,
                            chromosome.len(),
                            length
                        )));
                    }
                    if chromosome.codons().contains(&0) {
                        return Err(fail(format!("individual {} has a zero codon", position)));
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generations: {}", self.generations.len())
    }
}
