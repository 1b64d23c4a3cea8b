//! Error taxonomy for lineage operations.
//!
//! Errors fall into two groups. Validation errors come from caller input
//! (a missing archetype, a bad size range, an empty lineage) and are always
//! raised before any state changes. Invariant violations indicate a broken
//! precondition inside the engine and are fatal to the operation.

/// Errors raised by the evolutionary engine.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("an archetype must be selected before advancing")]
    MissingArchetype,
    #[error("archetype index {index} is out of range for a population of {len}")]
    ArchetypeOutOfRange { index: usize, len: usize },
    #[error("population already has archetype {chosen}, cannot select {requested}")]
    ArchetypeAlreadyChosen { chosen: usize, requested: usize },
    #[error("invalid size range: min ({min}) > max ({max})")]
    InvalidSizeRange { min: usize, max: usize },
    #[error("lineage has no generations")]
    EmptyLineage,
    #[error("no individual at generation {generation}, index {index}")]
    IndividualNotFound { generation: usize, index: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("inconsistent history at generation {generation}: {reason}")]
    InvalidHistory { generation: usize, reason: String },

    #[error("fitness requested for an empty population")]
    EmptyPopulation,
    #[error("no candidate chromosome present at recombination slot {slot}")]
    NoCandidateChromosome { slot: usize },
    #[error("individual {index} of generation {generation} was already mutated")]
    AlreadyMutated { generation: usize, index: usize },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineageError {
    /// True for errors caused by caller input; no state was modified.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LineageError::MissingArchetype
                | LineageError::ArchetypeOutOfRange { .. }
                | LineageError::ArchetypeAlreadyChosen { .. }
                | LineageError::InvalidSizeRange { .. }
                | LineageError::EmptyLineage
                | LineageError::IndividualNotFound { .. }
                | LineageError::InvalidConfig(_)
                | LineageError::InvalidHistory { .. }
        )
    }

    /// True for broken internal preconditions.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            LineageError::EmptyPopulation
                | LineageError::NoCandidateChromosome { .. }
                | LineageError::AlreadyMutated { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LineageError>;
