//! # Symbios Lineage
//!
//! An archetype-driven genetic algorithm over fixed-alphabet codon genomes,
//! with structural gain and loss of chromosomes.
//!
//! ## Features
//!
//! - **Archetype Fitness**: Each generation a caller-chosen individual becomes
//!   the reference; everyone else is scored by a histogram of codon differences
//!   to it (exact matches first, near matches second)
//! - **Exponential-Race Selection**: Weighted parent couples drawn in `O(n)` per
//!   couple with keys `-ln(u) / fitness`, no sorting
//! - **Structural Mutation**: Trailing elimination and duplication genes let
//!   chromosome counts shrink, grow, or reach zero (extinction)
//! - **Serializable History**: The whole [`Lineage`], configuration included,
//!   round-trips through Serde
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_lineage::{Lineage, LineageConfig};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut lineage = Lineage::new(LineageConfig::default()).unwrap();
//! lineage.seed(4, 6, &mut rng).unwrap();
//!
//! // The caller picks the archetype; here simply the first individual.
//! let next = lineage.advance(Some(0), &mut rng).unwrap();
//! println!("generation {} has {} individuals", next.generation(), next.len());
//!
//! let json = lineage.to_json().unwrap();
//! let restored = Lineage::from_json(&json).unwrap();
//! assert_eq!(restored.len(), 2);
//! ```
//!
//! ## Genome Layout
//!
//! Codons are integers in `[1, max_codon]`. A chromosome has
//! `sum(gene_sizes)` codons; the last three are structural:
//!
//! - **Scale** (third from last): mutates by at most one step
//! - **Duplication** (second from last): above 1, the chromosome is copied
//! - **Elimination** (last): below `max_codon`, the chromosome is dropped
//!
//! ## Generation Step
//!
//! [`Population::advance_generation`] marks the archetype, normalizes fitness
//! (capping the archetype at `archetype_fitness_cap` times the mean of the
//! others), draws a target size, selects couples, recombines them slot by slot
//! with fitness-weighted picks, mutates every offspring and drops the extinct.
//!
//! Parent links are [`IndividualKey`]s into the previous generation, never
//! references, so each [`Population`] is independently serializable.

pub mod chromosome;
pub mod config;
pub mod error;
pub mod individual;
pub mod lineage;
pub mod population;
pub mod selection;

// Re-exports for convenience
pub use chromosome::{Chromosome, Codon, DifferenceHistogram, MutationRecord};
pub use config::{FitnessMode, LineageConfig, DEFAULT_MAX_CODON};
pub use error::{LineageError, Result};
pub use individual::{Individual, IndividualKey, StructuralChange, MISSING_CHROMOSOME_PENALTY};
pub use lineage::Lineage;
pub use population::Population;
pub use selection::{exponential_race_pair, select_mutation_loci, uniform_count, weighted_index};
