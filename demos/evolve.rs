//! Evolve a lineage toward long genomes with symbios-lineage.
//!
//! In the interactive setting a person picks each generation's archetype. This
//! example stands in for them by always choosing the individual with the most
//! chromosomes, which steers the population toward duplication.
//!
//! Run with: `RUST_LOG=info cargo run --example evolve`

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use symbios_lineage::{Lineage, LineageConfig, Population};

/// Index of the individual with the most chromosomes.
fn pick_archetype(population: &Population) -> Option<usize> {
    population
        .iter()
        .max_by_key(|ind| ind.chromosomes.len())
        .map(|ind| ind.index)
}

fn main() {
    env_logger::init();

    println!("Lineage Evolution Example");
    println!("=========================\n");

    let config = LineageConfig {
        individual_count_min: 8,
        individual_count_max: 12,
        mutations_per_chromosome: 3,
        ..LineageConfig::default()
    };
    let generations = 30;
    let seed = 42;

    println!(
        "Population: {}..={}",
        config.individual_count_min, config.individual_count_max
    );
    println!("Chromosome length: {}", config.chromosome_length());
    println!("Generations: {}", generations);
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut lineage = match Lineage::new(config) {
        Ok(lineage) => lineage,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return;
        }
    };
    if let Err(err) = lineage.seed_from_config(&mut rng) {
        eprintln!("seeding failed: {err}");
        return;
    }

    for gen in 0..generations {
        let archetype = match lineage.latest() {
            Ok(latest) => pick_archetype(latest),
            Err(_) => None,
        };
        if archetype.is_none() {
            println!("Gen {:3}: population extinct", gen);
            break;
        }

        let next = match lineage.advance(archetype, &mut rng) {
            Ok(next) => next,
            Err(err) => {
                eprintln!("advance failed: {err}");
                break;
            }
        };

        if gen % 5 == 0 || gen == generations - 1 {
            let counts: Vec<usize> = next.iter().map(|ind| ind.chromosomes.len()).collect();
            let avg = counts.iter().sum::<usize>() as f64 / counts.len().max(1) as f64;
            let max = counts.iter().copied().max().unwrap_or(0);
            println!(
                "Gen {:3}: individuals={}, avg chromosomes={:.2}, max chromosomes={}",
                next.generation(),
                next.len(),
                avg,
                max
            );
        }
    }

    println!();
    println!("Evolution Complete!");
    println!("==================");
    println!("{}", lineage);

    if let Ok(latest) = lineage.latest() {
        if let Some(champion) = pick_archetype(latest).and_then(|i| latest.get(i)) {
            println!("Longest genome: {}", champion);
            if let Ok(Some([p1, p2])) = lineage.parents_of(champion) {
                println!("Parents: {} + {}", p1.index + 1, p2.index + 1);
            }
        }
    }

    match lineage.to_json() {
        Ok(json) => println!("Serialized history: {} bytes", json.len()),
        Err(err) => eprintln!("serialization failed: {err}"),
    }
}
