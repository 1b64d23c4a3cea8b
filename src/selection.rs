//! One-pass randomized selection primitives.
//!
//! These are free functions over plain counts and weight slices so they can be
//! tested without building chromosomes or populations:
//!
//! - [`select_mutation_loci`]: uniform random `k`-subset of `0..len` in a single
//!   ordered pass, without materializing an index pool
//! - [`weighted_index`]: roulette pick over non-negative weights
//! - [`exponential_race_pair`]: weighted top-2 draw without replacement using
//!   exponential keys `-ln(u) / w`
//! - [`uniform_count`]: inclusive integer draw with range validation

use rand::Rng;

use crate::error::{LineageError, Result};

/// Select `min(count, len)` distinct positions from `0..len`, in ascending order.
///
/// Walks the positions once. At position `i`, with `r` positions still needed,
/// the position is taken with probability `r / (len - i)`. Every `k`-subset is
/// equally likely and the walk stops as soon as `r` reaches zero.
#[must_use]
pub fn select_mutation_loci<R: Rng>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    let mut needed = count.min(len);
    let mut loci = Vec::with_capacity(needed);

    for i in 0..len {
        if needed == 0 {
            break;
        }
        let probability = needed as f64 / (len - i) as f64;
        if rng.random::<f64>() < probability {
            loci.push(i);
            needed -= 1;
        }
    }

    loci
}

/// Pick an index with probability proportional to its weight.
///
/// Weights are renormalized to sum to 1 and a single uniform draw selects the
/// index whose cumulative interval contains it. If the weights carry no usable
/// mass (all zero, negative or non-finite) the pick is uniform.
///
/// Returns `None` only for an empty slice.
#[must_use]
pub fn weighted_index<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if !(total.is_finite() && total > 0.0) {
        return Some(rng.random_range(0..weights.len()));
    }

    let draw = rng.random::<f64>();
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if !(w.is_finite() && w > 0.0) {
            continue;
        }
        last_positive = i;
        cumulative += w / total;
        if cumulative > draw {
            return Some(i);
        }
    }

    // Rounding can leave the cumulative sum a hair below the draw.
    Some(last_positive)
}

/// Draw two distinct indices, each weighted by its entry in `weights`.
///
/// Every index gets the key `-ln(u) / weight` with `u` uniform in `(0, 1]`; the
/// two smallest keys win. Larger weights yield stochastically smaller keys.
/// Zero weights produce infinite keys and are only chosen when nothing else is
/// left. Runs in `O(len)` with no sorting.
///
/// A single-element slice yields `(0, 0)`. An empty slice yields `None`.
#[must_use]
pub fn exponential_race_pair<R: Rng>(weights: &[f64], rng: &mut R) -> Option<(usize, usize)> {
    match weights.len() {
        0 => return None,
        1 => return Some((0, 0)),
        _ => {}
    }

    let mut first: Option<(usize, f64)> = None;
    let mut second: Option<(usize, f64)> = None;

    for (i, &w) in weights.iter().enumerate() {
        let u = 1.0 - rng.random::<f64>();
        let key = if w > 0.0 { -u.ln() / w } else { f64::INFINITY };

        match first {
            Some((_, best)) if key >= best => match second {
                Some((_, runner_up)) if key >= runner_up => {}
                _ => second = Some((i, key)),
            },
            _ => {
                second = first;
                first = Some((i, key));
            }
        }
    }

    match (first, second) {
        (Some((a, _)), Some((b, _))) => Some((a, b)),
        _ => None,
    }
}

/// Uniform integer in `[min, max]`, inclusive on both ends.
///
/// # Errors
///
/// Returns [`LineageError::InvalidSizeRange`] if `min > max`.
pub fn uniform_count<R: Rng>(min: usize, max: usize, rng: &mut R) -> Result<usize> {
    if min > max {
        return Err(LineageError::InvalidSizeRange { min, max });
    }
    Ok(rng.random_range(min..=max))
}
