//! Root exploration noise and visit-count sampling.

use rand::Rng;

/// Exploration noise over `n` moves, summing to 1.
///
/// Each component is `u^(1/alpha)` with `u ~ U(0, 1)`, renormalised. This
/// approximates a symmetric Dirichlet draw without a Gamma sampler: a small
/// `alpha` concentrates the mass on a few moves. Returns an empty vector for
/// `n == 0` or a non-positive `alpha`.
pub fn sample_noise<R: Rng + ?Sized>(rng: &mut R, n: usize, alpha: f32) -> Vec<f32> {
    if n == 0 || !(alpha.is_finite() && alpha > 0.0) {
        return Vec::new();
    }

    let inv_alpha = 1.0 / alpha as f64;
    let mut noise: Vec<f64> = (0..n).map(|_| rng.gen::<f64>().powf(inv_alpha)).collect();
    let sum: f64 = noise.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        // Every draw underflowed: fall back to flat noise.
        return vec![1.0 / n as f32; n];
    }
    for v in &mut noise {
        *v /= sum;
    }
    noise.into_iter().map(|v| v as f32).collect()
}

/// `(1 - epsilon) * base + epsilon * noise`, element-wise.
///
/// Returns `base` unchanged when the lengths differ or epsilon is outside
/// `(0, 1]`.
pub fn blend_root_noise(base: &[f32], noise: &[f32], epsilon: f32) -> Vec<f32> {
    if base.len() != noise.len() || !(epsilon.is_finite() && epsilon > 0.0 && epsilon <= 1.0) {
        return base.to_vec();
    }
    base.iter()
        .zip(noise)
        .map(|(&p, &n)| (1.0 - epsilon) * p + epsilon * n)
        .collect()
}

/// Pick an index by visit counts.
///
/// `temperature == 0` returns the most visited index (lowest index on ties).
/// Otherwise index `i` is drawn with weight `visits[i]^(1/temperature)`, so
/// unvisited entries are never drawn. Falls back to greedy when the weights
/// are unusable. `None` only for an empty slice.
pub fn sample_by_visits<R: Rng + ?Sized>(
    visits: &[u32],
    temperature: f32,
    rng: &mut R,
) -> Option<usize> {
    if visits.is_empty() {
        return None;
    }
    if temperature > 0.0 && temperature.is_finite() {
        let inv_t = 1.0 / temperature as f64;
        let weights: Vec<f64> = visits.iter().map(|&n| (n as f64).powf(inv_t)).collect();
        let total: f64 = weights.iter().sum();
        if total.is_finite() && total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            for (i, w) in weights.iter().enumerate() {
                cumulative += w;
                if *w > 0.0 && target < cumulative {
                    return Some(i);
                }
            }
            // Rounding left the target past the last bucket.
            return weights.iter().rposition(|&w| w > 0.0);
        }
    }
    greedy(visits)
}

fn greedy(visits: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &n) in visits.iter().enumerate() {
        match best {
            Some((_, best_n)) if n <= best_n => {}
            _ => best = Some((i, n)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
#[path = "noise_tests.rs"]
mod noise_tests;
