//! Combination enumeration and log-space binomial normalization.
//!
//! Ported from the original solver's `Utils.cpp`/`getCombinations`: a cached
//! `n choose r` expansion built by a popcount scan, and the log-factorial /
//! log-sum-exp machinery used to combine per-chain distributions without
//! overflowing when weights span many orders of magnitude.

use std::collections::HashMap;

/// Every subset of `0..n` of size `r`, as little-endian bitmasks (bit `i` set
/// means position `i` is a "mine" in this combination). Cached per `(n, r)`.
#[derive(Default)]
pub struct CombinationCache {
    cache: HashMap<(u32, u32), Vec<u32>>,
}

impl CombinationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, n: u32, r: u32) -> &[u32] {
        self.cache.entry((n, r)).or_insert_with(|| {
            if r > n {
                return Vec::new();
            }
            let mut out = Vec::new();
            let limit = 1u32 << n;
            for mask in 0..limit {
                if mask.count_ones() == r {
                    out.push(mask);
                }
            }
            out
        })
    }
}

/// Visit every size-`r` combination of `0..n` in lexicographic order as a
/// list of ascending indices, calling `f` on each. Stops as soon as `f`
/// returns `false`. Unlike `CombinationCache`, this generates combinations
/// one at a time rather than scanning `0..2^n`, so it stays cheap even when
/// `n` is large and the caller only wants the first handful before bailing
/// (the endgame isolated-cell distribution can have `n` up to
/// `MAX_ENDGAME_CELLS`, where a `2^n` scan would never finish).
pub fn for_each_combination(n: usize, r: usize, mut f: impl FnMut(&[usize]) -> bool) {
    if r > n {
        return;
    }
    let mut indices: Vec<usize> = (0..r).collect();
    loop {
        if !f(&indices) {
            return;
        }
        // Find the rightmost index that still has room to advance.
        let mut i = r;
        let advance = loop {
            if i == 0 {
                break None;
            }
            i -= 1;
            if indices[i] + (r - i) < n {
                break Some(i);
            }
        };
        let Some(i) = advance else {
            return;
        };
        indices[i] += 1;
        for j in i + 1..r {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// `C(n, r)` clamped to avoid overflow for the small `n` this crate ever sees
/// (endgame cell counts are capped at `MAX_ENDGAME_CELLS`).
pub fn bounded_n_choose_r(n: i64, r: i64) -> u64 {
    if r < 0 || r > n || n < 0 {
        return 0;
    }
    let r = r.min(n - r);
    let mut result: u128 = 1;
    for i in 0..r {
        result = result * (n - i) as u128 / (i + 1) as u128;
        if result > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    result as u64
}

/// `log(k!)` for `k` in `0..=n`, via the recurrence `log(k!) = log((k-1)!) + log(k)`.
pub fn precompute_log_factorials(n: usize) -> Vec<f64> {
    let mut log_fact = vec![0.0; n + 1];
    for i in 1..=n {
        log_fact[i] = log_fact[i - 1] + (i as f64).ln();
    }
    log_fact
}

/// `log(weight * C(n, r))`, or `-inf` if `r` is out of range.
pub fn log_binomial_with_weight(n: usize, r: i64, log_fact: &[f64], weight: f64) -> f64 {
    if r < 0 || r as usize > n || weight <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let r = r as usize;
    weight.ln() + log_fact[n] - log_fact[r] - log_fact[n - r]
}

/// The log-sum-exp trick: numerically stable `log(sum(exp(x_i)))`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let Some(&max_val) = values
        .iter()
        .filter(|v| v.is_finite() || v.is_infinite())
        .max_by(|a, b| a.partial_cmp(b).unwrap())
    else {
        return f64::NEG_INFINITY;
    };
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Normalize a family of weighted binomials `weight_i * C(n, r_i)` into
/// probabilities that sum to 1, working entirely in log-space.
pub fn normalized_binomials(n: usize, r: &[i64], weights: &[f64]) -> Vec<f64> {
    let log_fact = precompute_log_factorials(n);
    let log_c: Vec<f64> = r
        .iter()
        .zip(weights)
        .map(|(&ri, &wi)| log_binomial_with_weight(n, ri, &log_fact, wi))
        .collect();
    let log_sum = log_sum_exp(&log_c);
    if log_sum == f64::NEG_INFINITY {
        return vec![0.0; r.len()];
    }
    log_c.iter().map(|&lc| (lc - log_sum).exp()).collect()
}
