//! Combine independent chains' mine-count distributions into per-cell
//! marginal probabilities, reweighted by the global mine budget. Ported
//! from the original solver's `combineChainMineCount` and
//! `Utils::computeNormalizedBinomials`, reformulated here as a convolution
//! over chain distributions rather than an index-offset table — the two
//! are mathematically equivalent, the convolution form just reads more
//! directly in Rust.

use crate::chain::ChainSolution;
use crate::combinatorics::normalized_binomials;
use crate::error::{SolverError, SolverResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The probability compositor's output: a marginal mine percentage per
/// cell touched by a chain, plus the shared residual for isolated cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marginals {
    /// cell index -> mine probability in percent (0..=100).
    pub cell_mine_perc: BTreeMap<usize, f64>,
    /// Shared mine probability in percent for every isolated cell.
    pub isolated_perc: f64,
    /// Expected number of mines landing inside chains (used by the
    /// endgame eligibility check downstream).
    pub expected_chain_mines: f64,
}

/// Convolve every chain's `(no_mines, freq_no_mines)` distribution into a
/// single joint "total mines across all chains" distribution.
pub(crate) fn convolve_all(chains: &[&ChainSolution]) -> BTreeMap<i32, f64> {
    let mut acc = BTreeMap::from([(0i32, 1.0f64)]);
    for chain in chains {
        let mut next = BTreeMap::new();
        for (&partial, &weight) in &acc {
            for (j, &count) in chain.no_mines.iter().enumerate() {
                let total = partial + count;
                *next.entry(total).or_insert(0.0) += weight * chain.freq_no_mines[j] as f64;
            }
        }
        acc = next;
    }
    acc
}

/// Combine `chain_solutions` with `isolated_count` free cells and a global
/// `mines` budget into per-cell marginal mine probabilities.
pub fn compose(
    chain_solutions: &[ChainSolution],
    mines: i32,
    isolated_count: usize,
) -> SolverResult<Marginals> {
    let chains: Vec<&ChainSolution> = chain_solutions.iter().collect();
    let joint = convolve_all(&chains);

    let low = joint.keys().next().copied().unwrap_or(0);
    let high = joint.keys().next_back().copied().unwrap_or(0);
    let u = isolated_count as i32;

    // Feasible absolute chain-mine totals: isolated cells must absorb the
    // rest, and there are only `u` of them.
    let feasible: Vec<i32> = (low.max(mines - u)..=high.min(mines))
        .filter(|t| joint.contains_key(t))
        .collect();
    if feasible.is_empty() {
        return Err(SolverError::Infeasible);
    }

    let weights: Vec<f64> = feasible.iter().map(|t| joint[t]).collect();
    let r: Vec<i64> = feasible.iter().map(|&t| (mines - t) as i64).collect();
    let probs = normalized_binomials(isolated_count, &r, &weights);

    let mut cell_mine_perc: BTreeMap<usize, f64> = BTreeMap::new();
    let mut expected_chain_mines = 0.0;

    for (&t, &p) in feasible.iter().zip(&probs) {
        expected_chain_mines += p * t as f64;
    }

    for chain in &chains {
        let others: Vec<&ChainSolution> = chains
            .iter()
            .filter(|c| !std::ptr::eq(**c, *chain))
            .copied()
            .collect();
        let other_joint = convolve_all(&others);

        for (cell_pos, &cell_idx) in chain.related_cells.iter().enumerate() {
            let mut perc = 0.0;
            for (&t, &p) in feasible.iter().zip(&probs) {
                if p <= 0.0 {
                    continue;
                }
                let full_weight = joint.get(&t).copied().unwrap_or(0.0);
                if full_weight <= 0.0 {
                    continue;
                }
                let mut slot_contrib = 0.0;
                for (j, &count) in chain.no_mines.iter().enumerate() {
                    let remainder = t - count;
                    let other_weight = other_joint.get(&remainder).copied().unwrap_or(0.0);
                    if other_weight <= 0.0 {
                        continue;
                    }
                    slot_contrib += other_weight * chain.freq_mines_pos[j][cell_pos] as f64;
                }
                perc += p * slot_contrib / full_weight;
            }
            cell_mine_perc.insert(cell_idx, perc * 100.0);
        }
    }

    let isolated_perc = if isolated_count == 0 {
        0.0
    } else {
        ((mines as f64 - expected_chain_mines) / isolated_count as f64 * 100.0).clamp(0.0, 100.0)
    };

    Ok(Marginals {
        cell_mine_perc,
        isolated_perc,
        expected_chain_mines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::solve_chain;
    use crate::group::Group;
    use std::collections::BTreeSet;

    fn group(cells: &[usize], min_v: i32, max_v: i32) -> Group {
        Group::new(
            0,
            cells.iter().copied().collect::<BTreeSet<_>>(),
            min_v,
            max_v,
        )
    }

    #[test]
    fn single_chain_two_cells_one_mine_are_fifty_fifty() {
        let g = group(&[0, 1], 1, 1);
        let sol = solve_chain(&[&g]);
        let marginals = compose(std::slice::from_ref(&sol), 1, 0).unwrap();
        assert!((marginals.cell_mine_perc[&0] - 50.0).abs() < 1e-6);
        assert!((marginals.cell_mine_perc[&1] - 50.0).abs() < 1e-6);
    }

    #[test]
    fn isolated_cells_share_remaining_budget() {
        // No chains at all: the whole mine budget spreads over isolated cells.
        let marginals = compose(&[], 2, 4).unwrap();
        assert!((marginals.isolated_perc - 50.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible_when_budget_cannot_fit() {
        let g = group(&[0, 1], 1, 1);
        let sol = solve_chain(&[&g]);
        // 5 mines demanded but only 2 cells total (chain + 0 isolated) can hold at most 1
        let result = compose(std::slice::from_ref(&sol), 5, 0);
        assert!(result.is_err());
    }

    #[test]
    fn marginals_sum_to_expected_chain_mines() {
        let g = group(&[0, 1, 2], 1, 2);
        let sol = solve_chain(&[&g]);
        let marginals = compose(std::slice::from_ref(&sol), 1, 3).unwrap();
        let sum: f64 = marginals.cell_mine_perc.values().sum::<f64>() / 100.0;
        assert!((sum - marginals.expected_chain_mines).abs() < 1e-6);
    }
}
