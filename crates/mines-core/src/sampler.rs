//! Concrete mine-layout sampling and counterfactual re-solves. Ported from
//! the original solver's `sampleConfiguration`/`tryWarp`: these sit
//! downstream of the marginal compositor and reuse its chain enumerations,
//! but draw one specific board instead of a probability per cell.

use crate::board::{Board, CELL_FLAG, CELL_SAFE};
use crate::chain::ChainSolution;
use crate::combinatorics::normalized_binomials;
use crate::engine::{self, BoardReport};
use crate::error::{SolverError, SolverResult};
use crate::probability::convolve_all;
use crate::rng::SplitMix64;

/// Pick an index with probability proportional to `weights`. Falls back to
/// index 0 if every weight is non-positive (callers only reach this once
/// they've already confirmed the distribution is non-degenerate).
fn weighted_choice(rng: &mut SplitMix64, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let mut target = rng.next_f64() * total;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        if target < w {
            return i;
        }
        target -= w;
    }
    weights.len() - 1
}

/// Draw one concrete `rows x cols` mine layout (`true` = mine) consistent
/// with the board's revealed numbers, the solved groups' chain
/// enumerations, and the global `mines` budget. Mirrors
/// `Solver::sampleConfiguration`.
pub fn sample_configuration(
    board: &Board,
    chain_solutions: &[ChainSolution],
    isolated: &[usize],
    mines: i32,
    rng: &mut SplitMix64,
) -> SolverResult<Vec<Vec<bool>>> {
    let mut layout = vec![vec![false; board.cols]; board.rows];

    // `mines` is already the remaining budget after subtracting every cell
    // the constraint propagator has already flagged (see
    // `engine::run_propagation`); just mirror those flags into the layout.
    for cell in board.cells() {
        if !cell.is_revealed_number() && cell.mine_perc >= 100.0 {
            layout[cell.row][cell.col] = true;
        }
    }

    let chains: Vec<&ChainSolution> = chain_solutions.iter().collect();
    let joint = convolve_all(&chains);
    let low = joint.keys().next().copied().unwrap_or(0);
    let high = joint.keys().next_back().copied().unwrap_or(0);
    let u = isolated.len() as i32;

    let feasible: Vec<i32> = (low.max(mines - u)..=high.min(mines))
        .filter(|t| joint.contains_key(t))
        .collect();
    if feasible.is_empty() {
        return Err(SolverError::Infeasible);
    }

    let weights: Vec<f64> = feasible.iter().map(|t| joint[t]).collect();
    let r: Vec<i64> = feasible.iter().map(|&t| (mines - t) as i64).collect();
    let probs = normalized_binomials(isolated.len(), &r, &weights);

    let chosen_total = feasible[weighted_choice(rng, &probs)];
    let remaining_for_isolated = mines - chosen_total;

    // Backward DP: dp[i][s] = weighted count of ways chains i..C sum to s.
    let c = chain_solutions.len();
    let max_budget = (chosen_total + 1).max(1) as usize;
    let mut dp = vec![vec![0.0f64; max_budget]; c + 1];
    dp[c][0] = 1.0;
    for i in (0..c).rev() {
        let cs = &chain_solutions[i];
        for s in 0..max_budget {
            for (j, &m) in cs.no_mines.iter().enumerate() {
                let rem = s as i64 - m as i64;
                if rem >= 0 && (rem as usize) < max_budget {
                    dp[i][s] += cs.freq_no_mines[j] as f64 * dp[i + 1][rem as usize];
                }
            }
        }
    }

    // Sample each chain's total mine count sequentially.
    let mut chosen_mines = vec![0i32; c];
    let mut remaining = chosen_total;
    for (i, cs) in chain_solutions.iter().enumerate() {
        let mut candidates = Vec::new();
        let mut weights = Vec::new();
        for (j, &m) in cs.no_mines.iter().enumerate() {
            let rem = remaining as i64 - m as i64;
            if rem >= 0 && (rem as usize) < max_budget {
                let w = cs.freq_no_mines[j] as f64 * dp[i + 1][rem as usize];
                if w > 0.0 {
                    candidates.push(j);
                    weights.push(w);
                }
            }
        }
        let pick = candidates[weighted_choice(rng, &weights)];
        chosen_mines[i] = cs.no_mines[pick];
        remaining -= chosen_mines[i];
    }

    // Sample a matching configuration per chain, uniformly at random.
    for (i, cs) in chain_solutions.iter().enumerate() {
        let target = chosen_mines[i];
        let matching: Vec<usize> = cs
            .all_configs
            .iter()
            .enumerate()
            .filter(|(_, cfg)| cfg.iter().map(|&b| b as i32).sum::<i32>() == target)
            .map(|(idx, _)| idx)
            .collect();
        let picked = matching[rng.next_usize(matching.len())];
        let config = &cs.all_configs[picked];
        for (pos, &cell_idx) in cs.related_cells.iter().enumerate() {
            let (r, cl) = board.coords(cell_idx);
            layout[r][cl] = config[pos] == 1;
        }
    }

    // Shuffle the isolated mines across the isolated cells (Fisher-Yates).
    if !isolated.is_empty() {
        let n = isolated.len();
        let mut is_mine = vec![false; n];
        for slot in is_mine.iter_mut().take(remaining_for_isolated.max(0) as usize) {
            *slot = true;
        }
        for i in (1..n).rev() {
            let j = rng.next_usize(i + 1);
            is_mine.swap(i, j);
        }
        for (&cell_idx, &mine) in isolated.iter().zip(&is_mine) {
            let (r, cl) = board.coords(cell_idx);
            layout[r][cl] = mine;
        }
    }

    Ok(layout)
}

/// Result of a counterfactual re-solve: the prior probability of the forced
/// outcome, plus a sampled configuration consistent with it when the
/// hypothesis is neither impossible nor already certain.
pub struct WarpResult {
    pub warp_point: f64,
    pub configuration: Option<Vec<Vec<bool>>>,
}

/// Force cell `(row, col)` to be a mine (`is_mine = true`) or safe, re-solve
/// the board under that hypothesis, and report the hypothesis's prior
/// probability plus a sampled layout consistent with it. Mirrors
/// `Solver::tryWarp`.
pub fn try_warp(
    raw: &[Vec<i32>],
    mines: i32,
    row: usize,
    col: usize,
    is_mine: bool,
    rng: &mut SplitMix64,
) -> SolverResult<WarpResult> {
    let report: BoardReport = engine::solve_board(raw, mines)?;
    let warp_point = if is_mine {
        report.at(row, col)
    } else {
        100.0 - report.at(row, col)
    };

    if warp_point <= 0.0 || warp_point >= 100.0 {
        return Ok(WarpResult {
            warp_point,
            configuration: None,
        });
    }

    let mut warped_raw: Vec<Vec<i32>> = raw.to_vec();
    warped_raw[row][col] = if is_mine { CELL_FLAG } else { CELL_SAFE };
    // `mines` counts every flag on the board, including `warped_raw`'s new
    // one; `run_propagation` is the one place that subtracts flagged cells
    // from the budget, so it must see the undecremented total here.
    let warped_board = Board::new(&warped_raw);
    let configuration = match engine::run_propagation(warped_board, mines) {
        Ok((propagator, remaining_mines, chain_solutions, isolated)) => {
            match sample_configuration(&propagator.board, &chain_solutions, &isolated, remaining_mines, rng) {
                Ok(mut layout) => {
                    layout[row][col] = is_mine;
                    Some(layout)
                }
                Err(_) => None,
            }
        }
        Err(_) => None,
    };

    Ok(WarpResult {
        warp_point,
        configuration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CELL_UNDISCOVERED;

    #[test]
    fn sample_configuration_respects_chain_budget() {
        let raw = vec![vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED]];
        let report = engine::solve_board(&raw, 1).unwrap();
        assert!(report.can_endgame);

        let board = Board::new(&raw);
        let (propagator, remaining_mines, chain_solutions, isolated) =
            engine::run_propagation(board, 1).unwrap();
        let mut rng = SplitMix64::new(7);
        let layout =
            sample_configuration(&propagator.board, &chain_solutions, &isolated, remaining_mines, &mut rng)
                .unwrap();

        let total_mines: usize = layout.iter().flatten().filter(|&&m| m).count();
        assert_eq!(total_mines, 1);
        // Exactly one of the two undiscovered cells is the mine.
        assert_ne!(layout[0][0], layout[0][2]);
        assert!(!layout[0][1]);
    }

    #[test]
    fn sample_configuration_places_exactly_requested_mines_with_isolated_cells() {
        let raw = vec![vec![
            CELL_UNDISCOVERED,
            2,
            CELL_UNDISCOVERED,
            CELL_UNDISCOVERED,
            CELL_UNDISCOVERED,
        ]];
        let board = Board::new(&raw);
        let (propagator, remaining_mines, chain_solutions, isolated) =
            engine::run_propagation(board, 2).unwrap();
        let mut rng = SplitMix64::new(11);
        let layout =
            sample_configuration(&propagator.board, &chain_solutions, &isolated, remaining_mines, &mut rng)
                .unwrap();
        let total_mines: usize = layout.iter().flatten().filter(|&&m| m).count();
        assert_eq!(total_mines, 2);
        // The "2" forces both its neighbors to be mines; the two isolated
        // cells have zero left to distribute.
        assert!(layout[0][0]);
        assert!(layout[0][2]);
        assert!(!layout[0][3]);
        assert!(!layout[0][4]);
        let _ = isolated;
    }

    #[test]
    fn try_warp_on_a_fifty_fifty_cell_returns_half_and_a_configuration() {
        let raw = vec![vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED]];
        let mut rng = SplitMix64::new(3);
        let result = try_warp(&raw, 1, 0, 0, true, &mut rng).unwrap();
        assert!((result.warp_point - 50.0).abs() < 1e-6);
        let config = result.configuration.unwrap();
        assert!(config[0][0]);
        assert!(!config[0][2]);
    }

    #[test]
    fn try_warp_on_a_certain_cell_skips_sampling() {
        let raw = vec![vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED], vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED]];
        let mut rng = SplitMix64::new(5);
        // All four cells are mines (4 mines, 4 cells): forcing any cell
        // safe contradicts certainty, forcing it a mine is already certain.
        let result = try_warp(&raw, 4, 0, 0, true, &mut rng).unwrap();
        assert_eq!(result.warp_point, 100.0);
        assert!(result.configuration.is_none());
    }
}
