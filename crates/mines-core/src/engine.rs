//! Top-level orchestration: board in, marginal probabilities (and
//! optionally an endgame verdict) out. Ported from the original solver's
//! `Solver::generalSolve` and `EndgameSolver::solveEndgame`.

use crate::board::{Board, CELL_FLAG};
use crate::chain::{self, ChainSolution};
use crate::endgame::{EndgameResult, EndgameSolver, MAX_ENDGAME_CELLS};
use crate::error::{SolverError, SolverResult};
use crate::probability;
use crate::propagate::Propagator;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardReport {
    pub rows: usize,
    pub cols: usize,
    /// Row-major mine percentage per cell. Revealed numbers read `0.0`,
    /// flags read `100.0`, proven-safe cells read `0.0`.
    pub mine_perc: Vec<f64>,
    /// Whether the remaining state is small enough for `solve_endgame`.
    pub can_endgame: bool,
}

impl BoardReport {
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.mine_perc[row * self.cols + col]
    }
}

pub(crate) fn run_propagation(
    board: Board,
    mines: i32,
) -> SolverResult<(Propagator, i32, Vec<ChainSolution>, Vec<usize>)> {
    let mut propagator = Propagator::new(board)?;
    propagator.iterative_solve()?;

    let solved_mines = propagator
        .board
        .cells()
        .iter()
        .filter(|c| c.value == CELL_FLAG)
        .count() as i32;
    let remaining_mines = mines - solved_mines;
    if remaining_mines < 0 {
        return Err(SolverError::MalformedInput);
    }

    let active_groups = propagator.active_groups();
    let chain_indices = chain::partition_chains(&active_groups);
    let chain_solutions: Vec<ChainSolution> = chain_indices
        .iter()
        .map(|indices| {
            let groups: Vec<&_> = indices.iter().map(|&i| active_groups[i]).collect();
            chain::solve_chain(&groups)
        })
        .collect();

    let isolated = propagator.board.no_neighbor_cells();
    Ok((propagator, remaining_mines, chain_solutions, isolated))
}

/// Run constraint propagation and probability composition, returning the
/// per-cell marginal mine percentages and endgame eligibility.
pub fn solve_board(raw: &[Vec<i32>], mines: i32) -> SolverResult<BoardReport> {
    let board = Board::new(raw);
    let rows = board.rows;
    let cols = board.cols;
    let (mut propagator, remaining_mines, chain_solutions, isolated) = run_propagation(board, mines)?;

    if chain_solutions.is_empty() && isolated.is_empty() {
        info!("solve_board: nothing left to decide");
    } else {
        let marginals = probability::compose(&chain_solutions, remaining_mines, isolated.len())?;
        for (&cell_idx, &perc) in &marginals.cell_mine_perc {
            propagator.board.cell_at_mut(cell_idx).mine_perc = perc;
        }
        for &cell_idx in &isolated {
            propagator.board.cell_at_mut(cell_idx).mine_perc = marginals.isolated_perc;
        }
    }

    let total_endgame_cells: usize =
        chain_solutions.iter().map(|c| c.related_cells.len()).sum::<usize>() + isolated.len();
    let can_endgame = total_endgame_cells <= MAX_ENDGAME_CELLS
        && EndgameSolver::build(&propagator.board, &chain_solutions, &isolated, remaining_mines).is_ok();

    let mine_perc = propagator.board.cells().iter().map(|c| c.mine_perc).collect();
    Ok(BoardReport {
        rows,
        cols,
        mine_perc,
        can_endgame,
    })
}

/// Run propagation, then the endgame expectimax search. Fails with
/// `NothingToDo` if there's no uncertainty left, or `Overbudget` if the
/// remaining state exceeds `MAX_ENDGAME_CELLS`/`MAX_ENDGAME_CONFIGS`.
pub fn solve_endgame(raw: &[Vec<i32>], mines: i32) -> SolverResult<EndgameResult> {
    let board = Board::new(raw);
    let (propagator, remaining_mines, chain_solutions, isolated) = run_propagation(board, mines)?;

    if chain_solutions.is_empty() && isolated.is_empty() {
        return Err(SolverError::NothingToDo);
    }

    let mut solver = EndgameSolver::build(&propagator.board, &chain_solutions, &isolated, remaining_mines)?;
    Ok(solver.solve_endgame())
}


/// The six literal boundary scenarios, table-driven so each is one case
/// instead of a copy-pasted function.
#[cfg(test)]
mod boundary_scenarios {
    use super::*;
    use crate::board::CELL_UNDISCOVERED;
    use rstest::rstest;

    #[rstest]
    #[case::two_cell_coinflip(
        vec![vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED]],
        1,
        vec![((0, 0), 50.0), ((0, 2), 50.0)],
        0.5,
    )]
    #[case::one_isolated_residual(
        vec![vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED, CELL_UNDISCOVERED]],
        1,
        vec![((0, 0), 50.0), ((0, 2), 50.0), ((0, 3), 0.0)],
        1.0,
    )]
    #[case::center_revealed_eight_ways(
        vec![
            vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED, CELL_UNDISCOVERED],
            vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED],
            vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED, CELL_UNDISCOVERED],
        ],
        1,
        vec![
            ((0, 0), 12.5), ((0, 1), 12.5), ((0, 2), 12.5),
            ((1, 0), 12.5), ((1, 2), 12.5),
            ((2, 0), 12.5), ((2, 1), 12.5), ((2, 2), 12.5),
        ],
        0.875,
    )]
    #[case::all_cells_are_mines(
        vec![
            vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED],
            vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED],
        ],
        4,
        vec![((0, 0), 100.0), ((0, 1), 100.0), ((1, 0), 100.0), ((1, 1), 100.0)],
        1.0,
    )]
    #[case::two_cells_two_mines(
        vec![vec![CELL_UNDISCOVERED, CELL_UNDISCOVERED]],
        2,
        vec![((0, 0), 100.0), ((0, 1), 100.0)],
        1.0,
    )]
    #[case::forced_pair_with_isolated_residual(
        vec![vec![
            CELL_UNDISCOVERED,
            2,
            CELL_UNDISCOVERED,
            CELL_UNDISCOVERED,
            CELL_UNDISCOVERED,
        ]],
        2,
        vec![((0, 0), 100.0), ((0, 2), 100.0), ((0, 3), 0.0), ((0, 4), 0.0)],
        1.0,
    )]
    fn matches_expected_percentages_and_win_probability(
        #[case] raw: Vec<Vec<i32>>,
        #[case] mines: i32,
        #[case] expected: Vec<((usize, usize), f64)>,
        #[case] expected_win: f64,
    ) {
        let report = solve_board(&raw, mines).unwrap();
        for &((r, c), perc) in &expected {
            assert!(
                (report.at(r, c) - perc).abs() < 1e-6,
                "cell ({r},{c}): expected {perc}%, got {}",
                report.at(r, c)
            );
        }
        assert!(report.can_endgame);

        let endgame = solve_endgame(&raw, mines).unwrap();
        assert!(
            (endgame.win_prob - expected_win).abs() < 1e-9,
            "expected win_prob {expected_win}, got {}",
            endgame.win_prob
        );
    }
}
