//! Memoized expectimax search over future reveal-observation equivalence
//! classes. Ported from the original solver's `EndgameSolver.h/.cpp`.

use crate::board::{Board, CELL_FLAG, CELL_SAFE};
use crate::chain::ChainSolution;
use crate::combinatorics::for_each_combination;
use crate::error::{SolverError, SolverResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

pub const MAX_ENDGAME_CELLS: usize = 64;
pub const MAX_ENDGAME_CONFIGS: usize = 100;

/// A fixed-width, word-wise bitset over configuration indices. `u64` alone
/// isn't wide enough once `MAX_ENDGAME_CONFIGS` exceeds 64.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigMask {
    words: Vec<u64>,
    len: usize,
}

impl ConfigMask {
    pub fn empty(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn full(len: usize) -> Self {
        let mut mask = Self::empty(len);
        for i in 0..len {
            mask.set(i);
        }
        mask
    }

    pub fn set(&mut self, i: usize) {
        self.words[i / 64] |= 1 << (i % 64);
    }

    pub fn get(&self, i: usize) -> bool {
        (self.words[i / 64] >> (i % 64)) & 1 == 1
    }

    pub fn popcount(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EndgameResult {
    pub win_prob: f64,
    pub best_row: Option<usize>,
    pub best_col: Option<usize>,
}

/// Build the full set of board configurations consistent with the chain
/// enumerations plus a free distribution of the remaining mines among
/// isolated cells. Ported from `combineAllGroupsConfigs`; fails with
/// `Overbudget` the moment more than `MAX_ENDGAME_CONFIGS` configurations
/// are produced.
fn combine_all_configs(
    chain_solutions: &[ChainSolution],
    isolated_len: usize,
    mines: i32,
) -> SolverResult<Vec<Vec<bool>>> {
    let total_len: usize =
        chain_solutions.iter().map(|c| c.related_cells.len()).sum::<usize>() + isolated_len;
    let mut config = vec![false; total_len];
    let mut all_configs = Vec::new();
    combine_rec(
        chain_solutions,
        &mut all_configs,
        &mut config,
        mines,
        0,
        0,
        isolated_len,
    )?;
    Ok(all_configs)
}

#[allow(clippy::too_many_arguments)]
fn combine_rec(
    chain_solutions: &[ChainSolution],
    all_configs: &mut Vec<Vec<bool>>,
    config: &mut [bool],
    mines_left: i32,
    chain_idx: usize,
    arr_idx: usize,
    isolated_len: usize,
) -> SolverResult<()> {
    if chain_idx == chain_solutions.len() {
        if mines_left < 0 || mines_left as usize > isolated_len {
            return Ok(());
        }
        let mut overbudget = false;
        for_each_combination(isolated_len, mines_left as usize, |indices| {
            for bit in 0..isolated_len {
                config[arr_idx + bit] = false;
            }
            for &idx in indices {
                config[arr_idx + idx] = true;
            }
            all_configs.push(config.to_vec());
            if all_configs.len() > MAX_ENDGAME_CONFIGS {
                overbudget = true;
                return false;
            }
            true
        });
        if overbudget {
            return Err(SolverError::Overbudget);
        }
        return Ok(());
    }

    let chain = &chain_solutions[chain_idx];
    for assignment in &chain.all_configs {
        let n_mines: i32 = assignment.iter().map(|&b| b as i32).sum();
        if n_mines > mines_left {
            continue;
        }
        for (i, &b) in assignment.iter().enumerate() {
            config[arr_idx + i] = b == 1;
        }
        combine_rec(
            chain_solutions,
            all_configs,
            config,
            mines_left - n_mines,
            chain_idx + 1,
            arr_idx + assignment.len(),
            isolated_len,
        )?;
    }
    Ok(())
}

pub struct EndgameSolver<'a> {
    board: &'a Board,
    /// Board cell indices participating in the endgame, in a fixed order.
    endgame_cells: Vec<usize>,
    pos_to_idx: HashMap<usize, usize>,
    /// `configs[c][pos]` — is cell `pos` a mine in configuration `c`.
    configs: Vec<Vec<bool>>,
    /// `reveal_value[c][pos]` — `-1` if a mine, else the revealed number.
    reveal_value: Vec<Vec<i32>>,
    /// Endgame-local adjacency, used for flood-fill simulation.
    adjacency: Vec<Vec<usize>>,
    memo: HashMap<(u64, ConfigMask), f64>,
}

impl<'a> EndgameSolver<'a> {
    pub fn build(
        board: &'a Board,
        chain_solutions: &[ChainSolution],
        isolated_cells: &[usize],
        mines: i32,
    ) -> SolverResult<Self> {
        let mut endgame_cells: Vec<usize> = Vec::new();
        for chain in chain_solutions {
            endgame_cells.extend(chain.related_cells.iter().copied());
        }
        endgame_cells.extend(isolated_cells.iter().copied());
        let uncertain_count = endgame_cells.len();

        let context_cells = Self::find_context_cells(board, &endgame_cells);
        endgame_cells.extend(context_cells.iter().copied());

        if endgame_cells.len() > MAX_ENDGAME_CELLS {
            return Err(SolverError::Overbudget);
        }

        let pos_to_idx: HashMap<usize, usize> = endgame_cells
            .iter()
            .enumerate()
            .map(|(pos, &cell)| (cell, pos))
            .collect();

        let mut configs = combine_all_configs(chain_solutions, isolated_cells.len(), mines)?;
        for config in &mut configs {
            config.resize(uncertain_count + context_cells.len(), false);
        }
        let reveal_value = Self::precompute_reveal_values(board, &endgame_cells, &pos_to_idx, &configs);
        let adjacency = Self::build_adjacency(board, &endgame_cells, &pos_to_idx);

        Ok(Self {
            board,
            endgame_cells,
            pos_to_idx,
            configs,
            reveal_value,
            adjacency,
            memo: HashMap::new(),
        })
    }

    /// Deterministically-safe cells (`CELL_SAFE`, never a mine in any
    /// config) adjacent to an already-chosen endgame cell: clicking one
    /// yields free information even though it's never itself uncertain.
    /// Mirrors `EndgameSolver::buildConfigurations`'s "solver-safe cells
    /// adjacent to uncertain cells" pass.
    fn find_context_cells(board: &Board, chosen: &[usize]) -> Vec<usize> {
        let chosen_set: std::collections::HashSet<usize> = chosen.iter().copied().collect();
        let mut context = Vec::new();
        let mut added = std::collections::HashSet::new();
        for &cell_idx in chosen {
            for neighbor in board.neighbor_indices(cell_idx) {
                if chosen_set.contains(&neighbor) || added.contains(&neighbor) {
                    continue;
                }
                let cell = board.cell_at(neighbor);
                if cell.value == CELL_SAFE && cell.mine_perc == 0.0 {
                    added.insert(neighbor);
                    context.push(neighbor);
                }
            }
        }
        context
    }

    fn precompute_reveal_values(
        board: &Board,
        endgame_cells: &[usize],
        pos_to_idx: &HashMap<usize, usize>,
        configs: &[Vec<bool>],
    ) -> Vec<Vec<i32>> {
        configs
            .iter()
            .map(|config| {
                endgame_cells
                    .iter()
                    .enumerate()
                    .map(|(pos, &cell_idx)| {
                        if config[pos] {
                            return -1;
                        }
                        let mut count = 0;
                        for neighbor in board.neighbor_indices(cell_idx) {
                            if let Some(&npos) = pos_to_idx.get(&neighbor) {
                                if config[npos] {
                                    count += 1;
                                }
                            } else if board.cell_at(neighbor).value == CELL_FLAG {
                                count += 1;
                            }
                        }
                        count
                    })
                    .collect()
            })
            .collect()
    }

    fn build_adjacency(
        board: &Board,
        endgame_cells: &[usize],
        pos_to_idx: &HashMap<usize, usize>,
    ) -> Vec<Vec<usize>> {
        endgame_cells
            .iter()
            .map(|&cell_idx| {
                board
                    .neighbor_indices(cell_idx)
                    .into_iter()
                    .filter_map(|n| pos_to_idx.get(&n).copied())
                    .collect()
            })
            .collect()
    }

    fn num_cells(&self) -> usize {
        self.endgame_cells.len()
    }

    fn configs_mine_at(&self, alive: &ConfigMask, pos: usize) -> impl Iterator<Item = bool> + '_ {
        (0..self.configs.len())
            .filter(move |&ci| alive.get(ci))
            .map(move |ci| self.configs[ci][pos])
    }

    fn all_mine_at(&self, alive: &ConfigMask, pos: usize) -> bool {
        self.configs_mine_at(alive, pos).all(|m| m)
    }

    fn safe_in_all(&self, alive: &ConfigMask, pos: usize) -> bool {
        self.configs_mine_at(alive, pos).all(|m| !m)
    }

    fn safe_in_some(&self, alive: &ConfigMask, pos: usize) -> bool {
        self.configs_mine_at(alive, pos).any(|m| !m)
    }

    fn find_free_safe(&self, alive: &ConfigMask, revealed: u64) -> Option<usize> {
        (0..self.num_cells()).find(|&pos| (revealed >> pos) & 1 == 0 && self.safe_in_all(alive, pos))
    }

    /// BFS flood-fill reveal simulation starting at `pos`, mirroring
    /// `EndgameSolver::simulateReveal`: cascades through zero-value cells,
    /// never stepping onto a mine.
    fn simulate_reveal(&self, pos: usize, config_idx: usize, revealed: u64) -> u64 {
        let mut new_revealed = revealed | (1u64 << pos);
        if self.reveal_value[config_idx][pos] == 0 {
            let mut queue = VecDeque::from([pos]);
            while let Some(curr) = queue.pop_front() {
                for &neighbor in &self.adjacency[curr] {
                    if (new_revealed >> neighbor) & 1 == 1 {
                        continue;
                    }
                    if self.configs[config_idx][neighbor] {
                        continue;
                    }
                    new_revealed |= 1u64 << neighbor;
                    if self.reveal_value[config_idx][neighbor] == 0 {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        new_revealed
    }

    /// Revealed values in fixed position order (not traversal order), for
    /// newly-revealed cells only — this is the canonical key observations
    /// are grouped by.
    fn observation_values(&self, config_idx: usize, new_revealed: u64, revealed: u64) -> Vec<i32> {
        let newly = new_revealed & !revealed;
        (0..self.num_cells())
            .filter(|&j| (newly >> j) & 1 == 1)
            .map(|j| self.reveal_value[config_idx][j])
            .collect()
    }

    fn expected_value_for_click(&mut self, pos: usize, revealed: u64, alive: &ConfigMask) -> f64 {
        let total = alive.popcount() as f64;
        let mut groups: HashMap<(u64, Vec<i32>), ConfigMask> = HashMap::new();
        for ci in 0..self.configs.len() {
            if !alive.get(ci) || self.configs[ci][pos] {
                continue;
            }
            let new_mask = self.simulate_reveal(pos, ci, revealed);
            let values = self.observation_values(ci, new_mask, revealed);
            groups
                .entry((new_mask, values))
                .or_insert_with(|| ConfigMask::empty(self.configs.len()))
                .set(ci);
        }

        let mut expected = 0.0;
        for ((new_mask, _), group_mask) in groups {
            let group_size = group_mask.popcount() as f64;
            let child_revealed = revealed | new_mask;
            let v = self.solve(child_revealed, &group_mask);
            expected += (group_size / total) * v;
        }
        expected
    }

    /// Memoized expectimax value of the state `(revealed, alive)`: the win
    /// probability under optimal play from here on.
    pub fn solve(&mut self, revealed: u64, alive: &ConfigMask) -> f64 {
        if alive.popcount() == 0 {
            return 0.0;
        }
        if alive.popcount() == 1 {
            return 1.0;
        }

        let win_by_completion = (0..self.num_cells())
            .all(|pos| (revealed >> pos) & 1 == 1 || self.all_mine_at(alive, pos));
        if win_by_completion {
            return 1.0;
        }

        let key = (revealed, alive.clone());
        if let Some(&v) = self.memo.get(&key) {
            return v;
        }

        let value = if let Some(pos) = self.find_free_safe(alive, revealed) {
            self.expected_value_for_click(pos, revealed, alive)
        } else {
            let mut best = 0.0f64;
            for pos in 0..self.num_cells() {
                if (revealed >> pos) & 1 == 1 || !self.safe_in_some(alive, pos) {
                    continue;
                }
                let v = self.expected_value_for_click(pos, revealed, alive);
                if v > best {
                    best = v;
                }
            }
            best
        };

        self.memo.insert(key, value);
        value
    }

    /// Top-level entry: run the search from the empty-revealed root state
    /// and reproduce the best first move.
    pub fn solve_endgame(&mut self) -> EndgameResult {
        if self.num_cells() == 0 {
            let (best_row, best_col) =
                Self::board_proven_safe_cell(self.board).unwrap_or((None, None));
            return EndgameResult {
                win_prob: 1.0,
                best_row,
                best_col,
            };
        }

        let alive = ConfigMask::full(self.configs.len());
        let win_prob = self.solve(0, &alive);

        let (best_row, best_col) = if let Some(pos) = self.find_free_safe(&alive, 0) {
            let (r, c) = self.board.coords(self.endgame_cells[pos]);
            (Some(r), Some(c))
        } else if let Some(coords) = Self::board_proven_safe_cell(self.board) {
            coords
        } else {
            let mut best_pos = None;
            let mut best_val = -1.0;
            for pos in 0..self.num_cells() {
                if !self.safe_in_some(&alive, pos) {
                    continue;
                }
                let v = self.expected_value_for_click(pos, 0, &alive);
                if v > best_val {
                    best_val = v;
                    best_pos = Some(pos);
                }
            }
            match best_pos {
                Some(pos) => {
                    let (r, c) = self.board.coords(self.endgame_cells[pos]);
                    (Some(r), Some(c))
                }
                None => (None, None),
            }
        };

        EndgameResult {
            win_prob,
            best_row,
            best_col,
        }
    }

    /// Any board cell the constraint propagator has already proven safe
    /// (`CELL_SAFE`, not yet clicked), independent of the endgame cell set.
    /// This is the "solver-proven-safe cell" reporting tier from
    /// `EndgameSolver::solveEndgame`'s move-selection fallback.
    fn board_proven_safe_cell(board: &Board) -> Option<(Option<usize>, Option<usize>)> {
        board
            .cells()
            .iter()
            .find(|c| c.value == CELL_SAFE && c.mine_perc == 0.0)
            .map(|c| (Some(c.row), Some(c.col)))
    }

    pub fn num_configs(&self) -> usize {
        self.configs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{CELL_FLAG, CELL_UNDISCOVERED};
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
    fn two_cell_coinflip_has_half_win_probability() {
        // 1x3: [U, 1, U], 1 mine shared between the two U cells.
        let board = Board::new(&[vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED]]);
        let g = group(&[board.index(0, 0), board.index(0, 2)], 1, 1);
        let sol = solve_chain(&[&g]);
        let mut solver = EndgameSolver::build(&board, std::slice::from_ref(&sol), &[], 1).unwrap();
        let result = solver.solve_endgame();
        assert!((result.win_prob - 0.5).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_a_board_proven_safe_cell_when_no_endgame_cell_is_free() {
        // 1x5: [U, 1, U, FLAG, SAFE]. The (0,0)/(0,2) pair is the usual
        // 50/50; the flag buffer at (0,3) keeps (0,4) out of adjacency range
        // of the chain, so it never becomes a context cell, but it's still
        // a proven-safe cell sitting on the board and should win out over
        // gambling on the pair.
        let board = Board::new(&[vec![
            CELL_UNDISCOVERED,
            1,
            CELL_UNDISCOVERED,
            CELL_FLAG,
            CELL_SAFE,
        ]]);
        let g = group(&[board.index(0, 0), board.index(0, 2)], 1, 1);
        let sol = solve_chain(&[&g]);
        let mut solver = EndgameSolver::build(&board, std::slice::from_ref(&sol), &[], 1).unwrap();
        assert_eq!(solver.num_cells(), 2);
        let result = solver.solve_endgame();
        assert!((result.win_prob - 0.5).abs() < 1e-9);
        assert_eq!(result.best_row, Some(0));
        assert_eq!(result.best_col, Some(4));
    }

    #[test]
    fn no_endgame_cells_is_an_automatic_win() {
        let board = Board::new(&[vec![0]]);
        let mut solver = EndgameSolver::build(&board, &[], &[], 0).unwrap();
        let result = solver.solve_endgame();
        assert_eq!(result.win_prob, 1.0);
        assert!(result.best_row.is_none());
    }

    #[test]
    fn overbudget_when_too_many_configs() {
        // 8 independent chains of size 1 forced to 1 mine each produce a single
        // config, so construct instead an isolated-only scenario demanding a
        // combination count far past the cap.
        let board = Board::new(&[vec![CELL_UNDISCOVERED; 1]]);
        let isolated: Vec<usize> = (0..1).collect();
        // Fabricate a huge isolated pool via a synthetic board instead: the
        // combination count C(30, 15) vastly exceeds MAX_ENDGAME_CONFIGS.
        let big_row = vec![CELL_UNDISCOVERED; 30];
        let big_board = Board::new(&[big_row]);
        let big_isolated: Vec<usize> = (0..30).collect();
        let result = EndgameSolver::build(&big_board, &[], &big_isolated, 15);
        assert!(result.is_err());
        // sanity: the trivial 1-cell board with no constraint builds fine
        let _ = EndgameSolver::build(&board, &[], &isolated, 0).unwrap();
    }
}
