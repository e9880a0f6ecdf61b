//! Iterative constraint propagation to a fixpoint. Ported from the original
//! solver's `Solver::iterativeSolve` and its supporting `crossAllGroups`,
//! `syncAllGroups`, `apply`, `filter`, `filterTrivial`, `cleanDisabled`.

use crate::board::{Board, CELL_FLAG, CELL_SAFE, CELL_UNDISCOVERED};
use crate::error::{SolverError, SolverResult};
use crate::group::{cross, Group};
use log::{debug, trace};
use std::collections::BTreeSet;

/// Owns the board and the live set of groups, and drives constraint
/// propagation to a fixpoint. Analogous to the original `Solver`, minus
/// chain enumeration and probability composition (split into separate
/// modules here).
pub struct Propagator {
    pub board: Board,
    pub groups: Vec<Group>,
    next_group_id: usize,
}

impl Propagator {
    /// Build initial groups from every revealed number on the board, and
    /// mark `CELL_SAFE` cells as already solved. Returns
    /// `SolverError::MalformedInput` if any numbered cell's own constraint
    /// is already impossible (negative remaining count, or more mines
    /// required than undiscovered neighbors can hold).
    pub fn new(board: Board) -> SolverResult<Self> {
        let mut solver = Self {
            board,
            groups: Vec::new(),
            next_group_id: 0,
        };
        solver.build_initial_groups()?;
        Ok(solver)
    }

    fn build_initial_groups(&mut self) -> SolverResult<()> {
        let rows = self.board.rows;
        let cols = self.board.cols;
        for r in 0..rows {
            for c in 0..cols {
                let cell = self.board.cell(r, c);
                if !cell.is_revealed_number() {
                    continue;
                }
                let number = cell.value;
                let flagged = self.board.flagged_neighbor_count(r, c) as i32;
                let remaining = number - flagged;
                let undiscovered = self.board.undiscovered_neighbor_indices(r, c);
                if remaining < 0 || remaining as usize > undiscovered.len() {
                    return Err(SolverError::MalformedInput);
                }
                if undiscovered.is_empty() {
                    continue;
                }
                let cells: BTreeSet<usize> = undiscovered.into_iter().collect();
                self.add_group(Group::from_revealed(0, cells, remaining));
            }
        }
        Ok(())
    }

    pub fn add_group(&mut self, mut group: Group) -> usize {
        let id = self.next_group_id;
        self.next_group_id += 1;
        group.id = id;
        for &cell_idx in &group.cells {
            self.board.cell_at_mut(cell_idx).groups.push(id);
        }
        self.groups.push(group);
        id
    }

    fn group_by_id(&self, id: usize) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// All distinct groups sharing at least one cell with `group_id`,
    /// excluding disabled groups and the group itself.
    pub fn overlaps_of(&self, group_id: usize) -> Vec<usize> {
        let Some(group) = self.group_by_id(group_id) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        for &cell_idx in &group.cells {
            for &gid in &self.board.cell_at(cell_idx).groups {
                if gid != group_id {
                    seen.insert(gid);
                }
            }
        }
        seen.into_iter()
            .filter(|gid| self.group_by_id(*gid).is_some_and(|g| !g.disabled))
            .collect()
    }

    /// Cross every pair of groups sharing a cell, bounded by the group-list
    /// length snapshotted at the start of the call — newly produced groups
    /// are not themselves crossed again in the same pass, preventing
    /// runaway growth.
    fn cross_all_groups(&mut self) -> SolverResult<()> {
        let snapshot_len = self.groups.len();
        let mut new_groups = Vec::new();
        for i in 0..snapshot_len {
            if self.groups[i].disabled {
                continue;
            }
            let group_id = self.groups[i].id;
            for other_id in self.overlaps_of(group_id) {
                if other_id <= group_id {
                    continue; // each unordered pair only once
                }
                let (Some(a), Some(b)) = (self.group_by_id(group_id), self.group_by_id(other_id))
                else {
                    continue;
                };
                use crate::group::Relation;
                if matches!(a.relation(b), Relation::Joint) {
                    let parts = cross(a, b, &mut self.next_group_id)?;
                    new_groups.extend(parts);
                }
            }
        }
        let before = self.groups.len();
        for g in new_groups {
            let cells: Vec<usize> = g.cells.iter().copied().collect();
            let id = g.id;
            self.groups.push(g);
            for cell_idx in cells {
                self.board.cell_at_mut(cell_idx).groups.push(id);
            }
        }
        trace!(
            "crossAllGroups: {} -> {} groups",
            before,
            self.groups.len()
        );
        Ok(())
    }

    /// Merge every pair of equal-set groups. Returns `Ok(false)` (no error)
    /// when propagation is simply stable; errors only on contradiction.
    fn sync_all_groups(&mut self) -> SolverResult<bool> {
        use crate::group::Relation;
        let mut changed = false;
        let ids: Vec<usize> = self
            .groups
            .iter()
            .filter(|g| !g.disabled)
            .map(|g| g.id)
            .collect();
        for &gid in &ids {
            if self.group_by_id(gid).is_none_or(|g| g.disabled) {
                continue;
            }
            for other_id in self.overlaps_of(gid) {
                if other_id == gid {
                    continue;
                }
                let relation = match (self.group_by_id(gid), self.group_by_id(other_id)) {
                    (Some(a), Some(b)) if !a.disabled && !b.disabled => a.relation(b),
                    _ => continue,
                };
                if relation != Relation::Equal {
                    continue;
                }
                let (idx_a, idx_b) = (
                    self.groups.iter().position(|g| g.id == gid).unwrap(),
                    self.groups.iter().position(|g| g.id == other_id).unwrap(),
                );
                let (lo, hi) = if idx_a < idx_b {
                    (idx_a, idx_b)
                } else {
                    (idx_b, idx_a)
                };
                let (left, right) = self.groups.split_at_mut(hi);
                left[lo].merge(&mut right[0])?;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Stamp SAFE/FLAG on every cell in a fully-determined group, and
    /// return the newly solved cell indices.
    fn apply(&mut self) -> Vec<usize> {
        let mut solved = Vec::new();
        for group in &self.groups {
            if group.disabled || !group.is_determined() {
                continue;
            }
            let is_mine = group.max_v > 0;
            for &cell_idx in &group.cells {
                let cell = self.board.cell_at_mut(cell_idx);
                if cell.value != CELL_UNDISCOVERED {
                    continue;
                }
                cell.value = if is_mine { CELL_FLAG } else { CELL_SAFE };
                cell.mine_perc = if is_mine { 100.0 } else { 0.0 };
                solved.push(cell_idx);
            }
        }
        solved
    }

    /// For every group touching a newly solved cell, disable it and (if
    /// cells remain) create a reduced successor group with bounds adjusted
    /// for the solved mines/safes now removed.
    fn filter(&mut self, solved: &[usize]) -> SolverResult<()> {
        let solved_set: BTreeSet<usize> = solved.iter().copied().collect();
        let mut touched_ids = BTreeSet::new();
        for &cell_idx in solved {
            for &gid in &self.board.cell_at(cell_idx).groups.clone() {
                touched_ids.insert(gid);
            }
        }
        let mut successors = Vec::new();
        for gid in touched_ids {
            let Some(idx) = self.groups.iter().position(|g| g.id == gid) else {
                continue;
            };
            if self.groups[idx].disabled {
                continue;
            }
            let group = &self.groups[idx];
            let solved_mines = solved_set
                .iter()
                .filter(|&&c| group.cells.contains(&c) && self.board.cell_at(c).value == CELL_FLAG)
                .count() as i32;
            let remaining: BTreeSet<usize> = group
                .cells
                .difference(&solved_set)
                .copied()
                .collect();
            self.groups[idx].disabled = true;
            if remaining.is_empty() {
                continue;
            }
            let min_v = (group.min_v - solved_mines).max(0);
            let max_v = (group.max_v - solved_mines).min(remaining.len() as i32);
            if min_v > max_v {
                return Err(SolverError::Infeasible);
            }
            successors.push(Group::new(0, remaining, min_v, max_v));
        }
        for g in successors {
            self.add_group(g);
        }
        Ok(())
    }

    /// Disable groups whose bounds span `[0, size]` — they carry no
    /// information.
    fn filter_trivial(&mut self) {
        for g in &mut self.groups {
            if !g.disabled && g.is_trivial() {
                g.disabled = true;
            }
        }
    }

    /// Compact the group list, dropping disabled groups and reassigning
    /// contiguous IDs; rewrites every cell's back-reference list to match.
    fn clean_disabled(&mut self) {
        self.groups.retain(|g| !g.disabled);
        for (new_id, g) in self.groups.iter_mut().enumerate() {
            g.id = new_id;
        }
        self.next_group_id = self.groups.len();
        for cell in self.board.cells_mut() {
            cell.groups.clear();
        }
        for g in &self.groups {
            for &cell_idx in &g.cells {
                self.board.cell_at_mut(cell_idx).groups.push(g.id);
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.groups.iter().all(|g| g.disabled || g.is_empty())
    }

    /// Run propagation to a fixpoint: cross all groups, then repeatedly
    /// sync/apply/filter until no progress is made, then clean up.
    pub fn iterative_solve(&mut self) -> SolverResult<()> {
        let before_groups = self.groups.len();
        self.cross_all_groups()?;
        loop {
            let merged = self.sync_all_groups()?;
            let solved = self.apply();
            let progress = merged || !solved.is_empty();
            if !solved.is_empty() {
                self.filter(&solved)?;
            }
            if !progress {
                break;
            }
        }
        self.filter_trivial();
        self.clean_disabled();
        debug!(
            "iterativeSolve: {} -> {} active groups",
            before_groups,
            self.groups.len()
        );
        Ok(())
    }

    /// Active (non-disabled) groups, for downstream chain enumeration.
    pub fn active_groups(&self) -> Vec<&Group> {
        self.groups.iter().filter(|g| !g.disabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_constraint_half_half() {
        // 1x3: [U, 1, U] with 1 mine total among the two undiscovered cells
        let board = Board::new(&[vec![CELL_UNDISCOVERED, 1, CELL_UNDISCOVERED]]);
        let mut solver = Propagator::new(board).unwrap();
        solver.iterative_solve().unwrap();
        // Nothing determinable yet without the mine budget - group stays [1,1]
        assert_eq!(solver.active_groups().len(), 1);
        let g = solver.active_groups()[0];
        assert_eq!((g.min_v, g.max_v), (1, 1));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn determined_group_gets_flagged() {
        // Corner 1 with only one undiscovered neighbor: must be a mine.
        let board = Board::new(&[vec![1, CELL_UNDISCOVERED]]);
        let mut solver = Propagator::new(board).unwrap();
        solver.iterative_solve().unwrap();
        assert_eq!(solver.board.cell(0, 1).value, CELL_FLAG);
    }

    #[test]
    fn zero_constraint_marks_safe() {
        let board = Board::new(&[vec![0, CELL_UNDISCOVERED]]);
        let mut solver = Propagator::new(board).unwrap();
        solver.iterative_solve().unwrap();
        assert_eq!(solver.board.cell(0, 1).value, CELL_SAFE);
    }

    #[test]
    fn malformed_input_is_rejected() {
        // A "1" with zero undiscovered neighbors and no flag is fine (no
        // constraint); a "1" claiming more mines than neighbors exist is not
        // representable on a real board, so exercise the flagged-neighbor
        // overflow path instead: two flags around a "1".
        let board = Board::new(&[vec![CELL_FLAG, 1, CELL_FLAG]]);
        let result = Propagator::new(board);
        assert!(result.is_err());
    }
}
