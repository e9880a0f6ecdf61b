//! Group algebra: a group is a set of undiscovered cells known to contain
//! between `min_v` and `max_v` mines. Ported from the original solver's
//! `Group.h`/`Group.cpp`.

use crate::error::{SolverError, SolverResult};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    Subset,
    Superset,
    Joint,
    Disjoint,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: usize,
    pub cells: BTreeSet<usize>,
    pub min_v: i32,
    pub max_v: i32,
    pub disabled: bool,
}

impl Group {
    pub fn new(id: usize, cells: BTreeSet<usize>, min_v: i32, max_v: i32) -> Self {
        Self {
            id,
            cells,
            min_v,
            max_v,
            disabled: false,
        }
    }

    /// A group representing a single revealed number's constraint: its
    /// undiscovered neighbors must together contain exactly
    /// `number - flagged_neighbors` mines.
    pub fn from_revealed(id: usize, cells: BTreeSet<usize>, remaining_mines: i32) -> Self {
        Self::new(id, cells, remaining_mines, remaining_mines)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn intersect(&self, other: &Group) -> BTreeSet<usize> {
        self.cells.intersection(&other.cells).copied().collect()
    }

    pub fn subtract(&self, other: &Group) -> BTreeSet<usize> {
        self.cells.difference(&other.cells).copied().collect()
    }

    pub fn is_disjoint(&self, other: &Group) -> bool {
        self.cells.is_disjoint(&other.cells)
    }

    pub fn relation(&self, other: &Group) -> Relation {
        if self.is_disjoint(other) {
            return Relation::Disjoint;
        }
        let inter = self.intersect(other).len();
        if inter == self.len() && inter == other.len() {
            Relation::Equal
        } else if inter == self.len() {
            Relation::Subset
        } else if inter == other.len() {
            Relation::Superset
        } else {
            Relation::Joint
        }
    }

    /// Tighten `self` and `other` given that together (as disjoint sets)
    /// they must contain between `parent_min` and `parent_max` mines.
    /// Returns which side(s) actually changed.
    pub fn sync(&mut self, other: &mut Group, parent_min: i32, parent_max: i32) -> (bool, bool) {
        let new_self_min = self.min_v.max(parent_min - other.max_v);
        let new_self_max = self.max_v.min(parent_max - other.min_v);
        let self_changed = new_self_min != self.min_v || new_self_max != self.max_v;
        self.min_v = new_self_min;
        self.max_v = new_self_max;

        let new_other_min = other.min_v.max(parent_min - self.max_v);
        let new_other_max = other.max_v.min(parent_max - self.min_v);
        let other_changed = new_other_min != other.min_v || new_other_max != other.max_v;
        other.min_v = new_other_min;
        other.max_v = new_other_max;

        (self_changed, other_changed)
    }

    /// Absorb an equal-set peer: tighten bounds to the intersection and
    /// disable `other`. Fails if the result is an empty range.
    pub fn merge(&mut self, other: &mut Group) -> SolverResult<()> {
        let min_v = self.min_v.max(other.min_v);
        let max_v = self.max_v.min(other.max_v);
        if min_v > max_v {
            return Err(SolverError::Infeasible);
        }
        self.min_v = min_v;
        self.max_v = max_v;
        other.disabled = true;
        Ok(())
    }

    /// True once this group's bounds pin down every cell (all-safe or
    /// all-mine).
    pub fn is_determined(&self) -> bool {
        self.min_v == self.max_v && (self.min_v == 0 || self.max_v as usize == self.len())
    }

    pub fn is_trivial(&self) -> bool {
        self.min_v == 0 && self.max_v as usize == self.len()
    }

    pub fn is_valid(&self) -> bool {
        self.min_v >= 0 && self.min_v <= self.max_v && self.max_v as usize <= self.len()
    }
}

/// Split two overlapping (non-disjoint, non-equal) groups into up to three
/// disjoint parts — `A \ B`, `A ∩ B`, `B \ A` — each with bounds derived by
/// running `sync` against the parents. This is the `cross`/`subcross`
/// operation from the original `Group::cross`.
pub fn cross(a: &Group, b: &Group, next_id: &mut usize) -> SolverResult<Vec<Group>> {
    let only_a = a.subtract(b);
    let both = a.intersect(b);
    let only_b = b.subtract(a);

    let mut out = Vec::with_capacity(3);

    let mut g_both = if !both.is_empty() {
        let min_v = (a.min_v - only_a.len() as i32).max(b.min_v - only_b.len() as i32).max(0);
        let max_v = a.max_v.min(b.max_v).min(both.len() as i32);
        Some(Group::new(0, both, min_v, max_v))
    } else {
        None
    };

    let mut g_only_a = if !only_a.is_empty() {
        let min_v = (a.min_v - g_both.as_ref().map_or(0, |g| g.max_v)).max(0);
        let max_v = a.max_v.min(only_a.len() as i32);
        Some(Group::new(0, only_a, min_v, max_v))
    } else {
        None
    };

    let mut g_only_b = if !only_b.is_empty() {
        let min_v = (b.min_v - g_both.as_ref().map_or(0, |g| g.max_v)).max(0);
        let max_v = b.max_v.min(only_b.len() as i32);
        Some(Group::new(0, only_b, min_v, max_v))
    } else {
        None
    };

    if let (Some(both_g), Some(only_a_g)) = (g_both.as_mut(), g_only_a.as_mut()) {
        both_g.sync(only_a_g, a.min_v, a.max_v);
    }
    if let (Some(both_g), Some(only_b_g)) = (g_both.as_mut(), g_only_b.as_mut()) {
        both_g.sync(only_b_g, b.min_v, b.max_v);
    }

    for mut g in [g_only_a, g_both, g_only_b].into_iter().flatten() {
        if !g.is_valid() {
            return Err(SolverError::Infeasible);
        }
        g.id = *next_id;
        *next_id += 1;
        out.push(g);
    }

    Ok(out)
}
