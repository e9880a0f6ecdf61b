use thiserror::Error;

/// The solver's error taxonomy. Every fallible operation in this crate
/// returns one of these variants; there are no panics on malformed board
/// input, only on internal invariant violations (array bounds etc.) which
/// indicate a bug rather than bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolverError {
    /// A numbered cell's neighborhood is already arithmetically impossible,
    /// or the declared mine count can't fit the board's unsolved cells.
    #[error("malformed input: board constraints are inconsistent")]
    MalformedInput,
    /// Constraint propagation derived an empty `[min, max]` bound.
    #[error("infeasible: no mine assignment satisfies every constraint")]
    Infeasible,
    /// Endgame preconditions exceeded (too many cells or configurations).
    #[error("overbudget: endgame state space too large to enumerate")]
    Overbudget,
    /// Nothing left to decide; every unknown cell is already determined.
    #[error("nothing to do: board is already fully resolved")]
    NothingToDo,
}

pub type SolverResult<T> = Result<T, SolverError>;
