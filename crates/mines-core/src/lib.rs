//! Constraint-propagation and exact-enumeration Minesweeper probability
//! engine, plus an endgame expectimax win-rate optimizer. Ported from the
//! original C++ solver's `Solver`/`EndgameSolver` pair.

pub mod board;
pub mod chain;
pub mod combinatorics;
pub mod endgame;
pub mod engine;
pub mod error;
pub mod format;
pub mod group;
pub mod probability;
pub mod propagate;
pub mod rng;
pub mod sampler;

pub use board::Board;
pub use engine::{solve_board, solve_endgame, BoardReport};
pub use endgame::{EndgameResult, EndgameSolver};
pub use error::{SolverError, SolverResult};
pub use probability::Marginals;
pub use sampler::{sample_configuration, try_warp, WarpResult};
