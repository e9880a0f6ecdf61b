//! The board pretty-printer shared by both host adapters, so the percentage
//! formatting (`[xxx.x%]`, `[100.0%]`, `[  0.0%]`) lives in exactly one
//! place instead of being re-implemented per adapter.

use crate::board::{Board, CELL_FLAG, CELL_SAFE};
use std::fmt::Write as _;

/// Render one cell: its revealed number, or a `[xxx.x%]`-style mine
/// percentage for anything still covered.
fn format_cell(value: i32, mine_perc: f64) -> String {
    if value >= 0 {
        format!("{value:>8}")
    } else {
        format!("[{mine_perc:>5.1}%]")
    }
}

/// Render the whole board as a grid of fixed-width cells, one row per
/// line. Revealed numbers print as-is; `FLAG` always shows `100.0%` and
/// `SAFE` always shows `0.0%`, matching the solver's own determinations.
pub fn format_board(board: &Board) -> String {
    let mut out = String::new();
    for r in 0..board.rows {
        for c in 0..board.cols {
            let cell = board.cell(r, c);
            let perc = match cell.value {
                CELL_FLAG => 100.0,
                CELL_SAFE => 0.0,
                _ => cell.mine_perc,
            };
            let _ = write!(out, "{} ", format_cell(cell.value, perc));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CELL_UNDISCOVERED;

    #[test]
    fn revealed_number_prints_plain() {
        let board = Board::new(&[vec![3]]);
        let rendered = format_board(&board);
        assert!(rendered.contains('3'));
        assert!(!rendered.contains('%'));
    }

    #[test]
    fn flag_prints_full_percent() {
        let board = Board::new(&[vec![CELL_FLAG]]);
        let rendered = format_board(&board);
        assert!(rendered.contains("100.0%"));
    }

    #[test]
    fn safe_prints_zero_percent() {
        let board = Board::new(&[vec![CELL_SAFE]]);
        let rendered = format_board(&board);
        assert!(rendered.contains("  0.0%"));
    }

    #[test]
    fn undiscovered_prints_its_mine_percentage() {
        let mut board = Board::new(&[vec![CELL_UNDISCOVERED]]);
        board.cell_at_mut(0).mine_perc = 37.5;
        let rendered = format_board(&board);
        assert!(rendered.contains(" 37.5%"));
    }
}
