//! CLI front-end: reads a board file in the original solver's
//! `minesweeper.inp` format, runs the core solver, and prints either a
//! formatted board or a JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use mines_core::board::Board;
use mines_core::format::format_board;
use mines_core::{solve_board, solve_endgame};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Minesweeper probability and endgame solver")]
struct Cli {
    /// Path to the board file. Defaults to `minesweeper.inp` in the
    /// current directory.
    #[arg(long, value_name = "PATH", default_value = "minesweeper.inp")]
    input: PathBuf,

    /// Also run the endgame expectimax search and report the win
    /// probability and best move.
    #[arg(long)]
    endgame: bool,

    /// Print the `BoardReport` (and `EndgameResult`, with `--endgame`) as
    /// JSON instead of the human-readable board.
    #[arg(long)]
    json: bool,
}

/// `<H> <W> <mines>` followed by `H` rows of `W` whitespace-separated
/// integers, per the original solver's `minesweeper.inp` format.
fn parse_input(text: &str) -> Result<(Vec<Vec<i32>>, i32)> {
    let mut tokens = text.split_whitespace();
    let rows: usize = tokens
        .next()
        .context("missing row count")?
        .parse()
        .context("row count is not an integer")?;
    let cols: usize = tokens
        .next()
        .context("missing column count")?
        .parse()
        .context("column count is not an integer")?;
    let mines: i32 = tokens
        .next()
        .context("missing mine count")?
        .parse()
        .context("mine count is not an integer")?;

    let mut board = Vec::with_capacity(rows);
    for r in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for c in 0..cols {
            let value: i32 = tokens
                .next()
                .with_context(|| format!("missing cell value at row {r}, col {c}"))?
                .parse()
                .with_context(|| format!("cell value at row {r}, col {c} is not an integer"))?;
            row.push(value);
        }
        board.push(row);
    }
    Ok((board, mines))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading board file {}", cli.input.display()))?;
    let (raw, mines) = parse_input(&text)?;

    let report = solve_board(&raw, mines).context("solving board")?;

    let endgame = if cli.endgame && report.can_endgame {
        Some(solve_endgame(&raw, mines).context("solving endgame")?)
    } else {
        None
    };

    if cli.json {
        #[derive(serde::Serialize)]
        struct Output {
            #[serde(flatten)]
            report: mines_core::BoardReport,
            endgame: Option<mines_core::EndgameResult>,
        }
        let output = Output { report, endgame };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut board = Board::new(&raw);
    for r in 0..board.rows {
        for c in 0..board.cols {
            board.cell_mut(r, c).mine_perc = report.at(r, c);
        }
    }
    print!("{}", format_board(&board));

    if cli.endgame {
        match endgame {
            Some(result) => {
                print!("win probability: {:.2}%", result.win_prob * 100.0);
                match (result.best_row, result.best_col) {
                    (Some(r), Some(c)) => println!(", best move: ({r}, {c})"),
                    _ => println!(", no move needed"),
                }
            }
            None => println!("endgame: not eligible (too many unresolved cells)"),
        }
    }

    Ok(())
}
