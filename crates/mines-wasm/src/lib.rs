//! `wasm-bindgen` adapter exposing the core solver's two entry points,
//! `solveBoard` and `solveEndgame`, to a JS host.

use mines_core::{solve_board, solve_endgame};
use wasm_bindgen::prelude::*;

fn to_js_value<T>(value: &T) -> Result<JsValue, JsValue>
where
    T: serde::Serialize,
{
    let serializer =
        serde_wasm_bindgen::Serializer::new().serialize_large_number_types_as_bigints(true);
    value
        .serialize(&serializer)
        .map_err(|error| JsValue::from_str(&format!("serialization failure: {error}")))
}

fn parse_board(board: JsValue) -> Result<Vec<Vec<i32>>, JsValue> {
    serde_wasm_bindgen::from_value(board)
        .map_err(|error| JsValue::from_str(&format!("malformed board: {error}")))
}

/// Run constraint propagation and probability composition over `board`
/// (a `rows x cols` array of cell codes, see `mines_core::board` for the
/// `-4..8` encoding) and return a `BoardReport` with per-cell mine
/// percentages and endgame eligibility.
#[wasm_bindgen(js_name = solveBoard)]
pub fn solve_board_js(board: JsValue, mines: i32) -> Result<JsValue, JsValue> {
    let raw = parse_board(board)?;
    match solve_board(&raw, mines) {
        Ok(report) => to_js_value(&report),
        Err(error) => Err(JsValue::from_str(&error.to_string())),
    }
}

/// Run propagation plus the endgame expectimax search over `board` and
/// return an `EndgameResult` with the win probability and the best next
/// move (absent if the board is already fully decided or too large).
#[wasm_bindgen(js_name = solveEndgame)]
pub fn solve_endgame_js(board: JsValue, mines: i32) -> Result<JsValue, JsValue> {
    let raw = parse_board(board)?;
    match solve_endgame(&raw, mines) {
        Ok(result) => to_js_value(&result),
        Err(error) => Err(JsValue::from_str(&error.to_string())),
    }
}
