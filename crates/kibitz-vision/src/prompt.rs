//! Prompt text sent to the vision model.

use kibitz_core::{Color, Perspective};

const ORIENTATION_WHITE: &str = "\
You are viewing from WHITE's perspective.
Visual top = rank 8, visual bottom = rank 1
Visual left = file a, visual right = file h";

const ORIENTATION_BLACK: &str = "\
You are viewing from BLACK's perspective.
Visual top = rank 1, visual bottom = rank 8
Visual left = file h, visual right = file a

When reading coordinates, use the LABELS shown on the board (numbers 1-8 on left, letters h-a on bottom).";

const RANK_LISTING: &str = "\
List EXACTLY what piece is on each square, using the board coordinates shown.
Use: K=white king, Q=white queen, R=white rook, B=white bishop, N=white knight, P=white pawn
     k=black king, q=black queen, r=black rook, b=black bishop, n=black knight, p=black pawn
     . = empty

WHITE pieces are LIGHT colored. BLACK pieces are DARK colored.
Ignore any dots/circles (those are move hints, not pieces).

Output in this EXACT format (8 characters per line, no spaces):
8:????????
7:????????
6:????????
5:????????
4:????????
3:????????
2:????????
1:????????

Replace ? with the piece letter or . for empty.
Example: 8:rnbqkbnr means black's back rank with all pieces.";

pub(crate) fn board_prompt(perspective: Perspective) -> String {
    let orientation = match perspective.0 {
        Color::White => ORIENTATION_WHITE,
        Color::Black => ORIENTATION_BLACK,
    };
    format!("{orientation}\n\n{RANK_LISTING}")
}

pub(crate) fn explain_prompt(fen: &str, san: &str) -> String {
    format!(
        "Chess position (FEN): {fen}\n\
         The recommended move is {san}.\n\
         In one or two sentences, explain the idea behind this move for a club player. \
         Do not restate the move list or the FEN."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_follows_perspective() {
        let white = board_prompt(Perspective::WHITE);
        assert!(white.starts_with("You are viewing from WHITE's perspective."));
        assert!(white.contains("Visual left = file a"));

        let black = board_prompt(Perspective::BLACK);
        assert!(black.contains("Visual top = rank 1"));
        assert!(black.contains("letters h-a on bottom"));
        assert!(black.ends_with("all pieces."));
    }

    #[test]
    fn explain_prompt_names_move_and_position() {
        let text = explain_prompt("8/8/8/8/8/8/8/K6k w - - 0 1", "Kb2");
        assert!(text.contains("K6k w"));
        assert!(text.contains("move is Kb2."));
    }
}
