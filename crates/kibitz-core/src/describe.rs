//! Human-readable rendering of moves, lines and evaluations.
//!
//! Everything here is pure: the same position and move always yield the same text.

use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{Color, File, Position as _, Rank, Role, Square};

use crate::position::Position;
use crate::score::Score;

/// Pawn advantage (in centipawns) below which a position is reported as equal.
const EQUAL_MARGIN_CP: i32 = 50;

pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "Pawn",
        Role::Knight => "Knight",
        Role::Bishop => "Bishop",
        Role::Rook => "Rook",
        Role::Queen => "Queen",
        Role::King => "King",
    }
}

/// Describes `mv` as played from `pos`, e.g. `Knight g1 -> f3` or `Castle Kingside`.
pub fn describe(pos: &Position, mv: &UciMove) -> String {
    let (from, to, promotion) = match mv {
        UciMove::Normal {
            from,
            to,
            promotion,
        } => (*from, *to, *promotion),
        _ => return mv.to_string(),
    };

    let Some(piece) = pos.piece_at(from) else {
        return format!("{from} -> {to}");
    };

    if piece.role == Role::King {
        if let Some(kingside) = castle_side(pos, piece.color, from, to) {
            return if kingside {
                "Castle Kingside".to_string()
            } else {
                "Castle Queenside".to_string()
            };
        }
    }

    let mut text = format!("{} {from} -> {to}", role_name(piece.role));
    match pos.piece_at(to) {
        Some(target) if target.color != piece.color => {
            text.push_str(" captures ");
            text.push_str(role_name(target.role));
        }
        None if piece.role == Role::Pawn && from.file() != to.file() => {
            text.push_str(" captures en passant");
        }
        _ => {}
    }
    if let Some(role) = promotion {
        text.push_str(" promotes to ");
        text.push_str(role_name(role));
    }
    text
}

/// `Some(true)` for a kingside castle, `Some(false)` for queenside, `None` otherwise.
fn castle_side(pos: &Position, color: Color, from: Square, to: Square) -> Option<bool> {
    let home = match color {
        Color::White => Rank::First,
        Color::Black => Rank::Eighth,
    };
    if from != Square::from_coords(File::E, home) || to.rank() != home {
        return None;
    }
    let onto_own_rook = pos
        .piece_at(to)
        .is_some_and(|p| p.color == color && p.role == Role::Rook);
    let two_files = (from.file() as i32 - to.file() as i32).abs() == 2
        && matches!(to.file(), File::G | File::C);
    if !(onto_own_rook || two_files) {
        return None;
    }
    Some(to.file() > from.file())
}

/// [`describe`] plus `, check` or `, checkmate` when the move is legal in `pos`.
pub fn annotate(pos: &Position, mv: &UciMove) -> String {
    let mut text = describe(pos, mv);
    let (Some(chess), Ok(m)) = (pos.chess(), pos.to_move(mv)) else {
        return text;
    };
    let mut after = chess.clone();
    after.play_unchecked(&m);
    if after.is_checkmate() {
        text.push_str(", checkmate");
    } else if after.is_check() {
        text.push_str(", check");
    }
    text
}

/// Standard algebraic notation for a legal move, e.g. `Nf3` or `O-O+`.
pub fn san(pos: &Position, mv: &UciMove) -> Option<String> {
    let mut chess = pos.chess()?.clone();
    let m = pos.to_move(mv).ok()?;
    Some(SanPlus::from_move_and_play_unchecked(&mut chess, &m).to_string())
}

/// Describes up to `max_plies` moves of a principal variation, stopping at the first
/// ply that is not legal.
pub fn describe_line(pos: &Position, pv: &[UciMove], max_plies: usize) -> Vec<String> {
    let mut cursor = pos.clone();
    let mut out = Vec::new();
    for mv in pv.iter().take(max_plies) {
        if !cursor.is_legal(mv) {
            break;
        }
        out.push(describe(&cursor, mv));
        if cursor.play(mv).is_err() {
            break;
        }
    }
    out
}

/// Evaluation text from `pov`'s point of view.
pub fn describe_score(score: Score, pov: Color) -> String {
    match score.for_side(pov) {
        Score::Mate(n) if n > 0 => format!("Mate in {n}!"),
        Score::Mate(n) => format!("Opponent mates in {}", n.unsigned_abs()),
        Score::Cp(cp) if cp > EQUAL_MARGIN_CP => {
            format!("You're ahead +{:.1}", f64::from(cp) / 100.0)
        }
        Score::Cp(cp) if cp < -EQUAL_MARGIN_CP => {
            format!("You're behind {:.1}", f64::from(cp) / 100.0)
        }
        Score::Cp(_) => "Equal position".to_string(),
    }
}
