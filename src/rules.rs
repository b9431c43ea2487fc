use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen, san::SanPlus, uci::Uci, CastlingMode, Chess, Color, EnPassantMode, Move, Outcome,
    Position, Role, Square,
};

use crate::error::{MoveRejected, RulesError};

/// A serialized position (FEN). Immutable once produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(fen: impl Into<String>) -> Self {
        Snapshot(fen.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Quiet,
    Capture,
}

/// A square the selected piece may move to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LegalTarget {
    #[serde(with = "crate::chess_serde::square_serde")]
    pub to: Square,
    pub kind: TargetKind,
    /// Moving here promotes, so a piece has to be chosen first.
    pub promotion: bool,
}

/// A move as the user or the engine asks for it, in UCI terms.
///
/// Castling is expressed as the king moving two squares (`e1g1`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveRequest {
    #[serde(with = "crate::chess_serde::square_serde")]
    pub from: Square,
    #[serde(with = "crate::chess_serde::square_serde")]
    pub to: Square,
    #[serde(with = "crate::chess_serde::promotion_serde", default)]
    pub promotion: Option<Role>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        MoveRequest {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(self, role: Role) -> Self {
        MoveRequest {
            promotion: Some(role),
            ..self
        }
    }

    pub fn to_uci(&self) -> Uci {
        Uci::Normal {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlyFlags {
    pub capture: bool,
    pub castle: bool,
    pub promotion: bool,
    pub check: bool,
}

/// One committed half-move. Never mutated after it is created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ply {
    #[serde(with = "crate::chess_serde::square_serde")]
    pub from: Square,
    #[serde(with = "crate::chess_serde::square_serde")]
    pub to: Square,
    #[serde(with = "crate::chess_serde::promotion_serde", default)]
    pub promotion: Option<Role>,
    /// Standard algebraic notation, with check and mate suffixes.
    pub san: String,
    #[serde(with = "crate::chess_serde::color_serde")]
    pub side: Color,
    pub flags: PlyFlags,
}

/// The chess rules collaborator.
///
/// The match never interprets positions itself; it asks a rules engine and keeps the
/// [`Snapshot`]s it hands back.
pub trait RulesEngine: Clone + Send + Sized {
    /// The standard starting position.
    fn initial() -> Self;

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, RulesError>;

    fn snapshot(&self) -> Snapshot;

    fn side_to_move(&self) -> Color;

    /// The color of the piece on `square`, if any.
    fn color_at(&self, square: Square) -> Option<Color>;

    /// Destinations of the piece on `from`. Empty if there is no piece that may move.
    fn legal_targets(&self, from: Square) -> Vec<LegalTarget>;

    /// Plays the move, or leaves the position untouched and rejects it.
    ///
    /// A move onto a promotion square must carry its promotion piece.
    fn apply_move(&mut self, request: &MoveRequest) -> Result<Ply, MoveRejected>;

    fn is_check(&self) -> bool;

    fn is_game_over(&self) -> bool;

    fn outcome(&self) -> Option<Outcome>;

    /// The square of the side to move's king while it is in check.
    fn checked_king(&self) -> Option<Square>;

    /// Whether any legal move from `from` to `to` promotes.
    fn is_promotion(&self, from: Square, to: Square) -> bool {
        self.legal_targets(from)
            .iter()
            .any(|target| target.to == to && target.promotion)
    }
}

/// Standard chess, backed by [`shakmaty::Chess`].
#[derive(Debug, Clone, Default)]
pub struct StandardRules {
    position: Chess,
}

/// Where a move lands from the user's point of view. For castling this is the king's
/// destination, not the rook square shakmaty uses internally.
fn destination(m: &Move) -> Square {
    match m.to_uci(CastlingMode::Standard) {
        Uci::Normal { to, .. } => to,
        _ => m.to(),
    }
}

impl RulesEngine for StandardRules {
    fn initial() -> Self {
        StandardRules::default()
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, RulesError> {
        let invalid = |reason: String| RulesError::InvalidPosition {
            fen: snapshot.as_str().to_owned(),
            reason,
        };
        let fen: Fen = snapshot
            .as_str()
            .parse()
            .map_err(|e| invalid(format!("{e}")))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;
        Ok(StandardRules { position })
    }

    fn snapshot(&self) -> Snapshot {
        let fen = Fen::from_position(self.position.clone(), EnPassantMode::Legal);
        Snapshot(fen.to_string())
    }

    fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    fn color_at(&self, square: Square) -> Option<Color> {
        self.position.board().color_at(square)
    }

    fn legal_targets(&self, from: Square) -> Vec<LegalTarget> {
        let mut targets: Vec<LegalTarget> = Vec::new();
        for m in self.position.legal_moves() {
            if m.from() != Some(from) {
                continue;
            }
            let to = destination(&m);
            // The four promotion choices share one destination.
            if let Some(existing) = targets.iter_mut().find(|t| t.to == to) {
                existing.promotion |= m.is_promotion();
                continue;
            }
            targets.push(LegalTarget {
                to,
                kind: if m.is_capture() {
                    TargetKind::Capture
                } else {
                    TargetKind::Quiet
                },
                promotion: m.is_promotion(),
            });
        }
        targets
    }

    fn apply_move(&mut self, request: &MoveRequest) -> Result<Ply, MoveRejected> {
        let chosen = self
            .position
            .legal_moves()
            .into_iter()
            .find(|m| {
                m.from() == Some(request.from)
                    && destination(m) == request.to
                    && m.promotion() == request.promotion
            })
            .ok_or(MoveRejected { request: *request })?;

        let side = self.position.turn();
        let mut next = self.position.clone();
        let san = SanPlus::from_move_and_play_unchecked(&mut next, &chosen);
        let flags = PlyFlags {
            capture: chosen.is_capture(),
            castle: chosen.is_castle(),
            promotion: chosen.is_promotion(),
            check: next.is_check(),
        };
        self.position = next;

        Ok(Ply {
            from: request.from,
            to: request.to,
            promotion: chosen.promotion(),
            san: san.to_string(),
            side,
            flags,
        })
    }

    fn is_check(&self) -> bool {
        self.position.is_check()
    }

    fn is_game_over(&self) -> bool {
        self.position.is_game_over()
    }

    fn outcome(&self) -> Option<Outcome> {
        self.position.outcome()
    }

    fn checked_king(&self) -> Option<Square> {
        if self.position.is_check() {
            self.position.board().king_of(self.position.turn())
        } else {
            None
        }
    }
}
