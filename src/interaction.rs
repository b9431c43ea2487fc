use serde::{Deserialize, Serialize};
use shakmaty::{Role, Square};

use crate::rules::{LegalTarget, MoveRequest, RulesEngine};

/// What the user is in the middle of doing with the board.
///
/// The legal targets are recomputed from the rules engine on every selection and are
/// never carried across a move.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InteractionState {
    #[default]
    Idle,
    Selected {
        #[serde(with = "crate::chess_serde::square_serde")]
        origin: Square,
        targets: Vec<LegalTarget>,
    },
    AwaitingPromotion {
        #[serde(with = "crate::chess_serde::square_serde")]
        origin: Square,
        #[serde(with = "crate::chess_serde::square_serde")]
        destination: Square,
    },
    Dragging {
        #[serde(with = "crate::chess_serde::square_serde")]
        origin: Square,
        targets: Vec<LegalTarget>,
    },
}

/// The outcome of feeding one input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The input does not apply in this state.
    Ignored,
    /// Switch to the given state; nothing is played.
    Enter(InteractionState),
    /// Play this move through the commit protocol.
    Commit(MoveRequest),
    /// The user tried an illegal move; switch to the given state and say so.
    Illegal(InteractionState),
}

/// Pieces a pawn may promote to.
pub const PROMOTION_ROLES: [Role; 4] = [Role::Queen, Role::Rook, Role::Bishop, Role::Knight];

impl InteractionState {
    /// The destinations currently highlighted.
    pub fn legal_targets(&self) -> &[LegalTarget] {
        match self {
            InteractionState::Selected { targets, .. }
            | InteractionState::Dragging { targets, .. } => targets,
            _ => &[],
        }
    }

    /// A click on `square`.
    ///
    /// The caller has already checked that it is the user's turn, the game is running
    /// and the live position is on display. A click while dragging means the drop was
    /// lost, so the drag is abandoned.
    pub fn select<R: RulesEngine>(&self, rules: &R, square: Square) -> Transition {
        match self {
            InteractionState::Idle | InteractionState::Dragging { .. } => {
                selection_for(rules, square)
            }
            InteractionState::Selected { origin, targets } => {
                match targets.iter().find(|target| target.to == square) {
                    Some(target) => move_to(*origin, target),
                    None => selection_for(rules, square),
                }
            }
            InteractionState::AwaitingPromotion { .. } => Transition::Ignored,
        }
    }

    /// Picking up the piece on `square`. A drag still open is replaced.
    pub fn begin_drag<R: RulesEngine>(&self, rules: &R, square: Square) -> Transition {
        match self {
            InteractionState::Idle
            | InteractionState::Selected { .. }
            | InteractionState::Dragging { .. } => {
                match movable_targets(rules, square) {
                    Some(targets) => Transition::Enter(InteractionState::Dragging {
                        origin: square,
                        targets,
                    }),
                    None => Transition::Ignored,
                }
            }
            InteractionState::AwaitingPromotion { .. } => Transition::Ignored,
        }
    }

    /// Releasing a dragged piece on `square`.
    pub fn drop_on(&self, square: Square) -> Transition {
        match self {
            InteractionState::Dragging { origin, targets } => {
                match targets.iter().find(|target| target.to == square) {
                    Some(target) => move_to(*origin, target),
                    None => Transition::Illegal(InteractionState::Idle),
                }
            }
            _ => Transition::Ignored,
        }
    }

    /// Picking the promotion piece. Only queen, rook, bishop and knight are accepted.
    pub fn choose_promotion(&self, role: Role) -> Transition {
        match self {
            InteractionState::AwaitingPromotion {
                origin,
                destination,
            } if PROMOTION_ROLES.contains(&role) => {
                Transition::Commit(MoveRequest::new(*origin, *destination).with_promotion(role))
            }
            _ => Transition::Ignored,
        }
    }
}

fn move_to(origin: Square, target: &LegalTarget) -> Transition {
    if target.promotion {
        Transition::Enter(InteractionState::AwaitingPromotion {
            origin,
            destination: target.to,
        })
    } else {
        Transition::Commit(MoveRequest::new(origin, target.to))
    }
}

fn movable_targets<R: RulesEngine>(rules: &R, square: Square) -> Option<Vec<LegalTarget>> {
    if rules.color_at(square) != Some(rules.side_to_move()) {
        return None;
    }
    let targets = rules.legal_targets(square);
    (!targets.is_empty()).then_some(targets)
}

fn selection_for<R: RulesEngine>(rules: &R, square: Square) -> Transition {
    match movable_targets(rules, square) {
        Some(targets) => Transition::Enter(InteractionState::Selected {
            origin: square,
            targets,
        }),
        None => Transition::Enter(InteractionState::Idle),
    }
}
