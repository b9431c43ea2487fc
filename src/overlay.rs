use serde::{Deserialize, Serialize};
use shakmaty::Square;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArrowOrigin {
    User,
    Engine,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arrow {
    #[serde(with = "crate::chess_serde::square_serde")]
    pub from: Square,
    #[serde(with = "crate::chess_serde::square_serde")]
    pub to: Square,
    pub origin: ArrowOrigin,
}

/// Arrows drawn over the board. Wiped whenever a move is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    arrows: Vec<Arrow>,
}

impl Overlay {
    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    pub fn add_user_arrow(&mut self, from: Square, to: Square) {
        self.push(Arrow {
            from,
            to,
            origin: ArrowOrigin::User,
        });
    }

    pub fn add_engine_arrow(&mut self, from: Square, to: Square) {
        self.push(Arrow {
            from,
            to,
            origin: ArrowOrigin::Engine,
        });
    }

    /// Replaces every engine arrow with a single one.
    pub fn set_engine_arrow(&mut self, from: Square, to: Square) {
        self.clear_engine();
        self.add_engine_arrow(from, to);
    }

    pub fn clear_engine(&mut self) {
        self.arrows.retain(|arrow| arrow.origin != ArrowOrigin::Engine);
    }

    pub fn clear_all(&mut self) {
        self.arrows.clear();
    }

    fn push(&mut self, arrow: Arrow) {
        // A zero-length arrow is a click, not a drawing.
        if arrow.from == arrow.to || self.arrows.contains(&arrow) {
            return;
        }
        self.arrows.push(arrow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_and_dots_are_dropped() {
        let mut overlay = Overlay::default();
        overlay.add_user_arrow(Square::E2, Square::E4);
        overlay.add_user_arrow(Square::E2, Square::E4);
        overlay.add_user_arrow(Square::D4, Square::D4);
        assert_eq!(overlay.arrows().len(), 1);
    }

    #[test]
    fn engine_arrows_are_replaced_without_touching_user_arrows() {
        let mut overlay = Overlay::default();
        overlay.add_user_arrow(Square::G1, Square::F3);
        overlay.set_engine_arrow(Square::E2, Square::E4);
        overlay.set_engine_arrow(Square::D2, Square::D4);
        assert_eq!(
            overlay.arrows(),
            &[
                Arrow {
                    from: Square::G1,
                    to: Square::F3,
                    origin: ArrowOrigin::User
                },
                Arrow {
                    from: Square::D2,
                    to: Square::D4,
                    origin: ArrowOrigin::Engine
                },
            ]
        );
        overlay.clear_all();
        assert!(overlay.arrows().is_empty());
    }
}
