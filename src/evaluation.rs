use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::{config::MatchConfig, uci::RawScore};

/// Longest mate the encoding tells apart. Centipawn scores are kept below the
/// weakest mate encoding, so every mate outranks every centipawn score.
const MATE_HORIZON: i32 = 1000;

/// An evaluation from the display side's point of view.
///
/// `score` is in centipawns. Mates are encoded near `±mate_score` so that they sort
/// above every centipawn score and shorter mates sort above longer ones.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationSample {
    pub score: i32,
    /// The engine's literal `mate <n>` value, if this is a mate score.
    pub mate_distance: Option<i32>,
}

impl EvaluationSample {
    pub fn is_mate(&self) -> bool {
        self.mate_distance.is_some()
    }

    /// Short label for the evaluation bar: `M3`, or pawns like `1.4`.
    pub fn label(&self) -> String {
        match self.mate_distance {
            Some(n) => format!("M{}", n.unsigned_abs()),
            None => format!("{:.1}", f64::from(self.score.unsigned_abs()) / 100.0),
        }
    }

    /// Wording used in advisory prompts, from the display side's point of view:
    /// `Mate in 3` when it mates, `Mated in 3` when it gets mated, or pawns like `-0.5`.
    pub fn describe(&self) -> String {
        match self.mate_distance {
            Some(n) if self.score > 0 => format!("Mate in {}", n.unsigned_abs()),
            Some(n) => format!("Mated in {}", n.unsigned_abs()),
            None => format!("{:.1}", f64::from(self.score) / 100.0),
        }
    }
}

/// Turns engine scores into [`EvaluationSample`]s for one fixed display side.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    display_side: Color,
    mate_score: i32,
    steepness: f64,
    clamp: f64,
    floor: f64,
    ceiling: f64,
}

impl Normalizer {
    pub fn new(config: &MatchConfig, display_side: Color) -> Self {
        Normalizer {
            display_side,
            mate_score: config.mate_score,
            steepness: config.eval_steepness,
            clamp: config.eval_clamp,
            floor: config.win_probability_floor,
            ceiling: config.win_probability_ceiling,
        }
    }

    /// `raw` was computed with `side_to_move` to move.
    pub fn normalize(&self, raw: RawScore, side_to_move: Color) -> EvaluationSample {
        let sign = if side_to_move == self.display_side { 1 } else { -1 };
        match raw {
            RawScore::Centipawns(cp) => {
                let bound = self.mate_score - MATE_HORIZON;
                EvaluationSample {
                    score: sign * cp.clamp(-bound, bound),
                    mate_distance: None,
                }
            }
            RawScore::Mate(n) => {
                let distance = n.clamp(-(MATE_HORIZON - 1), MATE_HORIZON - 1);
                let encoded = if distance > 0 {
                    self.mate_score - distance
                } else {
                    -self.mate_score - distance
                };
                EvaluationSample {
                    score: sign * encoded,
                    mate_distance: Some(n),
                }
            }
        }
    }

    /// Logistic chance of the display side winning, kept inside the configured floor
    /// and ceiling so the bar never empties.
    pub fn win_probability(&self, score: i32) -> f64 {
        let x = f64::from(score).clamp(-self.clamp, self.clamp);
        let p = 1.0 / (1.0 + (-self.steepness * x).exp());
        p.clamp(self.floor, self.ceiling)
    }
}
