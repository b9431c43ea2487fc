use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{Role, Square};

use crate::rules::{MoveRequest, Snapshot};

/// Commands written to the analysis engine, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    /// `setoption name Skill Level value <0..20>`
    SkillLevel(u8),
    /// `position fen <fen>`
    Position(Snapshot),
    /// A play search bounded by time.
    GoMovetime(u64),
    /// An analysis search bounded by depth.
    GoDepth(u32),
    Stop,
    Quit,
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::SkillLevel(level) => {
                write!(f, "setoption name Skill Level value {level}")
            }
            UciCommand::Position(snapshot) => write!(f, "position fen {snapshot}"),
            UciCommand::GoMovetime(ms) => write!(f, "go movetime {ms}"),
            UciCommand::GoDepth(depth) => write!(f, "go depth {depth}"),
            UciCommand::Stop => f.write_str("stop"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// A score as the engine reports it, from the side to move's point of view.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RawScore {
    Centipawns(i32),
    /// Positive: the side to move mates in n. Zero or negative: it is getting mated.
    Mate(i32),
}

/// Something the engine said that the match cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    UciOk,
    ReadyOk,
    Score(RawScore),
    /// The end of a search. `None` is the engine's "no move" answer.
    BestMove(Option<MoveRequest>),
    /// The engine's output stream ended.
    Disconnected,
}

/// Parses one line of engine output. Anything unrecognised yields `None`.
pub fn parse_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim();
    match line {
        "uciok" => return Some(EngineEvent::UciOk),
        "readyok" => return Some(EngineEvent::ReadyOk),
        _ => {}
    }

    let mut tokens = line.split_whitespace();
    if line.starts_with("bestmove") {
        if tokens.next() != Some("bestmove") {
            return None;
        }
        return match tokens.next()? {
            "(none)" | "0000" => Some(EngineEvent::BestMove(None)),
            token => decode_move(token).map(|m| EngineEvent::BestMove(Some(m))),
        };
    }

    let tokens: Vec<&str> = tokens.collect();
    tokens.windows(3).find_map(|w| match w {
        ["score", "cp", value] => value.parse().ok().map(RawScore::Centipawns),
        ["score", "mate", value] => value.parse().ok().map(RawScore::Mate),
        _ => None,
    })
    .map(EngineEvent::Score)
}

/// Decodes a long-algebraic move token such as `e2e4` or `e7e8q`.
pub fn decode_move(token: &str) -> Option<MoveRequest> {
    if !token.is_ascii() || !(token.len() == 4 || token.len() == 5) {
        return None;
    }
    let from: Square = token[0..2].parse().ok()?;
    let to: Square = token[2..4].parse().ok()?;
    let promotion = match token[4..].chars().next() {
        None => None,
        Some(c) => match Role::from_char(c.to_ascii_lowercase())? {
            role @ (Role::Queen | Role::Rook | Role::Bishop | Role::Knight) => Some(role),
            _ => return None,
        },
    };
    Some(MoveRequest {
        from,
        to,
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_render_as_protocol_lines() {
        assert_eq!(UciCommand::SkillLevel(7).to_string(), "setoption name Skill Level value 7");
        assert_eq!(UciCommand::GoMovetime(1000).to_string(), "go movetime 1000");
        assert_eq!(UciCommand::GoDepth(12).to_string(), "go depth 12");
        assert_eq!(
            UciCommand::Position(Snapshot::new("8/8/8/8/8/8/8/K6k w - - 0 1")).to_string(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
    }

    #[test]
    fn scores_are_found_anywhere_in_an_info_line() {
        assert_eq!(
            parse_line("info depth 12 seldepth 18 multipv 1 score cp -35 nodes 1234 pv e7e5"),
            Some(EngineEvent::Score(RawScore::Centipawns(-35)))
        );
        assert_eq!(
            parse_line("info depth 20 score mate -2 pv h2h3"),
            Some(EngineEvent::Score(RawScore::Mate(-2)))
        );
        assert_eq!(
            parse_line("info depth 9 score cp 20 lowerbound"),
            Some(EngineEvent::Score(RawScore::Centipawns(20)))
        );
    }

    #[test]
    fn best_moves_decode_with_and_without_promotion() {
        assert_eq!(
            parse_line("bestmove e2e4 ponder e7e5"),
            Some(EngineEvent::BestMove(Some(MoveRequest::new(Square::E2, Square::E4))))
        );
        assert_eq!(
            parse_line("bestmove b7b8n"),
            Some(EngineEvent::BestMove(Some(
                MoveRequest::new(Square::B7, Square::B8).with_promotion(Role::Knight)
            )))
        );
        assert_eq!(parse_line("bestmove (none)"), Some(EngineEvent::BestMove(None)));
    }

    #[test]
    fn noise_is_ignored() {
        for line in [
            "",
            "id name Stockfish 16",
            "option name Skill Level type spin default 20 min 0 max 20",
            "info string NNUE evaluation enabled",
            "info depth 3 score cp abc",
            "bestmove",
            "bestmove e2",
            "bestmove e7e8k",
            "bestmovee2e4",
        ] {
            assert_eq!(parse_line(line), None, "{line:?}");
        }
        assert_eq!(parse_line("uciok\r\n"), Some(EngineEvent::UciOk));
    }
}
