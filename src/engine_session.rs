use std::{collections::VecDeque, time::Duration};

use serde::{Deserialize, Serialize};
use shakmaty::Color;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::MatchConfig,
    error::EngineError,
    rules::{MoveRequest, Snapshot},
    transport::EngineTransport,
    uci::{EngineEvent, RawScore, UciCommand},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Searching,
    Terminated,
}

/// Why a search was started.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// The bot is to move. Time-bounded; its best move is played.
    Play,
    /// The human is to move. Depth-bounded; its best move is only a hint.
    Analysis,
}

/// A search the engine has been asked for and has not finished yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSearch {
    pub snapshot: Snapshot,
    pub kind: SearchKind,
    pub side_to_move: Color,
    /// The engine is considered gone if this search is still unanswered after this.
    pub deadline: Instant,
}

/// Everything dispatch needs to know about the live game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    pub snapshot: Snapshot,
    pub side_to_move: Color,
    pub bot_side: Color,
    pub game_over: bool,
    pub rating: u32,
}

/// What an engine event means for the live game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Nothing to do: handshake noise, a stale answer, or "no move".
    Nothing,
    /// A score for the live position, computed with `side_to_move` to move.
    Score {
        raw: RawScore,
        side_to_move: Color,
    },
    /// The bot's move for the live position. Must be played.
    PlayMove(MoveRequest),
    /// The engine's suggestion for the human. Never played automatically.
    Hint(MoveRequest),
}

/// Maps a human-facing rating onto the engine's skill level.
pub fn skill_level(rating: u32, min_rating: u32, rating_span: u32, max_skill: u8) -> u8 {
    if rating_span == 0 {
        return 0;
    }
    let fraction = (f64::from(rating) - f64::from(min_rating)) / f64::from(rating_span);
    let level = (fraction * f64::from(max_skill)).floor();
    level.clamp(0.0, f64::from(max_skill)) as u8
}

/// One connection to the analysis engine.
///
/// The engine answers searches in the order they were issued, so outstanding searches
/// are kept in a queue: score lines belong to the search at the front and a `bestmove`
/// line finishes it. An answer is stale when the position it was computed for is no
/// longer the live one; stale answers are dropped.
///
/// Every search carries a deadline. An engine that lets the oldest search run past it
/// is treated like one that disconnected.
pub struct EngineSession {
    transport: Box<dyn EngineTransport>,
    state: SessionState,
    pending: VecDeque<PendingSearch>,
    last_sent: Option<Snapshot>,
    movetime_ms: u64,
    analysis_depth: u32,
    play_budget: Duration,
    analysis_budget: Duration,
    stop_superseded: bool,
    min_rating: u32,
    rating_span: u32,
    max_skill: u8,
}

impl EngineSession {
    pub fn new(transport: Box<dyn EngineTransport>, config: &MatchConfig) -> Self {
        EngineSession {
            transport,
            state: SessionState::Uninitialized,
            pending: VecDeque::new(),
            last_sent: None,
            movetime_ms: config.play_movetime_ms,
            analysis_depth: config.analysis_depth,
            play_budget: Duration::from_millis(
                config.play_movetime_ms.saturating_add(config.engine_grace_ms),
            ),
            analysis_budget: Duration::from_millis(config.analysis_timeout_ms),
            stop_superseded: config.stop_superseded_search,
            min_rating: config.min_rating,
            rating_span: config.rating_span,
            max_skill: config.max_skill,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The position most recently sent to the engine.
    pub fn last_sent(&self) -> Option<&Snapshot> {
        self.last_sent.as_ref()
    }

    pub fn skill_for(&self, rating: u32) -> u8 {
        skill_level(rating, self.min_rating, self.rating_span, self.max_skill)
    }

    /// Sends the handshake. Does nothing once the session is up.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Uninitialized => {
                self.send(UciCommand::Uci)?;
                self.send(UciCommand::IsReady)?;
                self.state = SessionState::Ready;
                Ok(())
            }
            SessionState::Terminated => Err(EngineError::Terminated),
            SessionState::Ready | SessionState::Searching => Ok(()),
        }
    }

    /// Starts the search the current turn calls for.
    ///
    /// The bot's turn gets a play search at the rating's skill level; the human's turn
    /// gets an analysis search. Each dispatch supersedes the previous one.
    pub fn dispatch(&mut self, turn: &TurnContext) -> Result<(), EngineError> {
        if turn.game_over {
            return Ok(());
        }
        self.start()?;

        if !self.pending.is_empty() && self.stop_superseded {
            self.send(UciCommand::Stop)?;
        }

        let kind = if turn.side_to_move == turn.bot_side {
            SearchKind::Play
        } else {
            SearchKind::Analysis
        };
        match kind {
            SearchKind::Play => {
                let skill = self.skill_for(turn.rating);
                info!(fen = %turn.snapshot, skill, "requesting engine move");
                self.send(UciCommand::SkillLevel(skill))?;
                self.send(UciCommand::Position(turn.snapshot.clone()))?;
                self.send(UciCommand::GoMovetime(self.movetime_ms))?;
            }
            SearchKind::Analysis => {
                debug!(fen = %turn.snapshot, "requesting analysis");
                self.send(UciCommand::Position(turn.snapshot.clone()))?;
                self.send(UciCommand::GoDepth(self.analysis_depth))?;
            }
        }

        self.pending.push_back(PendingSearch {
            snapshot: turn.snapshot.clone(),
            kind,
            side_to_move: turn.side_to_move,
            deadline: Instant::now() + self.budget(kind),
        });
        self.last_sent = Some(turn.snapshot.clone());
        self.state = SessionState::Searching;
        Ok(())
    }

    /// Tells the engine a new game starts. Searches still running keep their place in
    /// the queue so their answers are recognised as stale.
    pub fn new_game(&mut self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Uninitialized => Ok(()),
            SessionState::Terminated => Err(EngineError::Terminated),
            SessionState::Ready | SessionState::Searching => {
                if !self.pending.is_empty() {
                    self.send(UciCommand::Stop)?;
                }
                self.send(UciCommand::UciNewGame)?;
                self.send(UciCommand::IsReady)
            }
        }
    }

    /// Interprets one engine event against the live position.
    pub fn handle_event(
        &mut self,
        event: EngineEvent,
        live: &Snapshot,
    ) -> Result<SessionUpdate, EngineError> {
        if self.state == SessionState::Terminated {
            return Ok(SessionUpdate::Nothing);
        }
        match event {
            EngineEvent::Disconnected => {
                info!("analysis engine disconnected");
                self.terminate();
                Err(EngineError::Disconnected)
            }
            EngineEvent::UciOk | EngineEvent::ReadyOk => {
                debug!(?event, "engine handshake");
                Ok(SessionUpdate::Nothing)
            }
            EngineEvent::Score(raw) => match self.pending.front() {
                Some(search) if &search.snapshot == live => Ok(SessionUpdate::Score {
                    raw,
                    side_to_move: search.side_to_move,
                }),
                _ => {
                    debug!(?raw, "dropping score for a superseded position");
                    Ok(SessionUpdate::Nothing)
                }
            },
            EngineEvent::BestMove(best) => {
                let Some(search) = self.pending.pop_front() else {
                    debug!(?best, "best move with no search outstanding");
                    return Ok(SessionUpdate::Nothing);
                };
                if self.pending.is_empty() {
                    self.state = SessionState::Ready;
                }
                if &search.snapshot != live {
                    debug!(?best, fen = %search.snapshot, "dropping stale best move");
                    return Ok(SessionUpdate::Nothing);
                }
                Ok(match (best, search.kind) {
                    (None, _) => SessionUpdate::Nothing,
                    (Some(m), SearchKind::Play) => SessionUpdate::PlayMove(m),
                    (Some(m), SearchKind::Analysis) => SessionUpdate::Hint(m),
                })
            }
        }
    }

    /// When the oldest outstanding search runs out of time, if any search is outstanding.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.front().map(|search| search.deadline)
    }

    /// Terminates the session if the oldest outstanding search is overdue at `now`.
    pub fn poll_deadline(&mut self, now: Instant) -> Result<(), EngineError> {
        let Some(search) = self.pending.front() else {
            return Ok(());
        };
        if now <= search.deadline {
            return Ok(());
        }
        let waited = self.budget(search.kind);
        warn!(fen = %search.snapshot, ?waited, "analysis engine stopped answering");
        self.terminate();
        Err(EngineError::Unresponsive(waited))
    }

    fn budget(&self, kind: SearchKind) -> Duration {
        match kind {
            SearchKind::Play => self.play_budget,
            SearchKind::Analysis => self.analysis_budget,
        }
    }

    /// Asks the engine to quit. The session cannot be used afterwards.
    pub fn shutdown(&mut self) {
        if self.state != SessionState::Terminated {
            let _ = self.transport.send(&UciCommand::Quit);
            self.terminate();
        }
    }

    fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        self.pending.clear();
    }

    fn send(&mut self, command: UciCommand) -> Result<(), EngineError> {
        if self.state == SessionState::Terminated {
            return Err(EngineError::Terminated);
        }
        self.transport.send(&command).map_err(|why| {
            self.terminate();
            why
        })
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
