use serde::{Deserialize, Serialize};
use shakmaty::{Color, Outcome, Role, Square};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    advisory::{AdvisoryContext, AdvisoryHint, AdvisoryReply},
    config::MatchConfig,
    coords::{self, GridId, Orientation},
    engine_session::{EngineSession, SessionState, SessionUpdate, TurnContext},
    error::{AdvisoryError, ConfigError, MatchResult},
    evaluation::{EvaluationSample, Normalizer},
    history::HistoryLedger,
    interaction::{InteractionState, Transition},
    overlay::{Arrow, Overlay},
    rules::{MoveRequest, RulesEngine, Snapshot, StandardRules},
    transport::EngineTransport,
    uci::{parse_line, EngineEvent},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    NotStarted,
    InProgress,
    Checkmate {
        #[serde(with = "crate::chess_serde::color_serde")]
        winner: Color,
    },
    Draw,
    Resigned {
        #[serde(with = "crate::chess_serde::color_serde")]
        winner: Color,
    },
}

fn side_name(side: Color) -> &'static str {
    match side {
        Color::White => "White",
        Color::Black => "Black",
    }
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        matches!(
            self,
            GameStatus::Checkmate { .. } | GameStatus::Draw | GameStatus::Resigned { .. }
        )
    }

    /// The line shown when the game has ended.
    pub fn describe(&self) -> Option<String> {
        match self {
            GameStatus::NotStarted | GameStatus::InProgress => None,
            GameStatus::Checkmate { winner } => {
                Some(format!("Checkmate! {} wins.", side_name(*winner)))
            }
            GameStatus::Draw => Some("Game Over".to_owned()),
            GameStatus::Resigned { winner } => {
                Some(format!("{} wins by resignation.", side_name(*winner)))
            }
        }
    }
}

/// Feedback about the command that produced a view. Never changes any state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// The move was not legal; nothing was played.
    IllegalMove,
    /// The input did not apply: not the user's turn, game not running, or browsing history.
    Ignored,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LastMove {
    #[serde(with = "crate::chess_serde::square_serde")]
    pub from: Square,
    #[serde(with = "crate::chess_serde::square_serde")]
    pub to: Square,
}

/// Everything a UI needs to draw the match after a command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MatchView {
    pub interaction: InteractionState,
    pub history: HistoryLedger,
    /// The position the history cursor points at.
    pub displayed: Snapshot,
    pub evaluation: EvaluationSample,
    pub evaluation_label: String,
    pub win_probability: f64,
    pub arrows: Vec<Arrow>,
    pub hint: Option<AdvisoryHint>,
    pub status: GameStatus,
    pub status_text: Option<String>,
    #[serde(with = "crate::chess_serde::color_serde")]
    pub human_side: Color,
    pub orientation: Orientation,
    pub rating: u32,
    #[serde(with = "crate::chess_serde::option_square_serde")]
    pub check_square: Option<Square>,
    pub last_move: Option<LastMove>,
    pub signal: Option<Signal>,
    pub engine: SessionState,
}

/// One game between a human and the analysis engine.
///
/// The match owns the live position, the history, the interaction state and the
/// engine session, and is driven from a single control loop: session commands from the
/// UI and [`EngineEvent`]s from the engine are applied one at a time. Every move, from
/// either side, goes through the same commit path.
pub struct Match<R: RulesEngine = StandardRules> {
    config: MatchConfig,
    start: R,
    rules: R,
    ledger: HistoryLedger,
    interaction: InteractionState,
    overlay: Overlay,
    engine: EngineSession,
    normalizer: Normalizer,
    evaluation: EvaluationSample,
    hint: Option<AdvisoryHint>,
    human: Color,
    orientation: Orientation,
    rating: u32,
    status: GameStatus,
}

impl Match<StandardRules> {
    /// A match from the standard starting position.
    pub fn new(
        config: MatchConfig,
        transport: Box<dyn EngineTransport>,
    ) -> Result<Self, ConfigError> {
        Match::from_position(config, transport, StandardRules::initial())
    }
}

impl<R: RulesEngine> Match<R> {
    /// A match that starts, and restarts on reset, from `start`. The config is validated first.
    pub fn from_position(
        config: MatchConfig,
        transport: Box<dyn EngineTransport>,
        start: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = EngineSession::new(transport, &config);
        let normalizer = Normalizer::new(&config, Color::White);
        let rating = config.default_rating;
        Ok(Match {
            ledger: HistoryLedger::new(start.snapshot()),
            rules: start.clone(),
            start,
            interaction: InteractionState::Idle,
            overlay: Overlay::default(),
            engine,
            normalizer,
            evaluation: EvaluationSample::default(),
            hint: None,
            human: Color::White,
            orientation: Orientation::White,
            rating,
            status: GameStatus::NotStarted,
            config,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn arrows(&self) -> &[Arrow] {
        self.overlay.arrows()
    }

    pub fn evaluation(&self) -> EvaluationSample {
        self.evaluation
    }

    pub fn hint(&self) -> Option<AdvisoryHint> {
        self.hint
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn human_side(&self) -> Color {
        self.human
    }

    pub fn bot_side(&self) -> Color {
        self.human.other()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn rating(&self) -> u32 {
        self.rating
    }

    pub fn engine_state(&self) -> SessionState {
        self.engine.state()
    }

    /// The cell currently showing `square`.
    pub fn grid_id(&self, square: Square) -> GridId {
        coords::to_grid_id(square, self.orientation)
    }

    /// Starts a game with the human playing `side`. A game already under way is reset first.
    pub fn start_game(&mut self, side: Color) -> MatchResult<MatchView> {
        if self.status != GameStatus::NotStarted {
            self.clear_game()?;
        }
        self.human = side;
        self.orientation = Orientation::from_side(side);
        self.normalizer = Normalizer::new(&self.config, side);
        self.status = GameStatus::InProgress;
        self.refresh_status();
        info!(side = side_name(side), rating = self.rating, "game started");
        self.dispatch()?;
        Ok(self.view())
    }

    /// A click on a board cell.
    pub fn select_square(&mut self, id: GridId) -> MatchResult<MatchView> {
        if !self.accepts_input() {
            return Ok(self.ignored("select"));
        }
        let square = coords::to_square(id, self.orientation);
        let transition = self.interaction.select(&self.rules, square);
        self.apply(transition)
    }

    /// Picking up the piece shown in a cell.
    pub fn begin_drag(&mut self, id: GridId) -> MatchResult<MatchView> {
        if !self.accepts_input() {
            return Ok(self.ignored("drag"));
        }
        let square = coords::to_square(id, self.orientation);
        let transition = self.interaction.begin_drag(&self.rules, square);
        self.apply(transition)
    }

    /// Releasing a dragged piece over a cell.
    pub fn drop_piece(&mut self, id: GridId) -> MatchResult<MatchView> {
        if !self.accepts_input() {
            return Ok(self.ignored("drop"));
        }
        let square = coords::to_square(id, self.orientation);
        let transition = self.interaction.drop_on(square);
        self.apply(transition)
    }

    pub fn choose_promotion(&mut self, role: Role) -> MatchResult<MatchView> {
        if !self.accepts_input() {
            return Ok(self.ignored("promotion"));
        }
        let transition = self.interaction.choose_promotion(role);
        self.apply(transition)
    }

    pub fn step_history_back(&mut self) -> MatchView {
        self.ledger.step_back();
        self.view()
    }

    pub fn step_history_forward(&mut self) -> MatchView {
        self.ledger.step_forward();
        self.view()
    }

    /// Shows the position after ply `index`, clamped to the plies played.
    pub fn jump_to(&mut self, index: usize) -> MatchView {
        self.ledger.jump_to(index);
        self.view()
    }

    /// Changes the bot's rating. The current turn is dispatched again with the new strength.
    pub fn set_rating(&mut self, rating: u32) -> MatchResult<MatchView> {
        let rating = self.config.clamp_rating(rating);
        if rating != self.rating {
            self.rating = rating;
            debug!(rating, "rating changed");
            self.dispatch()?;
        }
        Ok(self.view())
    }

    /// The human gives up; the bot wins.
    pub fn resign(&mut self) -> MatchView {
        if self.status == GameStatus::InProgress {
            self.status = GameStatus::Resigned {
                winner: self.bot_side(),
            };
            self.interaction = InteractionState::Idle;
            info!(side = side_name(self.human), "player resigned");
        }
        self.view()
    }

    /// Back to the starting position, waiting for a new game to be started.
    pub fn reset(&mut self) -> MatchResult<MatchView> {
        self.clear_game()?;
        Ok(self.view())
    }

    pub fn flip_board(&mut self) -> MatchView {
        self.orientation = self.orientation.flipped();
        self.view()
    }

    pub fn add_user_arrow(&mut self, from: GridId, to: GridId) -> MatchView {
        self.overlay.add_user_arrow(
            coords::to_square(from, self.orientation),
            coords::to_square(to, self.orientation),
        );
        self.view()
    }

    pub fn add_engine_arrow(&mut self, from: Square, to: Square) -> MatchView {
        self.overlay.add_engine_arrow(from, to);
        self.view()
    }

    pub fn clear_arrows(&mut self) -> MatchView {
        self.overlay.clear_all();
        self.view()
    }

    /// Applies one event from the analysis engine.
    ///
    /// Fails only when the engine is gone, which ends the session.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> MatchResult<MatchView> {
        let live = self.ledger.live_snapshot().clone();
        let update = self.engine.handle_event(event, &live)?;
        let in_progress = self.status == GameStatus::InProgress;
        match update {
            SessionUpdate::Nothing => {}
            SessionUpdate::Score { raw, side_to_move } if in_progress => {
                self.evaluation = self.normalizer.normalize(raw, side_to_move);
            }
            SessionUpdate::Hint(m) if in_progress => {
                self.hint = Some(AdvisoryHint {
                    from: m.from,
                    to: m.to,
                });
                self.overlay.set_engine_arrow(m.from, m.to);
            }
            SessionUpdate::PlayMove(m) if in_progress => self.play_engine_move(m)?,
            other => debug!(?other, "engine output after the game ended"),
        }
        Ok(self.view())
    }

    /// When the engine must have answered its oldest outstanding search.
    pub fn engine_deadline(&self) -> Option<Instant> {
        self.engine.next_deadline()
    }

    /// Fails, ending the session, once the engine has let a search run past its deadline.
    pub fn poll_engine(&mut self, now: Instant) -> MatchResult<()> {
        self.engine.poll_deadline(now)?;
        Ok(())
    }

    /// Parses and applies one raw line of engine output. Unrecognised lines are ignored.
    pub fn handle_engine_line(&mut self, line: &str) -> MatchResult<MatchView> {
        match parse_line(line) {
            Some(event) => self.handle_engine_event(event),
            None => {
                debug!(line, "ignored engine output");
                Ok(self.view())
            }
        }
    }

    /// Captures the context for an advisory request about the live position.
    ///
    /// Engine arrows are cleared; [`Match::finish_advisory`] puts the hint back once an
    /// answer arrives.
    pub fn begin_advisory(&mut self, user_text: &str) -> Result<AdvisoryContext, AdvisoryError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(AdvisoryError::EmptyPrompt);
        }
        self.overlay.clear_engine();
        Ok(AdvisoryContext {
            snapshot: self.ledger.live_snapshot().clone(),
            evaluation: self.evaluation,
            side: self.human,
            hint: self.hint,
            user_text: user_text.to_owned(),
        })
    }

    /// Shows the hint the answer was about, unless the position has moved on since.
    pub fn finish_advisory(&mut self, context: &AdvisoryContext, reply: &AdvisoryReply) -> MatchView {
        if !reply.is_fallback() && &context.snapshot == self.ledger.live_snapshot() {
            if let Some(hint) = context.hint {
                self.overlay.add_engine_arrow(hint.from, hint.to);
            }
        }
        self.view()
    }

    /// Asks the engine to quit. Further engine-bound commands fail.
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }

    pub fn view(&self) -> MatchView {
        self.view_with(None)
    }

    fn view_with(&self, signal: Option<Signal>) -> MatchView {
        MatchView {
            interaction: self.interaction.clone(),
            history: self.ledger.clone(),
            displayed: self.ledger.displayed_snapshot().clone(),
            evaluation: self.evaluation,
            evaluation_label: self.evaluation.label(),
            win_probability: self.normalizer.win_probability(self.evaluation.score),
            arrows: self.overlay.arrows().to_vec(),
            hint: self.hint,
            status: self.status,
            status_text: self.status.describe(),
            human_side: self.human,
            orientation: self.orientation,
            rating: self.rating,
            check_square: if self.ledger.is_live() {
                self.rules.checked_king()
            } else {
                None
            },
            last_move: self.ledger.displayed_last_ply().map(|ply| LastMove {
                from: ply.from,
                to: ply.to,
            }),
            signal,
            engine: self.engine.state(),
        }
    }

    fn ignored(&self, what: &'static str) -> MatchView {
        debug!(what, cursor = ?self.ledger.cursor(), status = ?self.status, "input ignored");
        self.view_with(Some(Signal::Ignored))
    }

    /// User input is only taken on the live position, during a game, on the user's turn.
    fn accepts_input(&self) -> bool {
        self.status == GameStatus::InProgress
            && self.ledger.is_live()
            && self.rules.side_to_move() == self.human
            && !self.rules.is_game_over()
    }

    fn apply(&mut self, transition: Transition) -> MatchResult<MatchView> {
        let signal = match transition {
            Transition::Ignored => Some(Signal::Ignored),
            Transition::Enter(state) => {
                self.interaction = state;
                None
            }
            Transition::Illegal(state) => {
                self.interaction = state;
                Some(Signal::IllegalMove)
            }
            Transition::Commit(request) => self.commit(request)?,
        };
        Ok(self.view_with(signal))
    }

    /// The one way a move gets played.
    ///
    /// On success the ply is recorded, arrows and selection are cleared and the engine
    /// is told about the new turn. On rejection nothing changes.
    fn commit(&mut self, request: MoveRequest) -> MatchResult<Option<Signal>> {
        match self.rules.apply_move(&request) {
            Ok(ply) => {
                debug!(san = %ply.san, "move committed");
                self.ledger.append(ply, self.rules.snapshot());
                self.overlay.clear_all();
                self.interaction = InteractionState::Idle;
                self.hint = None;
                self.refresh_status();
                self.dispatch()?;
                Ok(None)
            }
            Err(rejected) => {
                warn!(%rejected, "rules engine rejected a move");
                Ok(Some(Signal::IllegalMove))
            }
        }
    }

    fn play_engine_move(&mut self, proposed: MoveRequest) -> MatchResult<()> {
        if self.rules.side_to_move() != self.bot_side() {
            debug!(%proposed, "engine move arrived on the human's turn");
            return Ok(());
        }
        let request = match proposed.promotion {
            None if self.rules.is_promotion(proposed.from, proposed.to) => {
                proposed.with_promotion(Role::Queen)
            }
            _ => proposed,
        };
        info!(%request, "playing engine move");
        self.commit(request)?;
        Ok(())
    }

    fn refresh_status(&mut self) {
        if self.status != GameStatus::InProgress {
            return;
        }
        if let Some(outcome) = self.rules.outcome() {
            self.status = match outcome {
                Outcome::Decisive { winner } => GameStatus::Checkmate { winner },
                Outcome::Draw => GameStatus::Draw,
            };
            info!(status = ?self.status, "game over");
        }
    }

    fn dispatch(&mut self) -> MatchResult<()> {
        if self.status != GameStatus::InProgress {
            return Ok(());
        }
        let turn = TurnContext {
            snapshot: self.ledger.live_snapshot().clone(),
            side_to_move: self.rules.side_to_move(),
            bot_side: self.bot_side(),
            game_over: self.rules.is_game_over(),
            rating: self.rating,
        };
        self.engine.dispatch(&turn)?;
        Ok(())
    }

    fn clear_game(&mut self) -> MatchResult<()> {
        self.rules = self.start.clone();
        self.ledger.reset();
        self.interaction = InteractionState::Idle;
        self.overlay.clear_all();
        self.evaluation = EvaluationSample::default();
        self.hint = None;
        self.status = GameStatus::NotStarted;
        info!("game reset");
        self.engine.new_game()?;
        Ok(())
    }
}
