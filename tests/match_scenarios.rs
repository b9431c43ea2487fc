use std::time::Duration;

use match_orchestrator::{
    error::{ConfigError, EngineError, MoveRejected, RulesError},
    history::ViewCursor,
    interaction::InteractionState,
    overlay::ArrowOrigin,
    rules::{LegalTarget, MoveRequest, Ply, RulesEngine, Snapshot, StandardRules},
    shakmaty::{Color, Outcome, Role, Square},
    uci::{EngineEvent, UciCommand},
    AdvisoryError, AdvisoryReply, ChannelTransport, EngineTransport, GameStatus, GridId, Match,
    MatchConfig, MatchError, Orientation, Signal,
};
use tokio::{sync::mpsc::UnboundedReceiver, time::Instant};

fn new_match() -> (Match, UnboundedReceiver<UciCommand>) {
    let (transport, rx) = ChannelTransport::new();
    (
        Match::new(MatchConfig::default(), Box::new(transport)).unwrap(),
        rx,
    )
}

fn from_fen(fen: &str) -> (Match, UnboundedReceiver<UciCommand>) {
    let (transport, rx) = ChannelTransport::new();
    let rules = StandardRules::from_snapshot(&Snapshot::new(fen)).unwrap();
    (
        Match::from_position(MatchConfig::default(), Box::new(transport), rules).unwrap(),
        rx,
    )
}

fn sent(rx: &mut UnboundedReceiver<UciCommand>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(command) = rx.try_recv() {
        out.push(command.to_string());
    }
    out
}

fn cell(m: &Match, square: Square) -> GridId {
    m.grid_id(square)
}

fn play(m: &mut Match, from: Square, to: Square) {
    let from = cell(m, from);
    let to = cell(m, to);
    m.select_square(from).unwrap();
    let view = m.select_square(to).unwrap();
    assert_eq!(view.signal, None);
}

struct DeadEngine;

impl EngineTransport for DeadEngine {
    fn send(&mut self, _command: &UciCommand) -> Result<(), EngineError> {
        Err(EngineError::Disconnected)
    }
}

/// Standard chess that refuses to play anything.
#[derive(Clone)]
struct Stubborn(StandardRules);

impl RulesEngine for Stubborn {
    fn initial() -> Self {
        Stubborn(StandardRules::initial())
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, RulesError> {
        StandardRules::from_snapshot(snapshot).map(Stubborn)
    }

    fn snapshot(&self) -> Snapshot {
        self.0.snapshot()
    }

    fn side_to_move(&self) -> Color {
        self.0.side_to_move()
    }

    fn color_at(&self, square: Square) -> Option<Color> {
        self.0.color_at(square)
    }

    fn legal_targets(&self, from: Square) -> Vec<LegalTarget> {
        self.0.legal_targets(from)
    }

    fn apply_move(&mut self, request: &MoveRequest) -> Result<Ply, MoveRejected> {
        Err(MoveRejected { request: *request })
    }

    fn is_check(&self) -> bool {
        self.0.is_check()
    }

    fn is_game_over(&self) -> bool {
        self.0.is_game_over()
    }

    fn outcome(&self) -> Option<Outcome> {
        self.0.outcome()
    }

    fn checked_king(&self) -> Option<Square> {
        self.0.checked_king()
    }
}

#[test]
fn engine_move_is_played_for_the_bot() {
    let (mut m, mut rx) = new_match();
    m.start_game(Color::Black).unwrap();
    assert_eq!(
        sent(&mut rx),
        [
            "uci",
            "isready",
            "setoption name Skill Level value 0",
            "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "go movetime 1000"
        ]
    );

    let view = m.handle_engine_line("bestmove e2e4 ponder e7e5").unwrap();
    assert_eq!(view.history.len(), 1);
    let ply = &view.history.plies()[0];
    assert_eq!((ply.from, ply.to), (Square::E2, Square::E4));
    assert_eq!(view.hint, None);
    assert_eq!(m.rules().side_to_move(), Color::Black);

    // The human's turn now gets an analysis search.
    let after = sent(&mut rx);
    assert_eq!(after.last().map(String::as_str), Some("go depth 12"));
}

#[test]
fn human_move_by_clicks() {
    let (mut m, mut rx) = new_match();
    m.start_game(Color::White).unwrap();
    sent(&mut rx);
    m.add_user_arrow(cell(&m, Square::G1), cell(&m, Square::F3));
    assert_eq!(m.arrows().len(), 1);

    let view = m.select_square(cell(&m, Square::E2)).unwrap();
    assert!(matches!(
        view.interaction,
        InteractionState::Selected { origin: Square::E2, .. }
    ));
    let view = m.select_square(cell(&m, Square::E4)).unwrap();

    assert_eq!(view.interaction, InteractionState::Idle);
    assert_eq!(view.history.len(), 1);
    assert!(view.arrows.is_empty());
    assert_eq!(view.last_move.map(|l| (l.from, l.to)), Some((Square::E2, Square::E4)));
    assert_eq!(
        sent(&mut rx),
        [
            "stop",
            "setoption name Skill Level value 0",
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
            "go movetime 1000"
        ]
    );
}

#[test]
fn mate_score_against_the_player() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    play(&mut m, Square::E2, Square::E4);

    // Leftovers of the analysis search for the starting position.
    m.handle_engine_line("info depth 12 score cp 40 pv e2e4").unwrap();
    m.handle_engine_line("bestmove e2e4").unwrap();
    assert_eq!(m.evaluation().score, 0);

    m.handle_engine_line("info depth 8 score cp 900 pv d8h4").unwrap();
    let cp_only = m.evaluation().score.abs();

    let view = m
        .handle_engine_line("info depth 9 seldepth 12 score mate 3 nodes 5000 pv d8h4")
        .unwrap();
    assert!(view.evaluation.is_mate());
    assert_eq!(view.evaluation.mate_distance, Some(3));
    assert_eq!(view.evaluation.score, -9997);
    assert!(view.evaluation.score.abs() > cp_only);
    assert_eq!(view.evaluation_label, "M3");
    assert_eq!(view.win_probability, 0.05);
}

#[test]
fn input_is_ignored_while_browsing() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    play(&mut m, Square::E2, Square::E4);
    m.handle_engine_line("bestmove e2e4").unwrap();
    m.handle_engine_line("bestmove e7e5").unwrap();
    assert_eq!(m.history().len(), 2);

    let view = m.jump_to(0);
    assert_eq!(view.history.cursor(), ViewCursor::At(0));
    assert_eq!(view.displayed, *m.history().snapshot_at(0).unwrap());
    assert_eq!(view.last_move.map(|l| l.to), Some(Square::E4));

    let before = m.view();
    let view = m.select_square(cell(&m, Square::D2)).unwrap();
    assert_eq!(view.signal, Some(Signal::Ignored));
    assert_eq!(view.interaction, before.interaction);
    assert_eq!(view.history, before.history);
}

#[test]
fn history_navigation_never_touches_the_game() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    play(&mut m, Square::E2, Square::E4);
    m.handle_engine_line("bestmove e2e4").unwrap();
    m.handle_engine_line("bestmove e7e5").unwrap();
    let live = m.history().live_snapshot().clone();

    assert_eq!(m.step_history_back().history.cursor(), ViewCursor::At(1));
    assert_eq!(m.step_history_back().history.cursor(), ViewCursor::At(0));
    assert_eq!(m.step_history_back().history.cursor(), ViewCursor::At(0));
    assert_eq!(m.rules().snapshot(), live);
    assert_eq!(m.step_history_forward().history.cursor(), ViewCursor::At(1));
    assert_eq!(m.step_history_forward().history.cursor(), ViewCursor::Live);
    assert_eq!(m.jump_to(99).history.cursor(), ViewCursor::At(1));

    // Back on the live position, moves are accepted again.
    m.step_history_forward();
    assert!(m.history().is_live());
    play(&mut m, Square::G1, Square::F3);
    assert_eq!(m.history().len(), 3);
}

#[test]
fn stale_best_move_is_never_played() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    play(&mut m, Square::E2, Square::E4);

    // Answers the analysis search for the starting position, not the bot's turn.
    let view = m.handle_engine_line("bestmove d2d4").unwrap();
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.hint, None);
    assert_eq!(m.rules().side_to_move(), Color::Black);
}

#[test]
fn engine_answer_after_reset_is_dropped() {
    let (mut m, mut rx) = new_match();
    m.start_game(Color::Black).unwrap();
    sent(&mut rx);

    let view = m.reset().unwrap();
    assert_eq!(view.status, GameStatus::NotStarted);
    assert_eq!(sent(&mut rx), ["stop", "ucinewgame", "isready"]);

    let view = m.handle_engine_line("bestmove e2e4").unwrap();
    assert!(view.history.is_empty());
}

#[test]
fn human_promotion_waits_for_a_choice() {
    let (mut m, _rx) = from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1");
    m.start_game(Color::White).unwrap();

    m.select_square(cell(&m, Square::A7)).unwrap();
    let view = m.select_square(cell(&m, Square::A8)).unwrap();
    assert_eq!(
        view.interaction,
        InteractionState::AwaitingPromotion {
            origin: Square::A7,
            destination: Square::A8
        }
    );
    assert!(view.history.is_empty());

    // Only the four promotion pieces are accepted.
    let view = m.choose_promotion(Role::King).unwrap();
    assert_eq!(view.signal, Some(Signal::Ignored));

    let view = m.choose_promotion(Role::Knight).unwrap();
    assert_eq!(view.history.plies()[0].promotion, Some(Role::Knight));
    assert!(view.history.plies()[0].flags.promotion);
    assert_eq!(view.interaction, InteractionState::Idle);
}

#[test]
fn engine_promotion_defaults_to_queen() {
    let (mut m, _rx) = from_fen("k7/8/8/8/8/8/p6K/8 b - - 0 1");
    m.start_game(Color::White).unwrap();
    let view = m.handle_engine_line("bestmove a2a1").unwrap();
    assert_eq!(view.history.plies()[0].promotion, Some(Role::Queen));
}

#[test]
fn dropping_on_an_illegal_square() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    let view = m.begin_drag(cell(&m, Square::E2)).unwrap();
    assert!(matches!(view.interaction, InteractionState::Dragging { .. }));

    let view = m.drop_piece(cell(&m, Square::E5)).unwrap();
    assert_eq!(view.signal, Some(Signal::IllegalMove));
    assert_eq!(view.interaction, InteractionState::Idle);
    assert!(view.history.is_empty());

    m.begin_drag(cell(&m, Square::G1)).unwrap();
    let view = m.drop_piece(cell(&m, Square::F3)).unwrap();
    assert_eq!(view.history.len(), 1);
}

#[test]
fn no_input_on_the_bots_turn() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::Black).unwrap();
    let view = m.select_square(cell(&m, Square::E2)).unwrap();
    assert_eq!(view.signal, Some(Signal::Ignored));
    assert_eq!(view.interaction, InteractionState::Idle);
}

#[test]
fn no_input_before_the_game_starts() {
    let (mut m, _rx) = new_match();
    let view = m.select_square(cell(&m, Square::E2)).unwrap();
    assert_eq!(view.signal, Some(Signal::Ignored));
}

#[test]
fn checkmate_ends_the_game() {
    let (mut m, mut rx) = from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");
    m.start_game(Color::White).unwrap();
    sent(&mut rx);

    play(&mut m, Square::A1, Square::A8);
    let view = m.view();
    assert_eq!(
        view.status,
        GameStatus::Checkmate {
            winner: Color::White
        }
    );
    assert_eq!(view.status_text.as_deref(), Some("Checkmate! White wins."));
    assert_eq!(view.check_square, Some(Square::G8));
    assert!(sent(&mut rx).is_empty());

    let view = m.select_square(cell(&m, Square::G1)).unwrap();
    assert_eq!(view.signal, Some(Signal::Ignored));
}

#[test]
fn resigning_hands_the_win_to_the_bot() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    let view = m.resign();
    assert_eq!(
        view.status,
        GameStatus::Resigned {
            winner: Color::Black
        }
    );
    assert_eq!(view.status_text.as_deref(), Some("Black wins by resignation."));
}

#[test]
fn rating_changes_redispatch_the_turn() {
    let (mut m, mut rx) = new_match();
    m.start_game(Color::Black).unwrap();
    sent(&mut rx);

    let view = m.set_rating(1750).unwrap();
    assert_eq!(view.rating, 1750);
    let commands = sent(&mut rx);
    assert_eq!(commands[0], "stop");
    assert!(commands.contains(&"setoption name Skill Level value 10".to_owned()));

    assert_eq!(m.set_rating(99_999).unwrap().rating, 3250);
    assert_eq!(m.set_rating(0).unwrap().rating, 250);
}

#[test]
fn flipping_the_board_changes_only_the_view() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    let e2 = cell(&m, Square::E2);
    assert_eq!(e2.to_string(), "6-4");

    let view = m.flip_board();
    assert_eq!(view.orientation, Orientation::Black);
    assert_eq!(cell(&m, Square::E2).to_string(), "1-3");

    let view = m.select_square(cell(&m, Square::E2)).unwrap();
    assert!(matches!(
        view.interaction,
        InteractionState::Selected { origin: Square::E2, .. }
    ));
}

#[test]
fn hint_is_shown_as_an_engine_arrow() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    let view = m.handle_engine_line("bestmove e2e4").unwrap();
    assert_eq!(view.hint.map(|h| (h.from, h.to)), Some((Square::E2, Square::E4)));
    assert_eq!(view.arrows.len(), 1);
    assert_eq!(view.arrows[0].origin, ArrowOrigin::Engine);
}

#[test]
fn advisory_round_trip() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    m.handle_engine_line("bestmove e2e4").unwrap();

    assert_eq!(m.begin_advisory("   "), Err(AdvisoryError::EmptyPrompt));

    let context = m.begin_advisory("what should I play?").unwrap();
    assert!(m.arrows().is_empty());
    assert!(context.prompt().contains("Best Move: e2 to e4."));

    let fallback = AdvisoryReply {
        text: "Systems busy. Please try again.".to_owned(),
        backend: None,
    };
    assert!(m.finish_advisory(&context, &fallback).arrows.is_empty());

    let answer = AdvisoryReply {
        text: "Take the centre.".to_owned(),
        backend: Some("primary".to_owned()),
    };
    let view = m.finish_advisory(&context, &answer);
    assert_eq!(view.arrows.len(), 1);
    assert_eq!((view.arrows[0].from, view.arrows[0].to), (Square::E2, Square::E4));
}

#[test]
fn advisory_answer_for_an_old_position_draws_nothing() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    m.handle_engine_line("bestmove e2e4").unwrap();
    let context = m.begin_advisory("hint?").unwrap();

    play(&mut m, Square::E2, Square::E4);
    let answer = AdvisoryReply {
        text: "Push the e-pawn.".to_owned(),
        backend: Some("primary".to_owned()),
    };
    assert!(m.finish_advisory(&context, &answer).arrows.is_empty());
}

#[test]
fn losing_the_engine_is_fatal() {
    let mut m = Match::new(MatchConfig::default(), Box::new(DeadEngine)).unwrap();
    assert!(matches!(
        m.start_game(Color::White),
        Err(MatchError::EngineUnavailable(EngineError::Disconnected))
    ));

    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    assert!(matches!(
        m.handle_engine_event(EngineEvent::Disconnected),
        Err(MatchError::EngineUnavailable(EngineError::Disconnected))
    ));
    assert!(matches!(
        m.set_rating(2000),
        Err(MatchError::EngineUnavailable(EngineError::Terminated))
    ));
}

#[test]
fn restarting_clears_the_previous_game() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    play(&mut m, Square::E2, Square::E4);

    let view = m.start_game(Color::Black).unwrap();
    assert!(view.history.is_empty());
    assert_eq!(view.human_side, Color::Black);
    assert_eq!(view.orientation, Orientation::Black);
    assert_eq!(view.status, GameStatus::InProgress);
    assert_eq!(view.win_probability, 0.5);
}

#[test]
fn dragging_to_the_last_rank_asks_for_a_piece() {
    let (mut m, _rx) = from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1");
    m.start_game(Color::White).unwrap();

    m.begin_drag(cell(&m, Square::A7)).unwrap();
    let view = m.drop_piece(cell(&m, Square::A8)).unwrap();
    assert_eq!(view.signal, None);
    assert_eq!(
        view.interaction,
        InteractionState::AwaitingPromotion {
            origin: Square::A7,
            destination: Square::A8
        }
    );
    assert!(view.history.is_empty());

    // Board input waits for the choice.
    let view = m.select_square(cell(&m, Square::H7)).unwrap();
    assert_eq!(view.signal, Some(Signal::Ignored));

    let view = m.choose_promotion(Role::Rook).unwrap();
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.history.plies()[0].promotion, Some(Role::Rook));
    assert_eq!(view.interaction, InteractionState::Idle);
}

#[test]
fn an_abandoned_drag_does_not_block_input() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    m.begin_drag(cell(&m, Square::E2)).unwrap();

    // The drop never arrived; a click picks another piece.
    let view = m.select_square(cell(&m, Square::G1)).unwrap();
    assert!(matches!(
        view.interaction,
        InteractionState::Selected { origin: Square::G1, .. }
    ));
    let view = m.select_square(cell(&m, Square::F3)).unwrap();
    assert_eq!(view.history.plies()[0].san.to_string(), "Nf3");
}

#[test]
fn a_new_drag_replaces_one_left_open() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    m.begin_drag(cell(&m, Square::E2)).unwrap();

    let view = m.begin_drag(cell(&m, Square::D2)).unwrap();
    assert!(matches!(
        view.interaction,
        InteractionState::Dragging { origin: Square::D2, .. }
    ));
    let view = m.drop_piece(cell(&m, Square::D4)).unwrap();
    assert_eq!(view.history.plies()[0].san.to_string(), "d4");
}

#[test]
fn a_refused_move_changes_nothing() {
    let (transport, _rx) = ChannelTransport::new();
    let mut m = Match::from_position(
        MatchConfig::default(),
        Box::new(transport),
        Stubborn::initial(),
    )
    .unwrap();
    m.start_game(Color::White).unwrap();

    let (e7, e5) = (m.grid_id(Square::E7), m.grid_id(Square::E5));
    m.add_user_arrow(e7, e5);
    m.select_square(m.grid_id(Square::E2)).unwrap();
    let before = m.view();

    let view = m.select_square(m.grid_id(Square::E4)).unwrap();
    assert_eq!(view.signal, Some(Signal::IllegalMove));
    assert!(view.history.is_empty());
    assert_eq!(view.interaction, before.interaction);
    assert_eq!(view.displayed, before.displayed);
    assert_eq!(view.arrows.len(), 1);
    assert_eq!(view.arrows[0].origin, ArrowOrigin::User);
    assert_eq!(view.status, GameStatus::InProgress);
}

#[test]
fn a_silent_engine_is_fatal_once_its_deadline_passes() {
    let (mut m, _rx) = new_match();
    assert_eq!(m.engine_deadline(), None);
    m.start_game(Color::Black).unwrap();

    let deadline = m.engine_deadline().unwrap();
    m.poll_engine(deadline).unwrap();
    assert!(matches!(
        m.poll_engine(deadline + Duration::from_millis(1)),
        Err(MatchError::EngineUnavailable(EngineError::Unresponsive(_)))
    ));
    assert_eq!(m.engine_deadline(), None);
    assert!(matches!(
        m.set_rating(2000),
        Err(MatchError::EngineUnavailable(EngineError::Terminated))
    ));
}

#[test]
fn an_answer_in_time_keeps_the_engine_alive() {
    let (mut m, _rx) = new_match();
    m.start_game(Color::White).unwrap();
    let deadline = m.engine_deadline().unwrap();
    assert!(deadline > Instant::now());

    let view = m.handle_engine_line("bestmove e2e4").unwrap();
    assert!(view.hint.is_some());
    assert_eq!(m.engine_deadline(), None);
    m.poll_engine(deadline + Duration::from_secs(60)).unwrap();
    m.set_rating(2000).unwrap();
}

#[test]
fn nonsense_config_is_refused_up_front() {
    let config = MatchConfig {
        default_rating: 9000,
        ..MatchConfig::default()
    };
    let (transport, _rx) = ChannelTransport::new();
    assert!(matches!(
        Match::new(config, Box::new(transport)),
        Err(ConfigError::Invalid(_))
    ));
}
