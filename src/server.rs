use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tokio::{
    sync::{mpsc::UnboundedReceiver, Mutex},
    time::{self, Instant},
};
use tracing::{error, info};

use crate::{
    advisory::AdvisoryChat,
    error::{AdvisoryError, MatchResult},
    orchestrator::{Match, MatchView},
    server_types::{
        AdviceRequest, AdviceResponse, ArrowRequest, CellRequest, JumpRequest, PromotionRequest,
        RatingRequest, StartRequest,
    },
    uci::EngineEvent,
};

#[derive(Clone)]
pub struct AppState {
    pub game: Arc<Mutex<Match>>,
    pub chat: Arc<AdvisoryChat>,
}

/// Serves one match over HTTP. Engine output from `events` is applied in the background.
pub async fn serve_match(
    game: Match,
    events: UnboundedReceiver<EngineEvent>,
    chat: AdvisoryChat,
) -> Router {
    let state = AppState {
        game: Arc::new(Mutex::new(game)),
        chat: Arc::new(chat),
    };
    tokio::spawn(pump_engine_events(state.game.clone(), events));

    Router::new()
        .route("/", get(get_view))
        .route("/start", post(start))
        .route("/select", post(select))
        .route("/drag", post(drag))
        .route("/drop", post(drop_piece))
        .route("/promote", post(promote))
        .route("/history/back", post(history_back))
        .route("/history/forward", post(history_forward))
        .route("/history/jump", post(history_jump))
        .route("/rating", post(rating))
        .route("/arrow", post(arrow))
        .route("/flip", post(flip))
        .route("/resign", post(resign))
        .route("/reset", post(reset))
        .route("/advice", post(advice))
        .with_state(state)
}

const DEADLINE_POLL: Duration = Duration::from_millis(250);

async fn pump_engine_events(game: Arc<Mutex<Match>>, mut events: UnboundedReceiver<EngineEvent>) {
    let mut ticks = time::interval(DEADLINE_POLL);
    loop {
        let outcome = tokio::select! {
            event = events.recv() => match event {
                Some(event) => game.lock().await.handle_engine_event(event).map(drop),
                None => break,
            },
            _ = ticks.tick() => game.lock().await.poll_engine(Instant::now()),
        };
        if let Err(why) = outcome {
            error!(error = %why, "engine session ended");
            return;
        }
    }
    info!("engine event stream closed");
}

async fn get_view(State(app): State<AppState>) -> Json<MatchView> {
    Json(app.game.lock().await.view())
}

async fn start(
    State(app): State<AppState>,
    Json(request): Json<StartRequest>,
) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.start_game(request.side)?))
}

async fn select(
    State(app): State<AppState>,
    Json(request): Json<CellRequest>,
) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.select_square(request.cell)?))
}

async fn drag(
    State(app): State<AppState>,
    Json(request): Json<CellRequest>,
) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.begin_drag(request.cell)?))
}

async fn drop_piece(
    State(app): State<AppState>,
    Json(request): Json<CellRequest>,
) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.drop_piece(request.cell)?))
}

async fn promote(
    State(app): State<AppState>,
    Json(request): Json<PromotionRequest>,
) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.choose_promotion(request.role)?))
}

async fn history_back(State(app): State<AppState>) -> Json<MatchView> {
    Json(app.game.lock().await.step_history_back())
}

async fn history_forward(State(app): State<AppState>) -> Json<MatchView> {
    Json(app.game.lock().await.step_history_forward())
}

async fn history_jump(
    State(app): State<AppState>,
    Json(request): Json<JumpRequest>,
) -> Json<MatchView> {
    Json(app.game.lock().await.jump_to(request.index))
}

async fn rating(
    State(app): State<AppState>,
    Json(request): Json<RatingRequest>,
) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.set_rating(request.rating)?))
}

async fn arrow(State(app): State<AppState>, Json(request): Json<ArrowRequest>) -> Json<MatchView> {
    Json(app.game.lock().await.add_user_arrow(request.from, request.to))
}

async fn flip(State(app): State<AppState>) -> Json<MatchView> {
    Json(app.game.lock().await.flip_board())
}

async fn resign(State(app): State<AppState>) -> Json<MatchView> {
    Json(app.game.lock().await.resign())
}

async fn reset(State(app): State<AppState>) -> MatchResult<Json<MatchView>> {
    Ok(Json(app.game.lock().await.reset()?))
}

async fn advice(
    State(app): State<AppState>,
    Json(request): Json<AdviceRequest>,
) -> Result<Json<AdviceResponse>, AdvisoryError> {
    // The slot is claimed first so a refused request leaves the arrows alone.
    let permit = app.chat.reserve()?;
    let context = app.game.lock().await.begin_advisory(&request.text)?;

    // The match stays unlocked while the backends think.
    let reply = permit.ask(&context).await;

    let view = app.game.lock().await.finish_advisory(&context, &reply);
    Ok(Json(AdviceResponse { reply, view }))
}
