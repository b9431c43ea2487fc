#[cfg(feature = "server")]
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role};

use crate::{
    advisory::AdvisoryReply,
    coords::GridId,
    error::{AdvisoryError, MatchError},
    orchestrator::MatchView,
};

/// Start a new game.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest {
    /// The side the human plays. The board is oriented from this side.
    #[serde(with = "crate::chess_serde::color_serde")]
    pub side: Color,
}

/// A click, drag or drop on one board cell, given as its "row-col" id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRequest {
    pub cell: GridId,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionRequest {
    #[serde(with = "crate::chess_serde::role_serde")]
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpRequest {
    /// Index of the ply to show. Out-of-range values are clamped.
    pub index: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingRequest {
    pub rating: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrowRequest {
    pub from: GridId,
    pub to: GridId,
}

/// A question for the advisory chat.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdviceRequest {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AdviceResponse {
    pub reply: AdvisoryReply,

    /// The match after the reply was applied.
    pub view: MatchView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_text: String,
}

#[cfg(feature = "server")]
impl IntoResponse for MatchError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error_text: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(feature = "server")]
impl IntoResponse for AdvisoryError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AdvisoryError::Busy => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorBody {
                error_text: self.to_string(),
            }),
        )
            .into_response()
    }
}
