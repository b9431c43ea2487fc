use serde::{Deserialize, Serialize};
use shakmaty::{Color, Square};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
    error::AdvisoryError, evaluation::EvaluationSample, rules::Snapshot, AdvisoryBackend,
};

/// The engine's current suggestion for the human, taken from the last analysis search.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvisoryHint {
    #[serde(with = "crate::chess_serde::square_serde")]
    pub from: Square,
    #[serde(with = "crate::chess_serde::square_serde")]
    pub to: Square,
}

/// Everything an advisory request is about, captured when the user asked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryContext {
    pub snapshot: Snapshot,
    pub evaluation: EvaluationSample,
    #[serde(with = "crate::chess_serde::color_serde")]
    pub side: Color,
    pub hint: Option<AdvisoryHint>,
    pub user_text: String,
}

impl AdvisoryContext {
    /// The single prompt string sent to a backend.
    pub fn prompt(&self) -> String {
        let side = match self.side {
            Color::White => "White",
            Color::Black => "Black",
        };
        let hint = match self.hint {
            Some(hint) => format!("{} to {}", hint.from, hint.to),
            None => "none yet".to_owned(),
        };
        format!(
            "Act as a Chess Teacher. FEN: {}. Eval: {}. Player: {}. Best Move: {}. User: \"{}\". \
             Keep it very short (2 sentences max). No markdown.",
            self.snapshot,
            self.evaluation.describe(),
            side,
            hint,
            self.user_text
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryReply {
    pub text: String,
    /// The backend that answered; `None` when every backend failed.
    pub backend: Option<String>,
}

impl AdvisoryReply {
    pub fn is_fallback(&self) -> bool {
        self.backend.is_none()
    }
}

/// Asks a list of backends in order until one answers.
pub struct AdvisoryChat {
    backends: Vec<Box<dyn AdvisoryBackend>>,
    fallback: String,
    in_flight: Mutex<()>,
}

/// Proof that this session has no other advisory request running.
pub struct AdvisoryPermit<'a> {
    chat: &'a AdvisoryChat,
    _guard: MutexGuard<'a, ()>,
}

impl AdvisoryChat {
    pub fn new(fallback: impl Into<String>) -> Self {
        AdvisoryChat {
            backends: Vec::new(),
            fallback: fallback.into(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_backend(mut self, backend: impl AdvisoryBackend + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    /// Claims the single request slot, or fails with [`AdvisoryError::Busy`].
    pub fn reserve(&self) -> Result<AdvisoryPermit<'_>, AdvisoryError> {
        let guard = self.in_flight.try_lock().map_err(|_| AdvisoryError::Busy)?;
        Ok(AdvisoryPermit {
            chat: self,
            _guard: guard,
        })
    }

    /// Reserves and asks in one go.
    pub async fn ask(&self, context: &AdvisoryContext) -> Result<AdvisoryReply, AdvisoryError> {
        Ok(self.reserve()?.ask(context).await)
    }
}

impl AdvisoryPermit<'_> {
    pub async fn ask(self, context: &AdvisoryContext) -> AdvisoryReply {
        let prompt = context.prompt();
        for backend in &self.chat.backends {
            match backend.complete(&prompt).await {
                Ok(text) => {
                    debug!(backend = backend.name(), "advisory answered");
                    return AdvisoryReply {
                        text: text.trim().to_owned(),
                        backend: Some(backend.name().to_owned()),
                    };
                }
                Err(why) => warn!(backend = backend.name(), error = %why, "advisory backend failed"),
            }
        }
        AdvisoryReply {
            text: self.chat.fallback.clone(),
            backend: None,
        }
    }
}
