pub mod advisory;
pub mod chess_serde;
pub mod config;
pub mod coords;
pub mod engine_session;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod interaction;
pub mod orchestrator;
pub mod overlay;
pub mod rules;
#[cfg(feature = "server")]
pub mod server;
pub mod server_types;
pub mod transport;
pub mod uci;

use async_trait::async_trait;

pub use advisory::{AdvisoryChat, AdvisoryContext, AdvisoryHint, AdvisoryReply};
pub use config::MatchConfig;
pub use coords::{GridId, Orientation};
pub use error::{AdvisoryError, EngineError, MatchError, MatchResult};
pub use orchestrator::{GameStatus, Match, MatchView, Signal};
pub use rules::{RulesEngine, StandardRules};
pub use transport::{ChannelTransport, EngineTransport, UciProcess};

pub use shakmaty;

/// A text-generation service that answers a player's question about the position.
///
/// The match never talks to a backend directly. It composes an [`AdvisoryContext`] that
/// holds everything the backend needs (position, evaluation, the player's side, the
/// engine's hint and what the player typed), and an [`AdvisoryChat`] turns that into a
/// prompt and tries its backends in order:
///
/// 1. The first backend is asked.
/// 2. If it fails, the failure is logged and the next backend is asked.
/// 3. The first answer wins. If every backend fails, the chat answers with its
///    fallback text instead of an error.
///
/// ## Concurrency
/// A request may take a while. The match stays usable in the meantime: moves can be
/// played and engine output keeps flowing. Only one request per chat may be in flight;
/// a second one is refused with [`AdvisoryError::Busy`].
///
/// Answers are expected to be short plain text. No other format is imposed.
#[async_trait]
pub trait AdvisoryBackend: Send + Sync {
    /// A stable identifier, used in logs and in [`AdvisoryReply::backend`].
    fn name(&self) -> &str;

    /// Produces an answer for `prompt`.
    ///
    /// An error only moves the chat on to the next backend; it is never shown to the player.
    async fn complete(&self, prompt: &str) -> Result<String, AdvisoryError>;
}
