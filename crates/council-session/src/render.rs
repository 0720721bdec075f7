use council_core::{PaletteSlot, RankedAgent, Strategy};
use std::time::Duration;

/// One render instruction. The state machine appends these to the
/// conversation stream in event order; what a renderer does with them is its
/// own business. Nothing here blocks or prompts.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    /// Free-text progress line.
    StatusLine { text: String },
    /// Separator announcing a round.
    RoundMarker {
        round: u32,
        total_rounds: Option<u32>,
    },
    /// One agent's finalized contribution for a round.
    AgentCard {
        agent: String,
        slot: PaletteSlot,
        round: u32,
        content: String,
        model: Option<String>,
    },
    /// The moderator's synthesis. Reserved identity, never ranked.
    ModeratorCard {
        content: String,
        model: Option<String>,
    },
    /// A failure surfaced inline in the stream.
    ErrorLine { message: String },
    /// A task was accepted and the session is now running.
    SessionStarted {
        council: String,
        name: String,
        strategy: Strategy,
    },
    /// The session reached its terminal event.
    SessionEnded { elapsed: Duration },
    /// Current ranking over the session's cached scores.
    Leaderboard { entries: Vec<RankedAgent> },
}
