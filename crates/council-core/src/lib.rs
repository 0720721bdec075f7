pub mod catalog;
pub mod event;
pub mod health;
pub mod palette;
pub mod score;

pub use catalog::{AgentSeat, CouncilCatalog, CouncilInfo, SessionDefaults, Strategy};
pub use event::{CouncilEvent, EventError, EventMetadata, GenerationSettings, TaskMessage};
pub use health::{HealthSnapshot, LmStudioHealth, SystemMetrics, TelemetryState};
pub use palette::{PaletteMap, PaletteSlot, MODERATOR_ROLE, PALETTE_SIZE};
pub use score::{rank, score, RankedAgent, RubricWeights, ScoreCard, ScoreRecord};
