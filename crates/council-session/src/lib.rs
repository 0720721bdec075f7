pub mod machine;
pub mod render;

pub use machine::{Phase, SessionMachine, SubmitError, Submission};
pub use render::RenderOp;
