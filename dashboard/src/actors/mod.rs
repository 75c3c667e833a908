pub mod call_orchestrator;
pub mod family;

pub use call_orchestrator::{CallOrchestratorActor, CallOrchestratorMsg};
pub use family::{FamilyActor, FamilyMsg};
