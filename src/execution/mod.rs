// Order execution module
// Position state machine, lifecycle ownership and broker adapters.
pub mod broker;
pub mod lifecycle;
pub mod paper;
pub mod position;
pub mod symbol_locks;

pub use broker::{ExecutionClient, HttpExecutionClient};
pub use lifecycle::{LifecycleConfig, PositionLifecycleManager, PositionProposal};
pub use paper::PaperBroker;
pub use position::{CloseReason, PendingConfirmation, Position, PositionState};
pub use symbol_locks::SymbolLocks;
