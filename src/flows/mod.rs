//! Multi-step guided dialogs: their definitions, per-conversation state and
//! the storage writes they end with.

pub mod commit;
pub mod registry;
pub mod session;
pub mod state;

pub use commit::{commit, Committed};
pub use registry::{definition, Completion, FlowDefinition, Rule, Step};
pub use session::SessionStore;
pub use state::{ActiveFlow, AdminAction, Advance, FlowContext, FlowName, FlowState, FlowVariant};
