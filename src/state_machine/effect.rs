//! Effects produced by state transitions

use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// (Re)start the response-wait timer, replacing any outstanding one
    ArmWaitTimer { generation: u64, timeout: Duration },

    CancelWaitTimer,

    /// Post an utterance to the dialogue backend
    RequestBackend { endpoint: String, text: String },

    /// Start a handoff task for `endpoint`
    OpenHandoff { generation: u64, endpoint: String },

    /// Close the running handoff connection, if any
    CloseHandoff,

    StopDisplayTicker,

    /// Push the current session view to observers
    PublishView,
}
