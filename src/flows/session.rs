use std::time::Duration;

use dashmap::DashMap;

use super::state::FlowState;
use crate::telegram::transport::ConversationId;

/// In-memory `conversation -> FlowState` map.
///
/// Flows untouched for longer than the idle timeout read as [`FlowState::Idle`]
/// and are dropped on that read.
#[derive(Debug, Default)]
pub struct SessionStore {
    states: DashMap<ConversationId, FlowState>,
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            states: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn get(&self, conversation: ConversationId) -> FlowState {
        let expired = match self.states.get(&conversation) {
            None => return FlowState::Idle,
            Some(entry) => match (entry.value(), self.idle_timeout) {
                (FlowState::InFlow(flow), Some(timeout)) if flow.touched_at.elapsed() > timeout => true,
                (state, _) => return state.clone(),
            },
        };

        if expired {
            log::debug!("Flow of conversation {} expired", conversation);
            self.states.remove(&conversation);
        }
        FlowState::Idle
    }

    pub fn set(&self, conversation: ConversationId, state: FlowState) {
        match state {
            FlowState::Idle => {
                self.states.remove(&conversation);
            }
            state => {
                self.states.insert(conversation, state);
            }
        }
    }

    pub fn clear(&self, conversation: ConversationId) {
        self.states.remove(&conversation);
    }

    /// Number of conversations currently inside a flow.
    pub fn active_count(&self) -> usize {
        self.states.len()
    }
}
