//! Read-only player snapshot shared by every rule evaluating one signal.

use std::sync::Arc;

use crate::Timestamp;
use crate::state::ChurnState;

/// Snapshot bundling the player's persistent state with cheap derived facts.
///
/// Built once per pipeline run by the signal processor. Rules read it; nothing
/// writes to it.
#[derive(Clone, Debug)]
pub struct PlayerContext {
    pub user_id: String,
    pub namespace: String,
    /// Clan membership reported by the inbound event, if any.
    pub clan_id: Option<String>,
    pub state: Arc<ChurnState>,
    pub session_info: SessionInfo,
}

impl PlayerContext {
    /// Build a context, deriving [`SessionInfo`] from `state` as of `now`.
    pub fn new(
        user_id: impl Into<String>,
        namespace: impl Into<String>,
        clan_id: Option<String>,
        state: ChurnState,
        now: Timestamp,
    ) -> Self {
        let session_info = SessionInfo::derive(&state, now);
        Self {
            user_id: user_id.into(),
            namespace: namespace.into(),
            clan_id: clan_id.filter(|id| !id.is_empty()),
            state: Arc::new(state),
            session_info,
        }
    }

    pub fn in_clan(&self) -> bool {
        self.clan_id.is_some()
    }
}

/// Facts derived from [`ChurnState`] at load time so rules avoid recomputing them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub this_week: u32,
    pub last_week: u32,
    pub on_cooldown: bool,
    pub has_active_challenge: bool,
}

impl SessionInfo {
    pub fn derive(state: &ChurnState, now: Timestamp) -> Self {
        Self {
            this_week: state.sessions.this_week,
            last_week: state.sessions.last_week,
            on_cooldown: state.cooldown.is_active(now),
            has_active_challenge: state.active_challenge(now).is_some(),
        }
    }
}
