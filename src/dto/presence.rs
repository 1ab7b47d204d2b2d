use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query identifying the connecting client on the presence socket.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PresenceQuery {
    /// Stable per-client key (wallet address or anonymous id). Tabs sharing a key count once.
    pub key: String,
}

/// Count of distinct online clients.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PresenceUpdate {
    /// Distinct clients currently connected.
    pub online: usize,
}
