//! Claims carried by the bearer tokens passengers and drivers present.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
}

/// `sub` is the passenger or driver id, `role` says which.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ActorClaims {
    pub(crate) sub: String,
    pub(crate) role: Role,
    pub(crate) exp: usize,
}
