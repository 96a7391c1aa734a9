//! Sales agent models

use serde::{Deserialize, Serialize};

use crate::types::AgentId;

/// A sales agent (attendant) who holds stock and records sales
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

/// Input for registering an agent in the directory
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgentInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}
