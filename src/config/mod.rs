//! Configuration shared by the hub and the agent
//!
//! Runtime settings live next to the component that owns them
//! (`hub::config::HubConfig`, `agent::config::AgentConfig`); this module
//! only centralises the system-wide default constants.

pub mod defaults;
