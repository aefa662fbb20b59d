//! Side-effecting adapters: filesystem, subprocesses, git and the agent.

pub mod agent;
pub mod config;
pub mod git;
pub mod paths;
pub mod process;
pub mod store;
