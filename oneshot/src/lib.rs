//! Delegate coding tasks to an external agent, one git worktree per task.
//!
//! The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure logic (task model, branch naming, stage classification,
//!   PR URL extraction). No I/O.
//! - **[`io`]**: Side-effecting adapters (task store, settings, `git`/`gh`,
//!   the agent subprocess). Each external tool sits behind a trait so tests
//!   can substitute scripted doubles.
//! - **[`orchestrator`]**: Sequences the task lifecycle over the adapters and
//!   reports progress as a stream of events.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
