//! Browser process and protocol plumbing
//!
//! Launching/killing the OS process and talking to its debugging endpoint are
//! deliberately separate: the process manager only knows about pids, ports
//! and directories, the connection only about the multiplexed channel.

pub(crate) mod connection;
mod hooks;
mod launch;
mod window;

pub use connection::DebugConnection;
pub use hooks::TerminationHooks;
pub use launch::{BrowserProcess, find_browser_executable};
pub use window::{can_hide_window, hide_window};
