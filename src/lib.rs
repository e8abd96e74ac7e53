//! # rclisim - Network Device Shell Simulator
//!
//! `rclisim` simulates the management shell of a router. It accepts
//! line-oriented commands, checks them against the grammar of the current
//! privilege mode and mutates a small in-memory device configuration
//! (hostname, interface address, netmask, current mode).
//!
//! ## Features
//!
//! - **Mode State Machine**: user, privileged and configuration modes with IOS-style prompts
//! - **Abbreviated Keywords**: `en`, `conf t`, `sh ip` and friends down to the shortest unambiguous prefix
//! - **Recoverable Errors**: bad input is reported on the terminal and never ends the session
//! - **Transcripts**: record sessions as JSONL and replay them against a fresh device
//! - **Grammar Diagnostics**: detect overlapping rules and unreachable modes
//!
//! ## Quick Start
//!
//! ```rust
//! use rclisim::dispatcher::CommandDispatcher;
//! use rclisim::device::Mode;
//!
//! let mut dispatcher = CommandDispatcher::new(Vec::new());
//! assert!(dispatcher.process_line("enable"));
//! assert!(dispatcher.process_line("conf t"));
//! assert!(dispatcher.process_line("ip address 10.0.0.1 255.255.255.0"));
//! assert!(dispatcher.process_line("exit"));
//! assert!(dispatcher.process_line("show ip"));
//!
//! assert_eq!(dispatcher.state().mode(), Mode::Enable);
//! assert_eq!(
//!     String::from_utf8_lossy(dispatcher.sink()),
//!     "IP Address: 10.0.0.1\nSubnet: 255.255.255.0\n"
//! );
//! ```
//!
//! ## Main Components
//!
//! - [`dispatcher::CommandDispatcher`] - Matches lines against the active grammar and runs actions
//! - [`device::DeviceState`] - Device configuration and mode transitions
//! - [`grammar`] - Per-mode rule tables and abbreviation matching
//! - [`session::Shell`] - Prompt/read/dispatch loop over any line source
//! - [`error::CliError`] - Error types, whose messages are what the terminal prints

pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod grammar;
pub mod session;
