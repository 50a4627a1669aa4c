//! # System Interaction Layer
//!
//! This module is the boundary between the orchestration logic and the
//! operating system's process management.
//!
//! ## Modules
//!
//! - **`executor`**: the `ProcessRunner` seam and its shell-backed implementation.
//!   It runs one command at a time to completion, echoes the command line and
//!   live stdout on request, and captures stdout for later parsing.

pub mod executor;
