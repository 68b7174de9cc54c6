//! Cortex - personal AI orchestration
//!
//! Assembles the model router, agent coordinator and consciousness engine
//! from one config file. The `cortex` binary is a thin CLI over [`Cortex`].

pub mod bootstrap;

pub use bootstrap::{default_home, expand_tilde, Cortex, MEMORIES_DIR, SESSIONS_DIR};
