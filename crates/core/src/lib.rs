//! Control core of an autonomous avatar: a file mailbox feeding a bounded
//! command executor, survival reflexes arbitrated by a single token, a
//! hot-reloaded tool registry, and file-based status and journals.

pub mod capability;
pub mod config;
pub mod executor;
pub mod io;
pub mod reflex;
pub mod report;
pub mod runtime;
pub mod types;
