mod scheduler;
mod shutdown;

pub use scheduler::{Runtime, RuntimeError};
pub use shutdown::ShutdownGuard;
