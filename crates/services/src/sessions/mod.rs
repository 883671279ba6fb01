mod events;
mod handle;
mod runner;

// Public API of the session subsystem.
pub use events::{SessionEvent, SessionEvents};
pub use handle::SessionHandle;
pub use runner::{DEFAULT_TICK_PERIOD, SessionRunner};
