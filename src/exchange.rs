//! Exchange lifecycle
//!
//! The [`ExchangeCoordinator`] owns everything one conversation needs:
//! history, session context, the staged attachment, the stream accumulator
//! and the progress merger. A [`CancelHandle`] cloned from it can abort the
//! in-flight exchange from another task.

mod cancel;
mod coordinator;
mod history;
mod session;


pub use cancel::CancelHandle;
pub use coordinator::{
    ExchangeCoordinator, ExchangeOutcome, Rejected, CANCELLED_NOTICE, DEFAULT_TIMEOUT,
};
pub use history::{History, Role};
pub use session::resolve_workspace;
