pub mod backoff;
pub(crate) mod deadline;

pub use backoff::{Backoff, PollBackoff};
