//! Shared types for the Hyperlane7683 intent solver.

pub mod allow_list;
pub mod chains;
pub mod events;
pub mod listener;
pub mod order;
pub mod retry;
pub mod validation;

pub use allow_list::*;
pub use chains::*;
pub use events::*;
pub use listener::*;
pub use order::*;
pub use retry::{retry, RetryPolicy};
pub use validation::*;
