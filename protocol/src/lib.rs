//! Level files and player progress for cascada.

pub use catalog::*;
pub use error::*;
pub use progress::*;
pub use store::*;

mod catalog;
mod error;
mod progress;
mod store;
