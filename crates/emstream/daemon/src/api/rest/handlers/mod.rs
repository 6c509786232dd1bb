//! API request handlers

mod alerts;
mod health;
mod stream;
mod ws;

pub use alerts::*;
pub use health::*;
pub use stream::*;
pub use ws::*;
