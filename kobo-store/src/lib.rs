mod engine;
mod error;
mod outbox;
mod store;
mod uow;

pub use engine::*;
pub use error::*;
pub use outbox::*;
pub use store::*;
pub use uow::*;
