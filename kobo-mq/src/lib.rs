mod dispatcher;
mod error;
mod relay;

pub use dispatcher::*;
pub use error::*;
pub use relay::*;
