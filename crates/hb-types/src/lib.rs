pub mod evaluation;
pub mod schedule;
pub mod errors;

pub use evaluation::*;
pub use schedule::*;
pub use errors::*;
