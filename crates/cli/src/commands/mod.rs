//! Command implementations.

mod emit;
mod info;
mod validate;

pub use emit::run_emit;
pub use info::run_info;
pub use validate::run_validate;
