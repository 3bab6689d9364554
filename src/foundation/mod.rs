pub(crate) mod cancel;
pub mod error;
pub(crate) mod math;
