//! Safety Gate and the process-wide mode it enforces.

pub mod gate;
pub mod mode;

pub use gate::*;
pub use mode::*;
