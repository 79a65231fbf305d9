pub mod hash;
pub mod sig;

pub use hash::*;
pub use sig::*;
