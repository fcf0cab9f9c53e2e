pub mod compute;
pub mod fulltest;
pub mod quicktest;
pub mod suite;

pub use compute::*;
pub use fulltest::*;
pub use quicktest::*;
pub use suite::*;
