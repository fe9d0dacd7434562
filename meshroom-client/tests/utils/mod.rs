pub mod harness;

pub use harness::*;
pub use scripted_transport::*;
