pub mod arming;
pub mod customer;
pub mod device;
pub mod emergency;
pub mod operator;

pub use arming::*;
pub use customer::*;
pub use device::*;
pub use emergency::*;
pub use operator::*;
