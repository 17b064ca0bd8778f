pub mod identity;
pub mod matches;
pub mod region;

pub use identity::*;
pub use matches::*;
pub use region::*;
