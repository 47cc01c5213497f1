mod surreal;

pub mod assignment;
pub mod drafting_center;
pub mod hierarchy;
pub mod sequence;
pub mod sketch_request;

pub use assignment::*;
pub use drafting_center::*;
pub use hierarchy::*;
pub use sequence::*;
pub use sketch_request::*;
