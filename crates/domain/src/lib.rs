pub mod assignments;
pub mod auth;
pub mod drafting_centers;
pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod notifications;
pub mod pagination;
pub mod ports;
pub mod sequencer;
pub mod sketch_requests;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
