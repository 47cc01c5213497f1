use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod assignments;
pub mod drafting_centers;
pub mod health;
pub mod hierarchy;
pub mod notifications;
pub mod sequence;
pub mod sketch_requests;
