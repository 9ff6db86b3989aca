mod body;
mod sse;

pub use body::{Body, BodyError};
pub use sse::Sse;
