//! A provider-neutral protocol between the agent loop and hosted models.
//!
//! The agent speaks in terms of the types defined here: a request is the
//! full conversation plus the tools the model may call, and a response is
//! a stream of events (text deltas, tool calls, completion). Concrete
//! providers translate these types to and from their own wire formats.
//!
//! Types in this crate don't define any behavior, they are the contract
//! that provider implementations adhere to.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
