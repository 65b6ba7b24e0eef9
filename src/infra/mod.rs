//! Infrastructure primitives shared across orchestrators.

pub mod channel;

pub use channel::BoundedChannel;
