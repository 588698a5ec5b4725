//! Redis messaging.

pub mod bus;

pub use bus::RedisBus;
