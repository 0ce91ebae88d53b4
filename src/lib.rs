#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

extern crate alloc;

pub mod checksum;
pub mod client;
pub(crate) mod commands;
pub mod config;
#[cfg(feature = "examples")]
pub mod example;
pub mod provision;
pub(crate) mod responses;
pub mod status;
pub mod transport;
pub mod wifi;

#[cfg(test)]
mod tests;
