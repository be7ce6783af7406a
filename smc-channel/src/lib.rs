//! A request/response layer for the Apple System Management Controller (SMC).
//!
//! Every operation is one exchange of a fixed 80-byte [`structs::SMCParamBlock`]
//! with the controller's kernel user-client: open a [`channel::SmcChannel`],
//! issue writes (or reads, built on the same call), then close it.
//!
//! Two independent statuses come back from each exchange. A transport failure
//! is returned as [`error::SmcError::Transport`]; the controller's own verdict
//! is left in [`channel::SmcResponse::result`] for the caller to inspect.
//!
//! The IOKit transport is only available on macOS. [`sim::SimulatedSmc`]
//! stands in for the controller everywhere else.
//!

#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod channel;
pub mod config;
pub mod error;
pub mod fourcc;
#[cfg(target_os = "macos")]
pub mod iokit;
pub mod sim;
pub mod status;
pub mod structs;
pub mod transport;
