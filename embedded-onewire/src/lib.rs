#![no_std]
#![deny(missing_docs)]
//! # embedded-onewire
//! A no-std implementation of the 1-Wire protocol.
//!
//! The [OneWire] trait defines the slot-level operations of a 1-Wire master (reset/presence,
//! bit and byte transfers) and builds the ROM-level commands on top of them.
//! [BitBangOneWire] implements the trait by driving a single open-drain GPIO with
//! microsecond delays, so any `embedded-hal` 1.0 target can act as a bus master.
//!
//! Devices are discovered with [OneWireSearch], the restartable binary-tree walk over the
//! 64-bit ROM space, and every ROM or scratchpad is checked with [OneWireCrc].

mod bitbang;
mod consts;
mod error;
mod rom;
mod search;
mod traits;
mod utils;

pub use bitbang::{BitBangOneWire, BitBangTiming};
pub use consts::*;
pub use error::OneWireError;
pub use rom::Rom;
pub use search::{OneWireSearch, OneWireSearchKind};
pub use traits::OneWire;
pub use utils::OneWireCrc;

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
