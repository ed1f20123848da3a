/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Glitch countermeasure library: jitter source, value laundering,
    sentinel cells and the layered verification primitive.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod jitter;
mod sentinel;
mod verifier;
mod xoshiro;

pub use jitter::{JitterSource, JITTER_MAX_UNITS, JITTER_MIN_UNITS};
pub use sentinel::{launder, SentinelCell, SENTINEL_UNSET};
pub use verifier::{LayeredOutcome, LayeredVerifier, MAX_LAYERED_FACTS};
pub use xoshiro::Xoshiro128;
