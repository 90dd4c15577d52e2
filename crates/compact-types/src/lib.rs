//! # Compact Shared Types
//!
//! Primitive types shared across the allocator: 20-byte addresses with
//! EIP-55 checksum handling, 32-byte hashes, 65-byte recoverable
//! signatures, and 256-bit unsigned integers with the wire encodings the
//! protocol uses (fixed-width hexadecimal for identifiers, decimal strings
//! for amounts).
//!
//! ## Wire conventions
//!
//! | Value | Encoding |
//! |-------|----------|
//! | Address | EIP-55 checksummed `0x` + 40 nibbles |
//! | Hash / id / nonce | `0x` + 64 lower-case nibbles |
//! | Amount / timestamp | ASCII decimal string |
//! | Signature | `0x` + 130 lower-case nibbles |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod hashing;
pub mod signature;
pub mod uint;

pub use address::{Address, AddressError};
pub use hashing::{keccak256, Hash32};
pub use signature::Signature;
pub use uint::U256;
