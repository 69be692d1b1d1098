//! Types and wrappers for the cradle sandbox host ABI.
//!
//! A cradle host is addressed through a small set of numbered calls (see
//! [`call::HostCall`]). This crate defines those numbers, the raw dispatch
//! trait a host implements, typed wrappers over the thread-creation calls,
//! and the thread-local storage block layout shared between the runtime and
//! the host.

pub mod call;
pub mod thread;
pub mod tls;

pub use call::{convert_codes_to_result, HostCall, RawHost};
pub use thread::*;
pub use tls::*;
