//! # campus-id
//!
//! Typed identifiers for CampusConnect records.
//!
//! Every ID is a prefixed ULID, `{prefix}_{ulid}`:
//!
//! - `usr_01HV4Z2WQXKJNM8GPQY6VBKC3D` (user)
//! - `evt_01HV4Z3MXNKPQR9HSTZ7WCLD4E` (event)
//! - `reg_01HV4Z4NYPLTRS0JTUA8XDME5F` (registration)
//!
//! The prefix keeps a user id from ever being accepted where an event id is
//! expected, and the ULID keeps ids sortable by creation time.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
