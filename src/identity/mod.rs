//! Identity resolution for federation handles
//!
//! A handle is either a bare username (`alice`, local to the instance that
//! reported it) or a qualified one (`alice@other.example`). This module
//! splits handles into `(username, instance)` pairs and, for accounts hosted
//! elsewhere, asks the hosting instance for its local numeric identifier.

mod handle;
mod lookup;

pub use handle::resolve;
pub use lookup::{AccountLookup, HttpAccountLookup, LookupError, LookupResult};
