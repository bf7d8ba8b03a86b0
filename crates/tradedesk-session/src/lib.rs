//! Session identity for the tradedesk watchlist.
//!
//! Resolves who the watchlist belongs to (backend user, guest, or nobody)
//! and drives the store's connection and load lifecycle as that changes.

pub mod auth;
pub mod binding;
pub mod error;
pub mod marker;

pub use auth::{AuthProvider, RestAuthProvider, StaticAuthProvider};
pub use binding::{AuthEvent, SessionBinding, SessionState};
pub use error::{SessionError, SessionResult};
pub use marker::{FileGuestMarker, GuestMarker, MemoryGuestMarker};
