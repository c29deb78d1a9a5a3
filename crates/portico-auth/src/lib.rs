//! Session credentials and bearer token checks for Portico.
//!
//! # Components
//!
//! - [`credentials`] - access/refresh token storage behind an injectable trait
//! - [`jwt`] - structural and expiry checks for JWT bearer tokens (no signature verification)
//! - [`clock`] - wall-clock abstraction used by expiry checks

pub mod clock;
pub mod credentials;
pub mod error;
pub mod jwt;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock, system_clock};
pub use credentials::{
    CookieCredentialStore, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    SharedCredentialStore, TokenKind, create_file_store, create_memory_store,
};
pub use error::{AuthError, Result, TokenError};
pub use jwt::{Claims, inspect_jwt, is_valid_jwt, is_valid_jwt_at};
