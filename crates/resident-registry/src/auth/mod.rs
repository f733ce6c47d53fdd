//! Credential bootstrap: birthdate-verified first login, one-time promotion
//! to password auth, and opaque session handling.

pub mod domain;
pub mod password;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;

pub use domain::{
    login_mode, Credential, LoginMode, ResidentAccount, ResidentId, ResidentProfile, StaffId,
};
pub use repository::{AccountDirectory, DirectoryError, MemoryAccountDirectory};
pub use router::auth_router;
pub use service::{AuthError, CredentialBootstrap, LoginSuccess, MIN_PASSWORD_LEN};
pub use session::{Session, SessionStore, SessionToken};
