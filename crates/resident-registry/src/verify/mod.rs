//! QR-based public identity verification: token issuance and the
//! sessionless, throttled lookup path.

pub mod domain;
pub mod router;
pub mod service;
pub mod throttle;

pub use domain::{PublicProfile, VerificationToken, RECENT_DOCUMENT_LIMIT};
pub use router::verify_router;
pub use service::{MemoryTokenStore, TokenStore, TokenStoreError, VerificationGateway, VerifyError};
pub use throttle::LookupThrottle;
