//! Core services for the resident self-service records portal.
//!
//! Four components, leaf-first: the append-only [`audit`] trail, the
//! [`auth`] credential bootstrap, the [`requests`] workflow engine with its
//! asynchronous issuance path, and the sessionless [`verify`] gateway behind
//! printed QR codes. Durable storage, the document renderer, and the payment
//! channel are external collaborators reached through traits.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod requests;
pub mod telemetry;
pub mod verify;
