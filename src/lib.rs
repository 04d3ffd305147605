//! # Sporehub (Request Admission & One-Time Codes)
//!
//! `sporehub` fronts the Smart Spore Hub API. Every request passes through a
//! per-client admission gate before anything else runs, and protected routes
//! additionally require a signed bearer token carrying the caller's role.
//!
//! ## Admission
//!
//! Clients are keyed by the first `X-Forwarded-For` hop, then `X-Real-IP`, then
//! the peer address. Each client gets a fixed one-minute window; once the count
//! reaches the configured limit the request is refused with `429` until the
//! window rolls over. A limit of `0` disables the gate.
//!
//! ## Access
//!
//! Protected routes run, in order: admission, `Authorization: Bearer` parsing,
//! HS256 token verification, role check. The verified identity is attached to
//! the request and read back by handlers through `AuthContext` or `Identity`.
//!
//! ## One-Time Codes
//!
//! Six-digit codes are issued per `(email, purpose)` pair. A new code supersedes
//! the previous one, codes are consumed on first successful verification, and
//! wrong guesses count against a per-code attempt cap. Codes live in process
//! memory only.
//!
//! ## Responses
//!
//! Successful responses use `{ success, message, data }`; failures use
//! `{ error, message, code }` where `code` echoes the HTTP status.

pub mod admission;
pub mod api;
pub mod cli;
pub mod delivery;
pub mod directory;
pub mod guard;
pub mod otp;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
