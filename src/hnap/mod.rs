//! HNAP: the JSON challenge-response protocol spoken by some modems.
//!
//! - `constants`: endpoint, headers, namespace, envelope keys
//! - `builder`: envelopes, HMAC key derivation, handshake, batched reads
//! - `delimited`: `|+|` / `^` list fields

mod builder;
pub mod constants;
pub mod delimited;

pub use builder::{
    Challenge, HnapBatchResponse, HnapBuilder, HnapKeys, HnapLogin, LoginCode,
    derive_login_password, derive_private_key, hmac_hex, timestamp_now,
};

#[cfg(test)]
pub(crate) use builder::fixtures;
