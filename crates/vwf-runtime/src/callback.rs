//! Callback rendezvous tokens: single-use, URL-safe identifiers a suspended
//! `AwaitingCallback` step waits on before it can be resumed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Minimum entropy a generated token must carry, in bytes (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generates a fresh, URL-safe callback token with at least 256 bits of
/// entropy. The encoded length is 43 characters for 32 random bytes.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Formats the route a caller should expose to receive a callback for
/// `process_id` authenticated by `token`. The exact routing mechanism
/// (HTTP framework, auth middleware) is left to the embedding application;
/// this is just the canonical path shape.
pub fn callback_route(process_id: &str, token: &str) -> String {
    format!("/api/processes/{process_id}/callback/{token}")
}
