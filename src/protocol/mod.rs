pub mod authorization;
pub mod client;
pub mod date;
pub mod responder;
pub mod verifier;

pub use authorization::DialbackCredentials;
pub use client::{DialbackClient, DialbackResponse};
pub use responder::Responder;
pub use verifier::{RemoteIdentity, Verifier};

/// Maximum allowed distance between a claimed `Date` and local time, and
/// the age after which issued tokens are swept.
pub const REPLAY_WINDOW_MS: i64 = 300_000;

pub const DEFAULT_PATH: &str = "/dialback";
