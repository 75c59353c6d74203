mod fingerprint;
mod tokens;

pub use fingerprint::idempotency_fingerprint;
pub use tokens::{new_redemption_token, new_ticket_code};
