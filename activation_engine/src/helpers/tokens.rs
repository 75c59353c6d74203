use rand::{distributions::Alphanumeric, Rng};

/// A redemption token for a paid offer. Encoded into the QR code shown to the customer.
pub fn new_redemption_token() -> String {
    let body: String = rand::thread_rng().sample_iter(&Alphanumeric).take(24).map(char::from).collect();
    format!("rdm_{body}")
}

/// A human-friendly ticket code, e.g. `TKT-7Q2M-KD9X`.
pub fn new_ticket_code() -> String {
    let raw: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .take(8)
        .collect();
    format!("TKT-{}-{}", &raw[..4], &raw[4..])
}
