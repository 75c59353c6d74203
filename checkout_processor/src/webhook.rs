//! Webhook signature scheme.
//!
//! Every delivery carries a `Processor-Signature` header of the form `t=<unix seconds>,v1=<hex>`, where the hex
//! value is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the endpoint's signing secret. Several `v1` entries may be
//! present while the secret is being rolled; any one of them matching is enough.
use std::time::Duration;

use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::ProcessorApiError;

pub const SIGNATURE_HEADER: &str = "Processor-Signature";

type HmacSha256 = Hmac<Sha256>;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, ProcessorApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(ProcessorApiError::MalformedSignature(format!("'{part}' is not a key=value pair")));
        };
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|e| ProcessorApiError::MalformedSignature(format!("Invalid timestamp. {e}")))?;
                timestamp = Some(t);
            },
            "v1" => match hex::decode(value) {
                Ok(sig) => signatures.push(sig),
                Err(e) => debug!("🪝️ Skipping undecodable v1 signature. {e}"),
            },
            _ => trace!("🪝️ Ignoring signature scheme {key}"),
        }
    }
    let timestamp = timestamp.ok_or_else(|| ProcessorApiError::MalformedSignature("No timestamp".into()))?;
    if signatures.is_empty() {
        return Err(ProcessorApiError::MalformedSignature("No v1 signature".into()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, ProcessorApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ProcessorApiError::Initialization(format!("Invalid webhook secret. {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks that `header` is a valid signature of `payload`, made no more than `tolerance` away from `now`.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance: Duration,
    now: i64,
) -> Result<(), ProcessorApiError> {
    if secret.is_empty() {
        warn!("🪝️ No webhook secret is configured. Rejecting the delivery.");
        return Err(ProcessorApiError::SignatureMismatch);
    }
    let header = parse_header(header)?;
    let age = now - header.timestamp;
    let tolerance = i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX);
    if age.abs() > tolerance {
        return Err(ProcessorApiError::StaleSignature { age });
    }
    let mac = mac_for(secret, header.timestamp, payload)?;
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if matched {
        trace!("🪝️ Webhook signature verified");
        Ok(())
    } else {
        Err(ProcessorApiError::SignatureMismatch)
    }
}

/// Produces the header value the processor would send for `payload` at `timestamp`.
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let signature = match mac_for(secret, timestamp, payload) {
        Ok(mac) => hex::encode(mac.finalize().into_bytes()),
        Err(_) => String::default(),
    };
    format!("t={timestamp},v1={signature}")
}
