use axum::response::Response;
use http_body_util::BodyExt;
use identity_verifier::{testing::AttestationFixture, DigestProofSystem};
use serde_json::json;

pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();
    serde_json::from_slice(&body).expect("Response body is not JSON")
}

/// `/verify` payload for a fixture proven by `prover`
pub fn verify_payload(
    fixture: &AttestationFixture,
    prover: &DigestProofSystem,
) -> serde_json::Value {
    json!({
        "attestationId": fixture.attestation_id(),
        "proof": fixture.prove(prover),
        "publicSignals": fixture.public_signals(),
        "userContextData": fixture.user_context_data(),
    })
}

/// 64 bytes of user defined data as 128 hex characters
pub fn user_defined_data_hex(byte: u8) -> String {
    hex::encode([byte; 64])
}
