use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use identity_verifier::{
    ConfigId, ConfigStore, FieldElement, Proof, ProofVerifier, UserContext, VerificationResult,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::{
    pool::VerificationPool,
    types::{AppError, ValidatedJson},
};

/// Attestation submitted by the companion app
#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Credential type (1 = passport, 2 = EU ID card)
    #[validate(required(message = "attestationId is required"))]
    pub attestation_id: Option<u32>,
    /// Groth16 proof `{a, b, c}` with decimal or hex coordinates
    #[validate(required(message = "proof is required"))]
    #[schemars(with = "Option<serde_json::Value>")]
    pub proof: Option<Proof>,
    /// Public signals of the circuit
    #[validate(required(message = "publicSignals is required"))]
    #[schemars(with = "Option<Vec<String>>")]
    pub public_signals: Option<Vec<FieldElement>>,
    /// Hex-encoded user identifier followed by the user defined data
    #[validate(required(message = "userContextData is required"))]
    pub user_context_data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub status: VerifyStatus,
    pub result: bool,
    /// Revealed credential fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosures: Option<BTreeMap<String, String>>,
    /// Scope-bound nullifier, unique per holder and scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_defined_data: Option<String>,
    /// Machine-readable failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// ISO-8601 UTC
    pub timestamp: String,
}

impl From<VerificationResult> for VerifyResponse {
    fn from(result: VerificationResult) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        if !result.is_valid() {
            return Self {
                status: VerifyStatus::Error,
                result: false,
                disclosures: None,
                nullifier: None,
                user_id: None,
                user_defined_data: None,
                reason: result.failure_reason().map(|reason| reason.to_string()),
                message: Some("Verification failed".to_string()),
                timestamp,
            };
        }

        let disclosures = result
            .disclosures()
            .iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();

        Self {
            status: VerifyStatus::Success,
            result: true,
            disclosures: Some(disclosures),
            nullifier: result.nullifier().map(|nullifier| nullifier.to_string()),
            user_id: result.user_data().map(|data| data.user_id.to_string()),
            user_defined_data: result.user_data().map(|data| data.user_defined_data.to_hex()),
            reason: None,
            message: None,
            timestamp,
        }
    }
}

/// Verify an identity attestation
///
/// Runs the attestation against the policy of the link it was issued for. The link is
/// found through the user context the proof is bound to; attestations that don't match an
/// issued link are checked against the scope policy when that fallback is enabled, and are
/// otherwise answered with `policy_unavailable`. Cryptographic and policy failures are reported with `result: false` and a reason;
/// error statuses are reserved for malformed requests and unavailable dependencies.
#[instrument(skip_all)]
pub async fn verify(
    Extension(verifier): Extension<Arc<ProofVerifier>>,
    Extension(config_store): Extension<Arc<dyn ConfigStore>>,
    Extension(pool): Extension<Arc<VerificationPool>>,
    ValidatedJson(payload): ValidatedJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let VerifyRequest {
        attestation_id: Some(attestation_id),
        proof: Some(proof),
        public_signals: Some(public_signals),
        user_context_data: Some(user_context_data),
    } = payload
    else {
        return Err(AppError::validation(
            "attestationId, proof, publicSignals and userContextData are required",
        ));
    };

    // Unparseable contexts are rejected by the verifier under the scope policy
    let config_id = UserContext::parse(&user_context_data, verifier.config().user_id_kind())
        .map_or_else(
            |_| ConfigId::from_scope(verifier.scope()),
            |context| ConfigId::from_user_context(verifier.scope(), &context),
        );
    let policy = config_store.resolve(&config_id).await?;

    let result = pool
        .run(verifier.verify(
            attestation_id,
            &proof,
            &public_signals,
            &user_context_data,
            &policy,
        ))
        .await??;

    Ok(Json(result.into()))
}
