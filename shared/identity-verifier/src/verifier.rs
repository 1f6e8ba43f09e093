use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use strum::Display;

use crate::circuit::{CircuitLayout, CircuitSignals, RevealedData};
use crate::constants::MAX_DATE_SKEW_DAYS;
use crate::context::{hash_to_field, UserContext};
use crate::error::{ProofSystemError, ValidationError, VerifierError};
use crate::proof_system::ProofSystem;
use crate::request::validate_scope;
use crate::types::{
    AttestationId, DisclosureField, DisclosurePolicy, FieldElement, Proof, UserDefinedData,
    UserId, UserIdKind,
};

/// Static verifier settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    scope: String,
    allowed_attestations: BTreeSet<AttestationId>,
    user_id_kind: UserIdKind,
    max_date_skew_days: i64,
}

impl VerifierConfig {
    /// Accepts every supported credential type by default.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidScope`] if the scope can't be hashed into one element.
    pub fn new(scope: impl Into<String>, user_id_kind: UserIdKind) -> Result<Self, ValidationError> {
        let scope = scope.into();
        validate_scope(&scope)?;

        Ok(Self {
            scope,
            allowed_attestations: AttestationId::ALL.into_iter().collect(),
            user_id_kind,
            max_date_skew_days: MAX_DATE_SKEW_DAYS,
        })
    }

    /// Restricts the credential types this verifier accepts.
    #[must_use]
    pub fn with_allowed_attestations(
        mut self,
        allowed: impl IntoIterator<Item = AttestationId>,
    ) -> Self {
        self.allowed_attestations = allowed.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn with_max_date_skew_days(mut self, days: i64) -> Self {
        self.max_date_skew_days = days;
        self
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub const fn allowed_attestations(&self) -> &BTreeSet<AttestationId> {
        &self.allowed_attestations
    }

    #[must_use]
    pub const fn user_id_kind(&self) -> UserIdKind {
        self.user_id_kind
    }
}

/// Why an attestation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Credential type unknown or not allowed
    UnsupportedAttestationType,
    /// Wrong number of public signals or a signal outside the scalar field
    MalformedSignals,
    /// The attestation id signal differs from the claimed id
    AttestationIdMismatch,
    /// The proof was generated for another scope
    ScopeMismatch,
    /// `userContextData` could not be decoded
    InvalidUserContext,
    /// The proof was generated for different user context data
    ContextMismatch,
    /// The proof did not verify
    ProofInvalid,
    /// The proof date is too far from the verifier clock
    StaleProof,
    /// The proven age is below the policy minimum
    AgeBelowMinimum,
    /// The policy needs a credential field the proof does not reveal
    MissingCredentialField,
    /// The holder nationality is excluded by the policy
    CountryExcluded,
    /// The holder is on an OFAC list
    OfacMatch,
}

/// User data bound into a verified proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_id: UserId,
    pub user_defined_data: UserDefinedData,
}

/// Outcome of [`ProofVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attestation_id: Option<AttestationId>,
    disclosures: BTreeMap<DisclosureField, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nullifier: Option<FieldElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<UserData>,
}

impl VerificationResult {
    const fn rejected(reason: FailureReason, attestation_id: Option<AttestationId>) -> Self {
        Self {
            is_valid: false,
            failure_reason: Some(reason),
            attestation_id,
            disclosures: BTreeMap::new(),
            nullifier: None,
            user_data: None,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.is_valid
    }

    #[must_use]
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    #[must_use]
    pub const fn attestation_id(&self) -> Option<AttestationId> {
        self.attestation_id
    }

    /// Revealed fields, always a subset of the policy's revealed fields.
    #[must_use]
    pub const fn disclosures(&self) -> &BTreeMap<DisclosureField, String> {
        &self.disclosures
    }

    /// Scope-bound nullifier. Callers enforce single use with it.
    #[must_use]
    pub const fn nullifier(&self) -> Option<FieldElement> {
        self.nullifier
    }

    #[must_use]
    pub const fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }
}

/// Verifies attestations for one scope.
///
/// Checks run cheapest first; the proof system is only consulted once the signals are
/// bound to this scope and to the caller's user context.
pub struct ProofVerifier {
    config: VerifierConfig,
    scope_hash: FieldElement,
    proof_system: Arc<dyn ProofSystem>,
}

impl std::fmt::Debug for ProofVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProofVerifier {
    #[must_use]
    pub fn new(config: VerifierConfig, proof_system: Arc<dyn ProofSystem>) -> Self {
        let scope_hash = hash_to_field(config.scope.as_bytes());
        Self {
            config,
            scope_hash,
            proof_system,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.config.scope
    }

    #[must_use]
    pub const fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verifies one attestation against `policy`.
    ///
    /// Rejections are reported as an invalid [`VerificationResult`] with a [`FailureReason`].
    ///
    /// # Errors
    /// Returns [`VerifierError::Unavailable`] only if the proof system can't be reached.
    pub async fn verify(
        &self,
        attestation_id: u32,
        proof: &Proof,
        public_signals: &[FieldElement],
        user_context_data: &str,
        policy: &DisclosurePolicy,
    ) -> Result<VerificationResult, VerifierError> {
        let result = self
            .evaluate(attestation_id, proof, public_signals, user_context_data, policy)
            .await?;

        match result.failure_reason {
            None => tracing::info!(attestation_id, "Attestation verified"),
            Some(reason) => {
                tracing::info!(attestation_id, reason = %reason, "Attestation rejected");
            }
        }

        Ok(result)
    }

    async fn evaluate(
        &self,
        attestation_id: u32,
        proof: &Proof,
        public_signals: &[FieldElement],
        user_context_data: &str,
        policy: &DisclosurePolicy,
    ) -> Result<VerificationResult, VerifierError> {
        let Some(circuit) = AttestationId::from_u32(attestation_id)
            .filter(|id| self.config.allowed_attestations.contains(id))
        else {
            return Ok(VerificationResult::rejected(
                FailureReason::UnsupportedAttestationType,
                None,
            ));
        };
        let reject = |reason| Ok(VerificationResult::rejected(reason, Some(circuit)));

        let layout = CircuitLayout::for_attestation(circuit);
        let Some(signals) = CircuitSignals::new(layout, public_signals)
            .filter(|_| public_signals.iter().all(FieldElement::is_canonical))
        else {
            return reject(FailureReason::MalformedSignals);
        };

        if signals.attestation_id() != FieldElement::from_u64(u64::from(circuit.as_u32())) {
            return reject(FailureReason::AttestationIdMismatch);
        }

        if signals.scope() != self.scope_hash {
            return reject(FailureReason::ScopeMismatch);
        }

        let Ok(context) = UserContext::parse(user_context_data, self.config.user_id_kind) else {
            return reject(FailureReason::InvalidUserContext);
        };

        if signals.user_identifier() != context.commitment() {
            return reject(FailureReason::ContextMismatch);
        }

        match self.proof_system.verify(circuit, proof, public_signals).await {
            Ok(true) => {}
            Ok(false) => return reject(FailureReason::ProofInvalid),
            Err(ProofSystemError::MalformedProof(e)) => {
                tracing::debug!(attestation_id, error = %e, "Malformed proof");
                return reject(FailureReason::ProofInvalid);
            }
            Err(ProofSystemError::Unavailable(e)) => return Err(VerifierError::Unavailable(e)),
        }

        if !self.is_current(signals.current_date()) {
            return reject(FailureReason::StaleProof);
        }

        let revealed = signals.revealed_data();
        if let Some(reason) = check_policy(&revealed, policy) {
            return reject(reason);
        }

        let disclosures = policy
            .revealed_fields()
            .iter()
            .filter_map(|&field| revealed.value(field).map(|value| (field, value)))
            .collect();

        Ok(VerificationResult {
            is_valid: true,
            failure_reason: None,
            attestation_id: Some(circuit),
            disclosures,
            nullifier: Some(signals.nullifier()),
            user_data: Some(UserData {
                user_id: context.user_id().clone(),
                user_defined_data: context.user_defined_data().clone(),
            }),
        })
    }

    fn is_current(&self, date: FieldElement) -> bool {
        let Some(proof_date) = date.to_u64().and_then(date_from_digits) else {
            return false;
        };
        let today = Utc::now().date_naive();
        (proof_date - today).num_days().abs() <= self.config.max_date_skew_days
    }
}

/// `YYYYMMDD` to a calendar date.
fn date_from_digits(digits: u64) -> Option<NaiveDate> {
    let year = i32::try_from(digits / 10_000).ok()?;
    let month = u32::try_from(digits / 100 % 100).ok()?;
    let day = u32::try_from(digits % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Encodes a date the way circuits expose it.
#[must_use]
pub fn date_to_digits(date: NaiveDate) -> u64 {
    let year = u64::try_from(date.year()).unwrap_or_default();
    year * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())
}

fn check_policy(revealed: &RevealedData, policy: &DisclosurePolicy) -> Option<FailureReason> {
    if let Some(minimum_age) = policy.minimum_age() {
        match revealed.older_than() {
            None => return Some(FailureReason::MissingCredentialField),
            Some(age) if age < minimum_age => return Some(FailureReason::AgeBelowMinimum),
            Some(_) => {}
        }
    }

    if !policy.excluded_countries().is_empty() {
        match revealed.nationality() {
            None => return Some(FailureReason::MissingCredentialField),
            Some(country) if policy.excluded_countries().contains(&country) => {
                return Some(FailureReason::CountryExcluded);
            }
            Some(_) => {}
        }
    }

    if policy.ofac_check() {
        match revealed.ofac_cleared() {
            None => return Some(FailureReason::MissingCredentialField),
            Some(false) => return Some(FailureReason::OfacMatch),
            Some(true) => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::proof_system::mock::MockProofSystem;
    use crate::proof_system::DigestProofSystem;
    use crate::testing::{AttestationFixture, TEST_CIRCUIT_KEY, TEST_SCOPE};
    use crate::types::CountryCode;

    fn verifier() -> ProofVerifier {
        ProofVerifier::new(
            VerifierConfig::new(TEST_SCOPE, UserIdKind::Hex).unwrap(),
            Arc::new(DigestProofSystem::new(TEST_CIRCUIT_KEY)),
        )
    }

    fn policy(minimum_age: Option<u8>) -> DisclosurePolicy {
        DisclosurePolicy::new(minimum_age, [], false, [DisclosureField::Nationality]).unwrap()
    }

    async fn run(
        verifier: &ProofVerifier,
        fixture: &AttestationFixture,
        policy: &DisclosurePolicy,
    ) -> VerificationResult {
        let proof = fixture.prove(&DigestProofSystem::new(TEST_CIRCUIT_KEY));
        verifier
            .verify(
                fixture.attestation_id(),
                &proof,
                &fixture.public_signals(),
                &fixture.user_context_data(),
                policy,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_passport() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let result = run(&verifier(), &fixture, &policy(Some(18))).await;

        assert!(result.is_valid(), "{result:?}");
        assert_eq!(result.failure_reason(), None);
        assert_eq!(result.attestation_id(), Some(AttestationId::Passport));
        assert_eq!(result.nullifier(), Some(fixture.nullifier()));
        assert_eq!(
            result.user_data().unwrap().user_id,
            *fixture.user_context().user_id()
        );
        assert_eq!(
            result.disclosures().get(&DisclosureField::Nationality).unwrap(),
            "UTO"
        );
        assert_eq!(result.disclosures().get(&DisclosureField::OlderThan).unwrap(), "18");
    }

    #[tokio::test]
    async fn test_valid_eu_id_card() {
        let fixture = AttestationFixture::eu_id_card(TEST_SCOPE);
        let result = run(&verifier(), &fixture, &policy(Some(18))).await;
        assert!(result.is_valid(), "{result:?}");
        assert_eq!(result.attestation_id(), Some(AttestationId::EuIdCard));
    }

    #[tokio::test]
    async fn test_disclosures_are_limited_to_revealed_fields() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let policy = policy(None);
        let result = run(&verifier(), &fixture, &policy).await;

        assert!(result.is_valid());
        assert!(result
            .disclosures()
            .keys()
            .all(|field| policy.reveals(*field)));
        assert!(!result.disclosures().contains_key(&DisclosureField::Name));
        assert!(!result.disclosures().contains_key(&DisclosureField::OlderThan));
    }

    #[tokio::test]
    async fn test_age_boundary() {
        let verifier = verifier();

        let seventeen = AttestationFixture::passport(TEST_SCOPE).with_older_than(17);
        let result = run(&verifier, &seventeen, &policy(Some(18))).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::AgeBelowMinimum));

        let eighteen = AttestationFixture::passport(TEST_SCOPE).with_older_than(18);
        assert!(run(&verifier, &eighteen, &policy(Some(18))).await.is_valid());

        let unrevealed =
            AttestationFixture::passport(TEST_SCOPE).without_field(DisclosureField::OlderThan);
        let result = run(&verifier, &unrevealed, &policy(Some(18))).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::MissingCredentialField));
    }

    #[tokio::test]
    async fn test_excluded_country() {
        let policy = DisclosurePolicy::new(None, [CountryCode::parse("UTO").unwrap()], false, [])
            .unwrap();
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let result = run(&verifier(), &fixture, &policy).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::CountryExcluded));

        let elsewhere = AttestationFixture::passport(TEST_SCOPE)
            .with_field(DisclosureField::Nationality, b"FRA");
        assert!(run(&verifier(), &elsewhere, &policy).await.is_valid());
    }

    #[tokio::test]
    async fn test_ofac() {
        let policy = DisclosurePolicy::new(None, [], true, []).unwrap();
        let cleared = AttestationFixture::passport(TEST_SCOPE);
        let result = run(&verifier(), &cleared, &policy).await;
        assert!(result.is_valid());
        assert_eq!(result.disclosures().get(&DisclosureField::Ofac).unwrap(), "true");

        let listed = AttestationFixture::passport(TEST_SCOPE).with_ofac_listed();
        let result = run(&verifier(), &listed, &policy).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::OfacMatch));
    }

    #[tokio::test]
    async fn test_unsupported_attestation() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let proof = fixture.prove(&DigestProofSystem::new(TEST_CIRCUIT_KEY));
        let result = verifier()
            .verify(
                7,
                &proof,
                &fixture.public_signals(),
                &fixture.user_context_data(),
                &policy(None),
            )
            .await
            .unwrap();
        assert_eq!(
            result.failure_reason(),
            Some(FailureReason::UnsupportedAttestationType)
        );

        let passports_only = ProofVerifier::new(
            VerifierConfig::new(TEST_SCOPE, UserIdKind::Hex)
                .unwrap()
                .with_allowed_attestations([AttestationId::Passport]),
            Arc::new(DigestProofSystem::new(TEST_CIRCUIT_KEY)),
        );
        let card = AttestationFixture::eu_id_card(TEST_SCOPE);
        let result = run(&passports_only, &card, &policy(None)).await;
        assert_eq!(
            result.failure_reason(),
            Some(FailureReason::UnsupportedAttestationType)
        );
    }

    #[tokio::test]
    async fn test_malformed_signals() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let proof = fixture.prove(&DigestProofSystem::new(TEST_CIRCUIT_KEY));
        let mut signals = fixture.public_signals();
        signals.pop();

        let result = verifier()
            .verify(1, &proof, &signals, &fixture.user_context_data(), &policy(None))
            .await
            .unwrap();
        assert_eq!(result.failure_reason(), Some(FailureReason::MalformedSignals));

        let mut signals = fixture.public_signals();
        signals[0] = FieldElement::from_u256(crate::types::SNARK_SCALAR_FIELD);
        let result = verifier()
            .verify(1, &proof, &signals, &fixture.user_context_data(), &policy(None))
            .await
            .unwrap();
        assert_eq!(result.failure_reason(), Some(FailureReason::MalformedSignals));
    }

    #[tokio::test]
    async fn test_attestation_id_mismatch() {
        // Passport-shaped signals claimed as an EU id card
        let fixture = AttestationFixture::eu_id_card(TEST_SCOPE).with_signal_attestation_id(1);
        let result = run(&verifier(), &fixture, &policy(None)).await;
        assert_eq!(
            result.failure_reason(),
            Some(FailureReason::AttestationIdMismatch)
        );
    }

    #[tokio::test]
    async fn test_scope_mismatch() {
        let fixture = AttestationFixture::passport("another-scope");
        let result = run(&verifier(), &fixture, &policy(None)).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::ScopeMismatch));
    }

    #[tokio::test]
    async fn test_user_context_checks() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let proof = fixture.prove(&DigestProofSystem::new(TEST_CIRCUIT_KEY));
        let verifier = verifier();

        let result = verifier
            .verify(1, &proof, &fixture.public_signals(), "not-hex", &policy(None))
            .await
            .unwrap();
        assert_eq!(result.failure_reason(), Some(FailureReason::InvalidUserContext));

        let other = AttestationFixture::passport(TEST_SCOPE)
            .with_user_defined_data(UserDefinedData::from_text("someone else").unwrap());
        let result = verifier
            .verify(
                1,
                &proof,
                &fixture.public_signals(),
                &other.user_context_data(),
                &policy(None),
            )
            .await
            .unwrap();
        assert_eq!(result.failure_reason(), Some(FailureReason::ContextMismatch));
    }

    #[tokio::test]
    async fn test_proof_invalid() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let forged = fixture.prove(&DigestProofSystem::new(b"forger".to_vec()));
        let result = verifier()
            .verify(
                1,
                &forged,
                &fixture.public_signals(),
                &fixture.user_context_data(),
                &policy(None),
            )
            .await
            .unwrap();
        assert_eq!(result.failure_reason(), Some(FailureReason::ProofInvalid));
    }

    #[tokio::test]
    async fn test_stale_proof() {
        let today = Utc::now().date_naive();
        let verifier = verifier();

        let yesterday =
            AttestationFixture::passport(TEST_SCOPE).with_current_date(today - Duration::days(1));
        assert!(run(&verifier, &yesterday, &policy(None)).await.is_valid());

        let last_week =
            AttestationFixture::passport(TEST_SCOPE).with_current_date(today - Duration::days(7));
        let result = run(&verifier, &last_week, &policy(None)).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::StaleProof));
    }

    #[tokio::test]
    async fn test_proof_system_outage_is_an_error() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let system = Arc::new(MockProofSystem::unavailable());
        let verifier = ProofVerifier::new(
            VerifierConfig::new(TEST_SCOPE, UserIdKind::Hex).unwrap(),
            system.clone(),
        );

        let proof = fixture.prove(&DigestProofSystem::new(TEST_CIRCUIT_KEY));
        let result = verifier
            .verify(
                1,
                &proof,
                &fixture.public_signals(),
                &fixture.user_context_data(),
                &policy(None),
            )
            .await;
        assert!(matches!(result, Err(VerifierError::Unavailable(_))));
        assert_eq!(system.calls(), 1);
    }

    #[tokio::test]
    async fn test_cheap_checks_run_before_proof_system() {
        let fixture = AttestationFixture::passport("another-scope");
        let system = Arc::new(MockProofSystem::accepting());
        let verifier = ProofVerifier::new(
            VerifierConfig::new(TEST_SCOPE, UserIdKind::Hex).unwrap(),
            system.clone(),
        );

        let result = run(&verifier, &fixture, &policy(None)).await;
        assert_eq!(result.failure_reason(), Some(FailureReason::ScopeMismatch));
        assert_eq!(system.calls(), 0);
    }

    #[tokio::test]
    async fn test_verify_is_deterministic() {
        let fixture = AttestationFixture::passport(TEST_SCOPE);
        let verifier = verifier();
        let first = run(&verifier, &fixture, &policy(Some(18))).await;
        let second = run(&verifier, &fixture, &policy(Some(18))).await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_json() {
        let result = VerificationResult::rejected(
            FailureReason::ContextMismatch,
            Some(AttestationId::Passport),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["failureReason"], "context_mismatch");
        assert_eq!(json["attestationId"], "passport");
        assert!(json.get("nullifier").is_none());
    }

    #[test]
    fn test_date_digits() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(date_to_digits(date), 20_260_309);
        assert_eq!(date_from_digits(20_260_309), Some(date));
        assert_eq!(date_from_digits(20_261_340), None);
    }
}
