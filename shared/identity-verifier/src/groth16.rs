//! Groth16 verification on BN254 against verification keys exported by snarkjs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::{BigInt, PrimeField};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof as ArkProof, VerifyingKey};
use ark_snark::SNARK;
use serde::Deserialize;

use crate::error::{ProofSystemError, VerifyingKeyError};
use crate::proof_system::ProofSystem;
use crate::types::{AttestationId, FieldElement, Proof};

/// Verification key as written by `snarkjs zkey export verificationkey`.
///
/// G1 points are `[x, y, "1"]`, G2 points `[[x.c0, x.c1], [y.c0, y.c1], ["1", "0"]]`.
#[derive(Debug, Deserialize)]
struct SnarkjsVerifyingKey {
    protocol: String,
    curve: String,
    #[serde(rename = "nPublic")]
    n_public: usize,
    vk_alpha_1: Vec<FieldElement>,
    vk_beta_2: Vec<[FieldElement; 2]>,
    vk_gamma_2: Vec<[FieldElement; 2]>,
    vk_delta_2: Vec<[FieldElement; 2]>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<FieldElement>>,
}

impl SnarkjsVerifyingKey {
    fn into_verifying_key(self) -> Result<VerifyingKey<Bn254>, VerifyingKeyError> {
        if self.protocol != "groth16" || self.curve != "bn128" {
            return Err(VerifyingKeyError::Invalid(format!(
                "expected a groth16 key on bn128, got {} on {}",
                self.protocol, self.curve
            )));
        }
        if self.ic.len() != self.n_public + 1 {
            return Err(VerifyingKeyError::Invalid(format!(
                "{} IC points for {} public signals",
                self.ic.len(),
                self.n_public
            )));
        }

        let gamma_abc_g1 = self
            .ic
            .iter()
            .enumerate()
            .map(|(i, point)| g1_key_point(point).ok_or_else(|| invalid_point(&format!("IC[{i}]"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VerifyingKey {
            alpha_g1: g1_key_point(&self.vk_alpha_1).ok_or_else(|| invalid_point("vk_alpha_1"))?,
            beta_g2: g2_key_point(&self.vk_beta_2).ok_or_else(|| invalid_point("vk_beta_2"))?,
            gamma_g2: g2_key_point(&self.vk_gamma_2).ok_or_else(|| invalid_point("vk_gamma_2"))?,
            delta_g2: g2_key_point(&self.vk_delta_2).ok_or_else(|| invalid_point("vk_delta_2"))?,
            gamma_abc_g1,
        })
    }
}

fn invalid_point(name: &str) -> VerifyingKeyError {
    VerifyingKeyError::Invalid(format!("{name} is not a valid curve point"))
}

fn base_field(value: &FieldElement) -> Option<Fq> {
    Fq::from_bigint(BigInt::new(*value.as_u256().as_limbs()))
}

fn scalar_field(value: &FieldElement) -> Option<Fr> {
    Fr::from_bigint(BigInt::new(*value.as_u256().as_limbs()))
}

/// G1 point, `None` unless it lies on the curve and in the prime-order subgroup.
fn g1(x: &FieldElement, y: &FieldElement) -> Option<G1Affine> {
    let point = G1Affine::new_unchecked(base_field(x)?, base_field(y)?);
    (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve()).then_some(point)
}

/// G2 point from `[c0, c1]` coordinate pairs.
fn g2(x: &[FieldElement; 2], y: &[FieldElement; 2]) -> Option<G2Affine> {
    let x = Fq2::new(base_field(&x[0])?, base_field(&x[1])?);
    let y = Fq2::new(base_field(&y[0])?, base_field(&y[1])?);
    let point = G2Affine::new_unchecked(x, y);
    (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve()).then_some(point)
}

fn g1_key_point(coordinates: &[FieldElement]) -> Option<G1Affine> {
    match coordinates {
        [x, y, ..] => g1(x, y),
        _ => None,
    }
}

fn g2_key_point(coordinates: &[[FieldElement; 2]]) -> Option<G2Affine> {
    match coordinates {
        [x, y, ..] => g2(x, y),
        _ => None,
    }
}

/// Wire proofs carry `b` in EVM call data order, each coordinate as `[c1, c0]`.
fn to_ark_proof(proof: &Proof) -> Result<ArkProof<Bn254>, ProofSystemError> {
    let malformed =
        |point: &str| ProofSystemError::MalformedProof(format!("{point} is not a valid curve point"));
    let [b_x, b_y] = &proof.b;

    Ok(ArkProof {
        a: g1(&proof.a[0], &proof.a[1]).ok_or_else(|| malformed("a"))?,
        b: g2(&[b_x[1], b_x[0]], &[b_y[1], b_y[0]]).ok_or_else(|| malformed("b"))?,
        c: g1(&proof.c[0], &proof.c[1]).ok_or_else(|| malformed("c"))?,
    })
}

fn verify_with_key(
    key: &PreparedVerifyingKey<Bn254>,
    proof: &Proof,
    public_signals: &[FieldElement],
) -> Result<bool, ProofSystemError> {
    let expected = key.vk.gamma_abc_g1.len().saturating_sub(1);
    if public_signals.len() != expected {
        return Err(ProofSystemError::MalformedProof(format!(
            "circuit takes {expected} public signals, got {}",
            public_signals.len()
        )));
    }

    let inputs = public_signals
        .iter()
        .map(|signal| {
            scalar_field(signal).ok_or_else(|| {
                ProofSystemError::MalformedProof(
                    "Public signal outside of the scalar field".to_string(),
                )
            })
        })
        .collect::<Result<Vec<Fr>, _>>()?;
    let proof = to_ark_proof(proof)?;

    Groth16::<Bn254>::verify_with_processed_vk(key, &inputs, &proof)
        .map_err(|e| ProofSystemError::MalformedProof(e.to_string()))
}

/// Verifies Groth16 proofs in process with one verification key per credential circuit.
///
/// Point decoding and the pairing check run on the blocking thread pool, so a burst of
/// verifications never occupies the async workers.
#[derive(Clone, Default)]
pub struct Groth16ProofSystem {
    keys: HashMap<AttestationId, Arc<PreparedVerifyingKey<Bn254>>>,
}

impl Groth16ProofSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the verification key of `circuit`.
    ///
    /// # Errors
    /// Returns [`VerifyingKeyError::Invalid`] if the key can't be prepared.
    pub fn with_verifying_key(
        mut self,
        circuit: AttestationId,
        key: &VerifyingKey<Bn254>,
    ) -> Result<Self, VerifyingKeyError> {
        let prepared = Groth16::<Bn254>::process_vk(key)
            .map_err(|e| VerifyingKeyError::Invalid(e.to_string()))?;
        self.keys.insert(circuit, Arc::new(prepared));
        Ok(self)
    }

    /// Registers a verification key exported by snarkjs.
    ///
    /// # Errors
    /// Returns [`VerifyingKeyError::Invalid`] if `json` is not a BN254 Groth16 key.
    pub fn with_snarkjs_key(
        self,
        circuit: AttestationId,
        json: &str,
    ) -> Result<Self, VerifyingKeyError> {
        let key: SnarkjsVerifyingKey =
            serde_json::from_str(json).map_err(|e| VerifyingKeyError::Invalid(e.to_string()))?;
        self.with_verifying_key(circuit, &key.into_verifying_key()?)
    }

    /// Loads `{dir}/{circuit}.json` (e.g. `passport.json`) for every circuit.
    ///
    /// # Errors
    /// Returns an error if a key file is missing or invalid.
    pub fn from_key_dir(
        dir: impl AsRef<Path>,
        circuits: impl IntoIterator<Item = AttestationId>,
    ) -> Result<Self, VerifyingKeyError> {
        circuits.into_iter().try_fold(Self::new(), |system, circuit| {
            let path = dir.as_ref().join(format!("{circuit}.json"));
            let json = std::fs::read_to_string(&path).map_err(|e| VerifyingKeyError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

            let system = system.with_snarkjs_key(circuit, &json)?;
            tracing::info!(circuit = %circuit, path = %path.display(), "Loaded verification key");
            Ok(system)
        })
    }

    /// Circuits with a registered key.
    #[must_use = "the iterator does nothing unless consumed"]
    pub fn circuits(&self) -> impl Iterator<Item = AttestationId> + '_ {
        self.keys.keys().copied()
    }
}

impl std::fmt::Debug for Groth16ProofSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Groth16ProofSystem")
            .field("circuits", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait::async_trait]
impl ProofSystem for Groth16ProofSystem {
    async fn verify(
        &self,
        circuit: AttestationId,
        proof: &Proof,
        public_signals: &[FieldElement],
    ) -> Result<bool, ProofSystemError> {
        let key = self.keys.get(&circuit).cloned().ok_or_else(|| {
            ProofSystemError::Unavailable(format!("No verification key for {circuit}"))
        })?;
        let proof = proof.clone();
        let public_signals = public_signals.to_vec();

        tokio::task::spawn_blocking(move || verify_with_key(&key, &proof, &public_signals))
            .await
            .map_err(|e| ProofSystemError::Unavailable(format!("Verification task failed: {e}")))?
    }
}
