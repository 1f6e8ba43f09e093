use hmac::{Hmac, Mac};
use ruint::aliases::U256;
use sha2::Sha256;

use crate::error::ProofSystemError;
use crate::types::{AttestationId, FieldElement, Proof};

type HmacSha256 = Hmac<Sha256>;

/// Cryptographic verification of a circuit proof against its public signals.
///
/// Implementations return `Ok(false)` for a proof that does not verify and reserve
/// [`ProofSystemError::Unavailable`] for infrastructure failures.
#[async_trait::async_trait]
pub trait ProofSystem: Send + Sync {
    /// Verifies `proof` for the circuit of `circuit` over `public_signals`.
    async fn verify(
        &self,
        circuit: AttestationId,
        proof: &Proof,
        public_signals: &[FieldElement],
    ) -> Result<bool, ProofSystemError>;
}

/// Keyed HMAC-SHA256 binding of a proof to its circuit and public signals.
///
/// Every coordinate of the proof is an HMAC lane over the circuit id and the signals, so
/// changing any signal invalidates the proof. Used for development and tests; it is not
/// zero-knowledge and the key must stay private to whoever issues proofs.
#[derive(Clone)]
pub struct DigestProofSystem {
    key: Vec<u8>,
}

impl DigestProofSystem {
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    fn lane(
        &self,
        lane: u8,
        circuit: AttestationId,
        public_signals: &[FieldElement],
    ) -> Result<FieldElement, ProofSystemError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ProofSystemError::Unavailable(format!("Invalid circuit key: {e}")))?;

        mac.update(&[lane]);
        mac.update(&circuit.as_u32().to_be_bytes());
        for signal in public_signals {
            mac.update(&signal.as_u256().to_be_bytes::<32>());
        }

        let digest: [u8; 32] = mac.finalize().into_bytes().into();
        Ok(FieldElement::from_u256(U256::from_be_bytes(digest) >> 8))
    }

    /// Issues the proof that [`ProofSystem::verify`] accepts for these signals.
    ///
    /// # Errors
    /// Returns an error if the key can't be used for HMAC.
    pub fn prove(
        &self,
        circuit: AttestationId,
        public_signals: &[FieldElement],
    ) -> Result<Proof, ProofSystemError> {
        let mut lanes = [FieldElement::ZERO; 8];
        for (i, slot) in (0u8..).zip(lanes.iter_mut()) {
            *slot = self.lane(i, circuit, public_signals)?;
        }

        let [a0, a1, b00, b01, b10, b11, c0, c1] = lanes;
        Ok(Proof {
            a: [a0, a1],
            b: [[b00, b01], [b10, b11]],
            c: [c0, c1],
        })
    }
}

impl std::fmt::Debug for DigestProofSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestProofSystem").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ProofSystem for DigestProofSystem {
    async fn verify(
        &self,
        circuit: AttestationId,
        proof: &Proof,
        public_signals: &[FieldElement],
    ) -> Result<bool, ProofSystemError> {
        if !proof.coordinates().all(FieldElement::is_canonical) {
            return Err(ProofSystemError::MalformedProof(
                "Proof coordinate outside of the scalar field".to_string(),
            ));
        }

        let expected = self.prove(circuit, public_signals)?;
        Ok(expected == *proof)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{AttestationId, FieldElement, Proof, ProofSystem, ProofSystemError};

    /// Proof system with a fixed answer that counts how often it was asked.
    #[derive(Debug, Default)]
    pub struct MockProofSystem {
        override_valid: Option<bool>,
        unavailable: bool,
        calls: AtomicUsize,
    }

    impl MockProofSystem {
        /// Accepts every proof.
        #[must_use]
        pub const fn accepting() -> Self {
            Self {
                override_valid: Some(true),
                unavailable: false,
                calls: AtomicUsize::new(0),
            }
        }

        /// Rejects every proof.
        #[must_use]
        pub const fn rejecting() -> Self {
            Self {
                override_valid: Some(false),
                unavailable: false,
                calls: AtomicUsize::new(0),
            }
        }

        /// Fails every call as if the backend were down.
        #[must_use]
        pub const fn unavailable() -> Self {
            Self {
                override_valid: None,
                unavailable: true,
                calls: AtomicUsize::new(0),
            }
        }

        /// Number of `verify` calls so far.
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ProofSystem for MockProofSystem {
        async fn verify(
            &self,
            _circuit: AttestationId,
            _proof: &Proof,
            _public_signals: &[FieldElement],
        ) -> Result<bool, ProofSystemError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.unavailable {
                return Err(ProofSystemError::Unavailable(
                    "mock proof system is down".to_string(),
                ));
            }

            Ok(self.override_valid.unwrap_or(true))
        }
    }
}
