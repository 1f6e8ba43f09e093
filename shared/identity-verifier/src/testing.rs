//! Attestation fixtures for tests.
//!
//! Builds public signals and user context data the way the companion app would, and
//! proves them with a [`DigestProofSystem`] or a real Groth16 setup ([`Groth16Circuit`]).

use ark_bn254::{Bn254, Fq, Fr, G1Affine, G2Affine};
use ark_ff::{BigInt, PrimeField};
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_relations::{
    lc,
    r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError},
};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use chrono::{NaiveDate, Utc};
use ruint::aliases::U256;
use serde_json::json;

use crate::circuit::{pack_revealed, CircuitLayout};
use crate::context::{hash_to_field, UserContext};
use crate::proof_system::DigestProofSystem;
use crate::types::{AttestationId, DisclosureField, FieldElement, Proof, UserDefinedData, UserId};
use crate::verifier::date_to_digits;

/// Scope used across tests.
pub const TEST_SCOPE: &str = "passport-verify";

/// Key shared by fixture provers and test verifiers.
pub const TEST_CIRCUIT_KEY: &[u8] = b"identity-verifier-test-key";

/// A credential holder's attestation, ready to be proven.
#[derive(Debug, Clone)]
pub struct AttestationFixture {
    attestation_id: AttestationId,
    signal_attestation_id: u64,
    scope_hash: FieldElement,
    context: UserContext,
    revealed: Vec<u8>,
    nullifier: FieldElement,
    current_date: NaiveDate,
}

impl AttestationFixture {
    fn new(attestation_id: AttestationId, scope: &str) -> Self {
        let layout = CircuitLayout::for_attestation(attestation_id);
        let context = UserContext::new(
            UserId::Address([0x11; 20]),
            UserDefinedData::from_text("Identity Check!").expect("Label fits into 64 bytes"),
        );

        Self {
            attestation_id,
            signal_attestation_id: u64::from(attestation_id.as_u32()),
            scope_hash: hash_to_field(scope.as_bytes()),
            context,
            revealed: vec![0u8; layout.revealed_len()],
            nullifier: hash_to_field(b"fixture-nullifier"),
            current_date: Utc::now().date_naive(),
        }
    }

    /// An adult passport holder from Utopia, cleared by every OFAC list.
    #[must_use]
    pub fn passport(scope: &str) -> Self {
        Self::new(AttestationId::Passport, scope)
            .with_field(DisclosureField::IssuingState, b"UTO")
            .with_field(DisclosureField::Name, b"ERIKSSON<<ANNA<MARIA")
            .with_field(DisclosureField::DocumentNumber, b"L898902C3")
            .with_field(DisclosureField::Nationality, b"UTO")
            .with_field(DisclosureField::DateOfBirth, b"740812")
            .with_field(DisclosureField::Gender, b"F")
            .with_field(DisclosureField::ExpiryDate, b"320415")
            .with_older_than(18)
            .with_field(DisclosureField::Ofac, &[1, 1, 1])
    }

    /// An adult EU identity card holder, cleared by every OFAC list.
    #[must_use]
    pub fn eu_id_card(scope: &str) -> Self {
        Self::new(AttestationId::EuIdCard, scope)
            .with_field(DisclosureField::IssuingState, b"D<<")
            .with_field(DisclosureField::Name, b"MUSTERMANN<<ERIKA")
            .with_field(DisclosureField::DocumentNumber, b"T22000129")
            .with_field(DisclosureField::Nationality, b"D<<")
            .with_field(DisclosureField::DateOfBirth, b"640812")
            .with_field(DisclosureField::Gender, b"F")
            .with_field(DisclosureField::ExpiryDate, b"310101")
            .with_older_than(18)
            .with_field(DisclosureField::Ofac, &[1, 1])
    }

    /// Overwrites a revealed field; longer values are truncated to the field width.
    #[must_use]
    pub fn with_field(mut self, field: DisclosureField, value: &[u8]) -> Self {
        let range = CircuitLayout::for_attestation(self.attestation_id).range(field);
        let slot = &mut self.revealed[range];
        slot.fill(0);
        let len = value.len().min(slot.len());
        slot[..len].copy_from_slice(&value[..len]);
        self
    }

    /// Hides a field, as if the holder did not reveal it.
    #[must_use]
    pub fn without_field(self, field: DisclosureField) -> Self {
        self.with_field(field, &[])
    }

    #[must_use]
    pub fn with_older_than(self, age: u8) -> Self {
        self.with_field(DisclosureField::OlderThan, format!("{age:02}").as_bytes())
    }

    /// Marks the holder as listed by the first OFAC list.
    #[must_use]
    pub fn with_ofac_listed(self) -> Self {
        self.with_field(DisclosureField::Ofac, &[2])
    }

    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.context = UserContext::new(user_id, self.context.user_defined_data().clone());
        self
    }

    #[must_use]
    pub fn with_user_defined_data(mut self, user_defined_data: UserDefinedData) -> Self {
        self.context = UserContext::new(self.context.user_id().clone(), user_defined_data);
        self
    }

    #[must_use]
    pub fn with_nullifier(mut self, nullifier: FieldElement) -> Self {
        self.nullifier = nullifier;
        self
    }

    #[must_use]
    pub const fn with_current_date(mut self, date: NaiveDate) -> Self {
        self.current_date = date;
        self
    }

    /// Puts a different attestation id into the signals than the one claimed.
    #[must_use]
    pub const fn with_signal_attestation_id(mut self, id: u64) -> Self {
        self.signal_attestation_id = id;
        self
    }

    /// Claimed attestation id, as sent on the wire.
    #[must_use]
    pub const fn attestation_id(&self) -> u32 {
        self.attestation_id.as_u32()
    }

    #[must_use]
    pub const fn nullifier(&self) -> FieldElement {
        self.nullifier
    }

    #[must_use]
    pub const fn user_context(&self) -> &UserContext {
        &self.context
    }

    /// Hex `userContextData`.
    #[must_use]
    pub fn user_context_data(&self) -> String {
        self.context.to_hex()
    }

    /// Public signals in circuit order.
    #[must_use]
    pub fn public_signals(&self) -> Vec<FieldElement> {
        let mut signals = pack_revealed(&self.revealed);
        signals.extend([
            self.nullifier,
            FieldElement::from_u64(self.signal_attestation_id),
            self.scope_hash,
            self.context.commitment(),
            FieldElement::from_u64(date_to_digits(self.current_date)),
        ]);
        signals
    }

    /// Proves the public signals with `system`.
    ///
    /// # Panics
    /// If the proof system rejects its key.
    #[must_use]
    pub fn prove(&self, system: &DigestProofSystem) -> Proof {
        system
            .prove(self.attestation_id, &self.public_signals())
            .expect("Failed to prove fixture")
    }
}

/// Squares every public signal. Stands in for a credential circuit with the same number
/// of public inputs.
#[derive(Clone)]
struct SquareCircuit {
    signals: Vec<Option<Fr>>,
}

impl ConstraintSynthesizer<Fr> for SquareCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        for signal in self.signals {
            let input =
                cs.new_input_variable(|| signal.ok_or(SynthesisError::AssignmentMissing))?;
            let square = cs.new_witness_variable(|| {
                signal
                    .map(|value| value * value)
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
            cs.enforce_constraint(lc!() + input, lc!() + input, lc!() + square)?;
        }
        Ok(())
    }
}

fn element(value: Fq) -> FieldElement {
    FieldElement::from_u256(U256::from_limbs(value.into_bigint().0))
}

fn g1_json(point: &G1Affine) -> serde_json::Value {
    json!([element(point.x), element(point.y), "1"])
}

fn g2_json(point: &G2Affine) -> serde_json::Value {
    json!([
        [element(point.x.c0), element(point.x.c1)],
        [element(point.y.c0), element(point.y.c1)],
        ["1", "0"]
    ])
}

/// Groth16 keys for a test circuit with a fixed number of public signals.
pub struct Groth16Circuit {
    public_signals: usize,
    proving_key: ProvingKey<Bn254>,
    verifying_key: VerifyingKey<Bn254>,
}

impl Groth16Circuit {
    /// Runs the circuit setup for `public_signals` inputs.
    #[must_use]
    pub fn setup(public_signals: usize) -> Self {
        Self::setup_with_seed(public_signals, 0)
    }

    /// Circuit sized for the public signals of `attestation_id`.
    #[must_use]
    pub fn for_attestation(attestation_id: AttestationId) -> Self {
        Self::setup(CircuitLayout::for_attestation(attestation_id).signal_count())
    }

    /// Setup with its own randomness; keys from different seeds don't accept each
    /// other's proofs.
    ///
    /// # Panics
    /// If the setup fails.
    #[must_use]
    pub fn setup_with_seed(public_signals: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let circuit = SquareCircuit {
            signals: vec![None; public_signals],
        };
        let (proving_key, verifying_key) =
            Groth16::<Bn254>::circuit_specific_setup(circuit, &mut rng)
                .expect("Failed to run circuit setup");

        Self {
            public_signals,
            proving_key,
            verifying_key,
        }
    }

    /// Verification key in the JSON layout snarkjs exports.
    #[must_use]
    pub fn verifying_key_json(&self) -> String {
        let key = &self.verifying_key;
        json!({
            "protocol": "groth16",
            "curve": "bn128",
            "nPublic": self.public_signals,
            "vk_alpha_1": g1_json(&key.alpha_g1),
            "vk_beta_2": g2_json(&key.beta_g2),
            "vk_gamma_2": g2_json(&key.gamma_g2),
            "vk_delta_2": g2_json(&key.delta_g2),
            "IC": key.gamma_abc_g1.iter().map(g1_json).collect::<Vec<_>>(),
        })
        .to_string()
    }

    /// Proves `signals`, laid out the way the companion app sends proofs.
    ///
    /// # Panics
    /// If a signal is outside of the scalar field or the count doesn't match the circuit.
    #[must_use]
    pub fn prove(&self, signals: &[FieldElement]) -> Proof {
        assert_eq!(signals.len(), self.public_signals, "Signal count mismatch");
        let signals = signals
            .iter()
            .map(|signal| Fr::from_bigint(BigInt::new(*signal.as_u256().as_limbs())))
            .collect();

        let mut rng = StdRng::seed_from_u64(1);
        let proof = Groth16::<Bn254>::prove(&self.proving_key, SquareCircuit { signals }, &mut rng)
            .expect("Failed to prove signals");

        Proof {
            a: [element(proof.a.x), element(proof.a.y)],
            b: [
                [element(proof.b.x.c1), element(proof.b.x.c0)],
                [element(proof.b.y.c1), element(proof.b.y.c0)],
            ],
            c: [element(proof.c.x), element(proof.c.y)],
        }
    }
}
