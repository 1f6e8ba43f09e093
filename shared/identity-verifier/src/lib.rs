#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Identity attestation verification.
//!
//! Assembles verification requests, encodes them into deep links for the companion app,
//! and verifies the attestations it sends back against a disclosure policy.

pub mod circuit;
pub mod config_store;
pub mod constants;
pub mod context;
pub mod deep_link;
pub mod error;
pub mod groth16;
pub mod proof_system;
pub mod request;
pub mod types;
pub mod verifier;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config_store::{ConfigId, ConfigStore, InMemoryConfigStore, DEFAULT_MAX_LINK_POLICIES};
pub use context::UserContext;
pub use deep_link::{AppConfig, DeepLinkEncoder, Presentation};
pub use error::{
    ConfigError, DeepLinkError, ProofSystemError, ValidationError, VerifierError,
    VerifyingKeyError,
};
pub use groth16::Groth16ProofSystem;
pub use proof_system::{DigestProofSystem, ProofSystem};
pub use request::{assemble, PolicyDefaults, RequestParams, VerificationRequest};
pub use types::{
    AttestationId, CountryCode, DisclosureField, DisclosurePolicy, EndpointType, FieldElement,
    Proof, UserDefinedData, UserId, UserIdKind,
};
pub use verifier::{FailureReason, ProofVerifier, UserData, VerificationResult, VerifierConfig};
