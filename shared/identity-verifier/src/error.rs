//! Error types for request assembly, policy resolution, deep links and proof verification.

use thiserror::Error;

use crate::config_store::ConfigId;
use crate::constants::{
    MAX_EXCLUDED_COUNTRIES, MAX_MINIMUM_AGE, MAX_SCOPE_LEN, USER_CONTEXT_DATA_LEN,
};
use crate::types::UserIdKind;

/// Malformed caller input. Messages are safe to return to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `userDefinedData` is not exactly 64 bytes (128 hex characters)
    #[error("userDefinedData must be a 64-byte hex string (128 characters)")]
    InvalidUserData,

    /// `userId` does not match its declared kind
    #[error("userId is not a valid {0} identifier")]
    InvalidUserId(UserIdKind),

    /// Scope is empty, too long or not printable ASCII
    #[error("scope must be 1 to {MAX_SCOPE_LEN} printable ASCII characters")]
    InvalidScope,

    /// Endpoint is not an absolute http(s) URL
    #[error("endpoint must be an absolute http(s) URL")]
    InvalidEndpoint,

    /// Country code is not three letters (or MRZ filler)
    #[error("invalid country code: {0}")]
    InvalidCountryCode(String),

    /// More excluded countries than a circuit can check
    #[error("at most {MAX_EXCLUDED_COUNTRIES} excluded countries are supported")]
    TooManyExcludedCountries,

    /// Minimum age outside of the provable range
    #[error("minimumAge must be between 0 and {MAX_MINIMUM_AGE}")]
    InvalidMinimumAge,

    /// Value is not a 256-bit decimal or hex number
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    /// `userContextData` is not 96 hex-encoded bytes
    #[error("userContextData must be {USER_CONTEXT_DATA_LEN} hex-encoded bytes")]
    InvalidUserContext,

    /// App configuration carries an unsupported schema version
    #[error("unsupported app config version: {0}")]
    UnsupportedVersion(u8),

    /// App name is empty
    #[error("appName must not be empty")]
    InvalidAppName,
}

/// Policy resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No policy is stored under the identifier and the store fails closed
    #[error("Unknown verification config: {0}")]
    UnknownConfig(ConfigId),
}

/// Deep-link encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepLinkError {
    /// The input is not a URI
    #[error("Invalid deep link: {0}")]
    InvalidUri(String),

    /// The URI has no app configuration payload
    #[error("Deep link carries no app configuration")]
    MissingPayload,

    /// The payload is not a serialized app configuration
    #[error("Malformed app configuration: {0}")]
    MalformedPayload(String),

    /// The configuration decoded but violates a request invariant
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A field, or the link as a whole, is too large for the transport
    #[error("{field} is {size} bytes, limit is {limit}")]
    ConfigTooLarge {
        /// Offending field, or `link` for the whole URI
        field: &'static str,
        /// Serialized size in bytes
        size: usize,
        /// Maximum accepted size in bytes
        limit: usize,
    },
}

/// Errors raised by a proof system backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofSystemError {
    /// The proof could not be interpreted for the circuit (counts as an invalid proof)
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// The backend could not be reached or answered unexpectedly
    #[error("Proof system unavailable: {0}")]
    Unavailable(String),
}

/// Failures loading a circuit verification key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyingKeyError {
    /// The key file could not be read
    #[error("Failed to read verification key {path}: {reason}")]
    Read {
        /// Location of the key file
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The key is not a BN254 Groth16 key in snarkjs layout
    #[error("Invalid verification key: {0}")]
    Invalid(String),
}

/// Infrastructure failures that prevent a verification verdict.
///
/// Cryptographic and policy failures are never reported through this type; they
/// produce an invalid [`crate::VerificationResult`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    /// The proof system backend is unavailable
    #[error("Proof system unavailable: {0}")]
    Unavailable(String),
}
