use ruint::aliases::U256;
use sha2::{Digest, Sha256};

use crate::constants::{USER_CONTEXT_DATA_LEN, USER_IDENTIFIER_LEN};
use crate::error::ValidationError;
use crate::types::{FieldElement, UserDefinedData, UserId, UserIdKind};

/// Hashes arbitrary bytes into the scalar field.
///
/// SHA-256 output shifted right by 8 bits, so the result always fits below the modulus.
#[must_use]
pub fn hash_to_field(bytes: &[u8]) -> FieldElement {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    FieldElement::from_u256(U256::from_be_bytes(digest) >> 8)
}

/// The `userContextData` bound into a proof: a 32-byte user identifier slot followed by
/// the 64 bytes of user defined data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
    user_defined_data: UserDefinedData,
}

impl UserContext {
    /// Creates a context from its parts.
    #[must_use]
    pub const fn new(user_id: UserId, user_defined_data: UserDefinedData) -> Self {
        Self {
            user_id,
            user_defined_data,
        }
    }

    /// Decodes hex `userContextData` (with or without `0x`).
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidUserContext`] if the data is not 96 hex-encoded bytes,
    /// or [`ValidationError::InvalidUserId`] if the identifier slot does not hold a `kind` id.
    pub fn parse(value: &str, kind: UserIdKind) -> Result<Self, ValidationError> {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        if digits.len() != USER_CONTEXT_DATA_LEN * 2 {
            return Err(ValidationError::InvalidUserContext);
        }

        let mut bytes = [0u8; USER_CONTEXT_DATA_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| ValidationError::InvalidUserContext)?;

        let (identifier, data) = bytes.split_at(USER_IDENTIFIER_LEN);
        let identifier: [u8; USER_IDENTIFIER_LEN] = identifier
            .try_into()
            .map_err(|_| ValidationError::InvalidUserContext)?;
        let data = data
            .try_into()
            .map_err(|_| ValidationError::InvalidUserContext)?;

        Ok(Self {
            user_id: UserId::from_identifier_bytes(&identifier, kind)?,
            user_defined_data: UserDefinedData::from_bytes(data),
        })
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub const fn user_defined_data(&self) -> &UserDefinedData {
        &self.user_defined_data
    }

    /// The 96 raw bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; USER_CONTEXT_DATA_LEN] {
        let mut bytes = [0u8; USER_CONTEXT_DATA_LEN];
        bytes[..USER_IDENTIFIER_LEN].copy_from_slice(&self.user_id.to_identifier_bytes());
        bytes[USER_IDENTIFIER_LEN..].copy_from_slice(self.user_defined_data.as_bytes());
        bytes
    }

    /// Lowercase hex form without prefix, as sent by the companion app.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Value the circuit exposes as its user identifier signal.
    #[must_use]
    pub fn commitment(&self) -> FieldElement {
        hash_to_field(&self.to_bytes())
    }
}
