//! Protocol types shared by the request assembler, the proof verifier and the deep-link encoder.

use std::collections::BTreeSet;
use std::fmt;

use ruint::{aliases::U256, uint};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::constants::{
    MAX_EXCLUDED_COUNTRIES, MAX_MINIMUM_AGE, USER_DEFINED_DATA_LEN, USER_IDENTIFIER_LEN,
};
use crate::error::ValidationError;

/// BN254 scalar field modulus. Public signals and proof coordinates live below it.
pub const SNARK_SCALAR_FIELD: U256 =
    uint!(0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001_U256);

/// Length of a hex address without the `0x` prefix.
const ADDRESS_HEX_LEN: usize = 40;

/// A 256-bit value as it appears in public signals and proofs.
///
/// Serialized as a decimal string; `0x`-prefixed hex and JSON integers are accepted on input.
/// Deserialization does not enforce the field modulus, see [`FieldElement::is_canonical`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement(U256);

impl FieldElement {
    /// The zero element.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Wraps a raw 256-bit value.
    #[must_use]
    pub const fn from_u256(value: U256) -> Self {
        Self(value)
    }

    /// Creates a field element from a `u64` value.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Parses a decimal or `0x`-prefixed hex string.
    ///
    /// # Errors
    /// Returns an error if the input is not a number that fits into 256 bits.
    pub fn try_from_str(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::InvalidFieldElement("empty value".to_string()));
        }

        let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            Some(digits) => U256::from_str_radix(digits, 16),
            None => U256::from_str_radix(value, 10),
        };

        parsed
            .map(Self)
            .map_err(|e| ValidationError::InvalidFieldElement(e.to_string()))
    }

    /// Builds an element from 32 big-endian bytes.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_be_bytes(bytes))
    }

    /// Little-endian byte representation.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; 32] {
        self.0.to_le_bytes::<32>()
    }

    /// Builds an element from up to 32 little-endian bytes.
    #[must_use]
    pub fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buffer = [0u8; 32];
        let len = bytes.len().min(32);
        buffer[..len].copy_from_slice(&bytes[..len]);
        Self(U256::from_le_bytes(buffer))
    }

    /// Returns the value as `u64` if it fits.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        let limbs = self.0.as_limbs();
        limbs[1..].iter().all(|&limb| limb == 0).then_some(limbs[0])
    }

    /// Whether the value is a reduced element of the BN254 scalar field.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.0 < SNARK_SCALAR_FIELD
    }

    /// Hex representation padded to 32 bytes (plus `0x` prefix).
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        format!("{:#066x}", self.0)
    }

    /// The wrapped 256-bit value.
    #[must_use]
    pub const fn as_u256(&self) -> &U256 {
        &self.0
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Self::try_from_str(&text).map_err(serde::de::Error::custom),
            Repr::Number(number) => Ok(Self::from_u64(number)),
        }
    }
}

/// Supported credential types. Each one is proven by its own circuit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttestationId {
    /// Biometric passport
    Passport,
    /// European Union identity card
    EuIdCard,
}

impl AttestationId {
    /// Every credential type known to this crate.
    pub const ALL: [Self; 2] = [Self::Passport, Self::EuIdCard];

    /// Wire identifier used in requests and public signals.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Passport => 1,
            Self::EuIdCard => 2,
        }
    }

    /// Maps a wire identifier back to a credential type.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Passport),
            2 => Some(Self::EuIdCard),
            _ => None,
        }
    }
}

/// How the user identifier of a request is formatted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserIdKind {
    /// 20-byte hex address (`0x` + 40 hex characters)
    Hex,
    /// RFC 4122 UUID
    Uuid,
}

/// A user identifier validated against its [`UserIdKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserId {
    /// 20-byte address
    Address([u8; 20]),
    /// UUID
    Uuid(Uuid),
}

impl UserId {
    /// Parses `value` according to `kind`.
    ///
    /// Hex addresses must carry the `0x` prefix and exactly 40 hex digits.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidUserId`] if the value does not match the kind.
    pub fn parse(value: &str, kind: UserIdKind) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidUserId(kind);

        match kind {
            UserIdKind::Hex => {
                let digits = value
                    .strip_prefix("0x")
                    .or_else(|| value.strip_prefix("0X"))
                    .ok_or_else(invalid)?;
                if digits.len() != ADDRESS_HEX_LEN {
                    return Err(invalid());
                }

                let mut address = [0u8; 20];
                hex::decode_to_slice(digits, &mut address).map_err(|_| invalid())?;
                Ok(Self::Address(address))
            }
            UserIdKind::Uuid => Uuid::try_parse(value).map(Self::Uuid).map_err(|_| invalid()),
        }
    }

    /// The kind this identifier was parsed as.
    #[must_use]
    pub const fn kind(&self) -> UserIdKind {
        match self {
            Self::Address(_) => UserIdKind::Hex,
            Self::Uuid(_) => UserIdKind::Uuid,
        }
    }

    /// Left-padded 32-byte form used in the user context data.
    #[must_use]
    pub fn to_identifier_bytes(&self) -> [u8; USER_IDENTIFIER_LEN] {
        let mut out = [0u8; USER_IDENTIFIER_LEN];
        match self {
            Self::Address(address) => out[USER_IDENTIFIER_LEN - 20..].copy_from_slice(address),
            Self::Uuid(uuid) => out[USER_IDENTIFIER_LEN - 16..].copy_from_slice(uuid.as_bytes()),
        }
        out
    }

    /// Reads an identifier back from its 32-byte slot.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidUserId`] if the padding is not zero.
    pub fn from_identifier_bytes(
        bytes: &[u8; USER_IDENTIFIER_LEN],
        kind: UserIdKind,
    ) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidUserId(kind);
        let width = match kind {
            UserIdKind::Hex => 20,
            UserIdKind::Uuid => 16,
        };

        let (padding, id) = bytes.split_at(USER_IDENTIFIER_LEN - width);
        if padding.iter().any(|&b| b != 0) {
            return Err(invalid());
        }

        match kind {
            UserIdKind::Hex => <[u8; 20]>::try_from(id)
                .map(Self::Address)
                .map_err(|_| invalid()),
            UserIdKind::Uuid => Uuid::from_slice(id).map(Self::Uuid).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "0x{}", hex::encode(address)),
            Self::Uuid(uuid) => write!(f, "{}", uuid.hyphenated()),
        }
    }
}

impl Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Exactly 64 bytes of caller-defined data bound into the proof.
///
/// The text form is 128 hex characters without prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UserDefinedData([u8; USER_DEFINED_DATA_LEN]);

impl UserDefinedData {
    /// Parses exactly 128 hex characters.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidUserData`] for any other length or non-hex input.
    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        if value.len() != USER_DEFINED_DATA_LEN * 2 {
            return Err(ValidationError::InvalidUserData);
        }

        let mut data = [0u8; USER_DEFINED_DATA_LEN];
        hex::decode_to_slice(value, &mut data).map_err(|_| ValidationError::InvalidUserData)?;
        Ok(Self(data))
    }

    /// Stores a short label, zero padded on the right.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidUserData`] if the text is longer than 64 bytes.
    pub fn from_text(text: &str) -> Result<Self, ValidationError> {
        let bytes = text.as_bytes();
        if bytes.len() > USER_DEFINED_DATA_LEN {
            return Err(ValidationError::InvalidUserData);
        }

        let mut data = [0u8; USER_DEFINED_DATA_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(data))
    }

    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; USER_DEFINED_DATA_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; USER_DEFINED_DATA_LEN] {
        &self.0
    }

    /// Lowercase 128-character hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for UserDefinedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserDefinedData").field(&self.to_hex()).finish()
    }
}

impl Serialize for UserDefinedData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UserDefinedData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Three-character country code as printed in the MRZ (`A-Z` or `<` filler, e.g. `D<<`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryCode([u8; 3]);

impl CountryCode {
    /// Parses and uppercases a country code.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidCountryCode`] if the code is malformed.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let upper = value.trim().to_ascii_uppercase();
        match upper.as_bytes() {
            &[a, b, c] if [a, b, c].iter().all(|&x| x.is_ascii_uppercase() || x == b'<') => {
                Ok(Self([a, b, c]))
            }
            _ => Err(ValidationError::InvalidCountryCode(value.to_string())),
        }
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII bytes are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountryCode({})", self.as_str())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CountryCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CountryCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Credential fields and derived predicates that a policy can reveal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisclosureField {
    /// Issuing state of the document
    IssuingState,
    /// Holder name
    Name,
    /// Document number
    DocumentNumber,
    /// Holder nationality
    Nationality,
    /// Holder date of birth (`YYMMDD`)
    DateOfBirth,
    /// Holder gender
    Gender,
    /// Document expiry date (`YYMMDD`)
    ExpiryDate,
    /// Minimum age proven by the circuit
    OlderThan,
    /// OFAC screening outcome
    Ofac,
}

/// Which backend network the companion app should submit the proof to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    /// Production HTTPS backend
    Https,
    /// Staging HTTPS backend
    StagingHttps,
    /// Production on-chain verifier
    Celo,
    /// Staging on-chain verifier
    StagingCelo,
}

/// What a verification must prove and what it may reveal.
///
/// Immutable once built: the constructor validates and normalizes, and there are no setters.
/// A minimum age implies revealing [`DisclosureField::OlderThan`]; an OFAC check implies
/// revealing [`DisclosureField::Ofac`], so derived predicates always sit inside the revealed set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DisclosurePolicyRepr")]
pub struct DisclosurePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    minimum_age: Option<u8>,
    excluded_countries: BTreeSet<CountryCode>,
    #[serde(rename = "ofac")]
    ofac_check: bool,
    revealed_fields: BTreeSet<DisclosureField>,
}

impl DisclosurePolicy {
    /// Validates and normalizes a policy.
    ///
    /// # Errors
    /// Returns an error if the minimum age is above 99 or more than 40 countries are excluded.
    pub fn new(
        minimum_age: Option<u8>,
        excluded_countries: impl IntoIterator<Item = CountryCode>,
        ofac_check: bool,
        revealed_fields: impl IntoIterator<Item = DisclosureField>,
    ) -> Result<Self, ValidationError> {
        if minimum_age.is_some_and(|age| age > MAX_MINIMUM_AGE) {
            return Err(ValidationError::InvalidMinimumAge);
        }

        let excluded_countries: BTreeSet<CountryCode> = excluded_countries.into_iter().collect();
        if excluded_countries.len() > MAX_EXCLUDED_COUNTRIES {
            return Err(ValidationError::TooManyExcludedCountries);
        }

        let mut revealed_fields: BTreeSet<DisclosureField> = revealed_fields.into_iter().collect();
        if minimum_age.is_some() {
            revealed_fields.insert(DisclosureField::OlderThan);
        }
        if ofac_check {
            revealed_fields.insert(DisclosureField::Ofac);
        }

        Ok(Self {
            minimum_age,
            excluded_countries,
            ofac_check,
            revealed_fields,
        })
    }

    /// Minimum age the holder must prove, if any.
    #[must_use]
    pub const fn minimum_age(&self) -> Option<u8> {
        self.minimum_age
    }

    /// Nationalities that fail verification.
    #[must_use]
    pub const fn excluded_countries(&self) -> &BTreeSet<CountryCode> {
        &self.excluded_countries
    }

    /// Whether OFAC screening must have cleared.
    #[must_use]
    pub const fn ofac_check(&self) -> bool {
        self.ofac_check
    }

    /// Fields that may appear in a verification result.
    #[must_use]
    pub const fn revealed_fields(&self) -> &BTreeSet<DisclosureField> {
        &self.revealed_fields
    }

    /// Whether `field` may be disclosed.
    #[must_use]
    pub fn reveals(&self, field: DisclosureField) -> bool {
        self.revealed_fields.contains(&field)
    }
}

/// Wire form of [`DisclosurePolicy`]; accepts the `olderThan` and `ofacCheck` spellings as well.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisclosurePolicyRepr {
    #[serde(default, alias = "olderThan")]
    minimum_age: Option<u8>,
    #[serde(default)]
    excluded_countries: Vec<CountryCode>,
    #[serde(default, alias = "ofacCheck")]
    ofac: bool,
    #[serde(default)]
    revealed_fields: Vec<DisclosureField>,
}

impl TryFrom<DisclosurePolicyRepr> for DisclosurePolicy {
    type Error = ValidationError;

    fn try_from(repr: DisclosurePolicyRepr) -> Result<Self, Self::Error> {
        Self::new(
            repr.minimum_age,
            repr.excluded_countries,
            repr.ofac,
            repr.revealed_fields,
        )
    }
}

/// Groth16 proof as produced by the companion app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// A point (G1)
    pub a: [FieldElement; 2],
    /// B point (G2)
    pub b: [[FieldElement; 2]; 2],
    /// C point (G1)
    pub c: [FieldElement; 2],
}

impl Proof {
    /// All eight coordinates in `a`, `b`, `c` order.
    pub fn coordinates(&self) -> impl Iterator<Item = &FieldElement> {
        self.a.iter().chain(self.b.iter().flatten()).chain(self.c.iter())
    }
}
