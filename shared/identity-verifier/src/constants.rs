/// Length in bytes of the caller-defined payload bound into every proof.
pub const USER_DEFINED_DATA_LEN: usize = 64;

/// Length in bytes of the user identifier slot inside the user context data.
pub const USER_IDENTIFIER_LEN: usize = 32;

/// Decoded length of `userContextData`: identifier slot followed by the user defined data.
pub const USER_CONTEXT_DATA_LEN: usize = USER_IDENTIFIER_LEN + USER_DEFINED_DATA_LEN;

/// Scopes are hashed into a single field element, so they are capped at 31 bytes.
pub const MAX_SCOPE_LEN: usize = 31;

/// Largest excluded-country list a circuit can check.
pub const MAX_EXCLUDED_COUNTRIES: usize = 40;

/// Age predicates are proven as two ASCII digits.
pub const MAX_MINIMUM_AGE: u8 = 99;

/// Revealed credential bytes carried per packed field element.
pub const REVEALED_BYTES_PER_ELEMENT: usize = 31;

/// Accepted distance, in days, between the proof's current date and the verifier's clock.
pub const MAX_DATE_SKEW_DAYS: i64 = 1;

/// App configuration schema version understood by the companion app.
pub const APP_CONFIG_VERSION: u8 = 2;

/// Query parameter that carries the serialized app configuration.
pub const DEEP_LINK_PAYLOAD_PARAM: &str = "selfApp";

/// Default redirect host for universal links.
pub const DEFAULT_UNIVERSAL_LINK_BASE: &str = "https://redirect.self.xyz";

/// Byte-mode capacity of a version 40 QR code at low error correction.
pub const MAX_DEEP_LINK_LEN: usize = 2953;

/// Upper bound for any single string field of an app configuration.
pub const MAX_DEEP_LINK_FIELD_LEN: usize = 1024;
