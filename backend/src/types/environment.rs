//! Environment configuration for different deployment stages

use std::collections::BTreeSet;
use std::env;

use identity_verifier::{
    constants::DEFAULT_UNIVERSAL_LINK_BASE, AttestationId, CountryCode, DisclosureField,
    DisclosurePolicy, EndpointType, PolicyDefaults, Presentation, UserIdKind, ValidationError,
    DEFAULT_MAX_LINK_POLICIES,
};
use tracing::Level;

/// Scope used by local deployments
const DEVELOPMENT_SCOPE: &str = "passport-verify";
/// Minimum age applied when a request does not ask for one
const DEFAULT_MINIMUM_AGE: u8 = 18;
/// Maximum number of verifications running at the same time
const DEFAULT_VERIFY_MAX_CONCURRENCY: usize = 8;
/// Maximum number of verifications waiting for a slot
const DEFAULT_VERIFY_MAX_QUEUE: usize = 32;

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (proofs are checked with the local digest proof system
    /// unless verification keys are given)
    Development {
        /// Optional directory of Groth16 verification keys
        verification_keys_dir: Option<String>,
    },
}

// Most settings are read from the process environment regardless of the stage
#[allow(clippy::unused_self)]
impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development {
                verification_keys_dir: env::var("VERIFICATION_KEYS_DIR")
                    .ok()
                    .filter(|dir| !dir.trim().is_empty()),
            },
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Verification scope shared by requests and proofs
    ///
    /// # Panics
    ///
    /// Panics if the `SELF_SCOPE` environment variable is not set outside of development
    #[must_use]
    pub fn scope(&self) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var("SELF_SCOPE").expect("SELF_SCOPE environment variable is not set")
            }
            Self::Development { .. } => {
                env::var("SELF_SCOPE").unwrap_or_else(|_| DEVELOPMENT_SCOPE.to_string())
            }
        }
    }

    /// Public URL the companion app submits proofs to
    ///
    /// # Panics
    ///
    /// Panics if the `VERIFICATION_ENDPOINT` environment variable is not set outside of development
    #[must_use]
    pub fn verification_endpoint(&self) -> String {
        match self {
            Self::Production | Self::Staging => env::var("VERIFICATION_ENDPOINT")
                .expect("VERIFICATION_ENDPOINT environment variable is not set"),
            Self::Development { .. } => env::var("VERIFICATION_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:8001/api/verify".to_string()),
        }
    }

    /// Name shown to the holder in the companion app
    #[must_use]
    pub fn app_name(&self) -> String {
        env::var("SELF_APP_NAME").unwrap_or_else(|_| "Self Workshop".to_string())
    }

    /// Logo shown to the holder in the companion app
    #[must_use]
    pub fn logo_url(&self) -> String {
        env::var("SELF_LOGO_URL")
            .unwrap_or_else(|_| "https://i.postimg.cc/mrmVf9hm/self.png".to_string())
    }

    /// Base of generated universal links
    #[must_use]
    pub fn universal_link_base(&self) -> String {
        env::var("UNIVERSAL_LINK_BASE").unwrap_or_else(|_| DEFAULT_UNIVERSAL_LINK_BASE.to_string())
    }

    /// Backend network the companion app submits to
    #[must_use]
    pub const fn endpoint_type(&self) -> EndpointType {
        match self {
            Self::Production => EndpointType::Https,
            Self::Staging | Self::Development { .. } => EndpointType::StagingHttps,
        }
    }

    /// Whether the companion app runs against mock documents
    #[must_use]
    pub const fn dev_mode(&self) -> bool {
        matches!(self, Self::Development { .. })
    }

    /// Format of user identifiers
    ///
    /// # Panics
    ///
    /// Panics if `USER_ID_TYPE` is set to something other than `hex` or `uuid`
    #[must_use]
    pub fn user_id_kind(&self) -> UserIdKind {
        env::var("USER_ID_TYPE").map_or(UserIdKind::Hex, |val| {
            val.trim()
                .to_lowercase()
                .parse()
                .unwrap_or_else(|_| panic!("Invalid USER_ID_TYPE: {val}"))
        })
    }

    /// Credential types accepted by the verifier
    ///
    /// # Panics
    ///
    /// Panics if `ALLOWED_ATTESTATION_TYPES` names an unknown credential type
    #[must_use]
    pub fn allowed_attestations(&self) -> BTreeSet<AttestationId> {
        env::var("ALLOWED_ATTESTATION_TYPES").map_or_else(
            |_| AttestationId::ALL.into_iter().collect(),
            |val| {
                split_list(&val)
                    .map(|item| {
                        item.parse()
                            .unwrap_or_else(|_| panic!("Invalid attestation type: {item}"))
                    })
                    .collect()
            },
        )
    }

    /// Policy values used when a request leaves them out
    ///
    /// # Panics
    ///
    /// Panics if `MINIMUM_AGE`, `EXCLUDED_COUNTRIES` or `OFAC_CHECK` hold invalid values
    #[must_use]
    pub fn policy_defaults(&self) -> PolicyDefaults {
        let minimum_age = match env::var("MINIMUM_AGE") {
            Ok(val) if val.trim().is_empty() || val.trim().eq_ignore_ascii_case("none") => None,
            Ok(val) => Some(
                val.trim()
                    .parse::<u8>()
                    .unwrap_or_else(|_| panic!("Invalid MINIMUM_AGE: {val}")),
            ),
            Err(_) => Some(DEFAULT_MINIMUM_AGE),
        };

        let excluded_countries = env::var("EXCLUDED_COUNTRIES")
            .map(|val| {
                split_list(&val)
                    .map(|code| {
                        CountryCode::parse(code)
                            .unwrap_or_else(|_| panic!("Invalid country code: {code}"))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let ofac_check = env::var("OFAC_CHECK")
            .map(|val| {
                val.trim()
                    .parse::<bool>()
                    .unwrap_or_else(|_| panic!("Invalid OFAC_CHECK: {val}"))
            })
            .unwrap_or(false);

        PolicyDefaults {
            minimum_age,
            excluded_countries,
            ofac_check,
        }
    }

    /// Policy enforced on `/verify`: the defaults, revealing nationality
    ///
    /// # Errors
    ///
    /// Returns an error if the configured defaults violate the policy limits
    pub fn verification_policy(&self) -> Result<DisclosurePolicy, ValidationError> {
        self.policy_defaults()
            .policy([DisclosureField::Nationality])
    }

    /// Presentation metadata for app configurations
    #[must_use]
    pub fn presentation(&self) -> Presentation {
        Presentation {
            app_name: self.app_name(),
            logo_base64: self.logo_url(),
            endpoint_type: self.endpoint_type(),
            dev_mode: self.dev_mode(),
            header: String::new(),
            deeplink_callback: env::var("DEEPLINK_CALLBACK").ok(),
        }
    }

    /// Directory holding one snarkjs verification key per credential type
    /// (`passport.json`, `eu_id_card.json`)
    ///
    /// # Panics
    ///
    /// Panics if the `VERIFICATION_KEYS_DIR` environment variable is not set outside of development
    #[must_use]
    pub fn verification_keys_dir(&self) -> Option<String> {
        match self {
            Self::Production | Self::Staging => Some(
                env::var("VERIFICATION_KEYS_DIR")
                    .expect("VERIFICATION_KEYS_DIR environment variable is not set"),
            ),
            Self::Development {
                verification_keys_dir,
            } => verification_keys_dir.clone(),
        }
    }

    /// Whether proofs that don't match an issued link are checked against the scope policy
    ///
    /// # Panics
    ///
    /// Panics if `SCOPE_POLICY_FALLBACK` is not a boolean
    #[must_use]
    pub fn scope_policy_fallback(&self) -> bool {
        env::var("SCOPE_POLICY_FALLBACK").map_or_else(
            |_| self.dev_mode(),
            |val| {
                val.trim()
                    .parse::<bool>()
                    .unwrap_or_else(|_| panic!("Invalid SCOPE_POLICY_FALLBACK: {val}"))
            },
        )
    }

    /// Maximum number of link policies kept in memory
    #[must_use]
    pub fn max_stored_policies(&self) -> usize {
        env::var("MAX_STORED_POLICIES")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .filter(|val| *val > 0)
            .unwrap_or(DEFAULT_MAX_LINK_POLICIES)
    }

    /// Key of the development digest proof system
    #[must_use]
    pub fn dev_circuit_key(&self) -> Vec<u8> {
        env::var("DEV_CIRCUIT_KEY")
            .unwrap_or_else(|_| "development-circuit-key".to_string())
            .into_bytes()
    }

    /// Maximum number of verifications running at the same time
    #[must_use]
    pub fn verify_max_concurrency(&self) -> usize {
        env::var("VERIFY_MAX_CONCURRENCY")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .filter(|val| *val > 0)
            .unwrap_or(DEFAULT_VERIFY_MAX_CONCURRENCY)
    }

    /// Maximum number of verifications waiting for a slot
    #[must_use]
    pub fn verify_max_queue(&self) -> usize {
        env::var("VERIFY_MAX_QUEUE")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_VERIFY_MAX_QUEUE)
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development { .. } | Self::Staging)
    }

    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development { .. } => Level::DEBUG,
            })
    }
}

fn split_list(val: &str) -> impl Iterator<Item = &str> {
    val.split(',').map(str::trim).filter(|item| !item.is_empty())
}
