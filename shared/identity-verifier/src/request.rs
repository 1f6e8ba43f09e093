use std::collections::BTreeSet;

use url::Url;

use crate::constants::MAX_SCOPE_LEN;
use crate::error::ValidationError;
use crate::types::{
    CountryCode, DisclosureField, DisclosurePolicy, UserDefinedData, UserId, UserIdKind,
};

/// Policy values used when a request leaves them out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDefaults {
    pub minimum_age: Option<u8>,
    pub excluded_countries: BTreeSet<CountryCode>,
    pub ofac_check: bool,
}

impl PolicyDefaults {
    /// Builds a policy from the defaults alone.
    ///
    /// # Errors
    /// Returns an error if the defaults violate the policy limits.
    pub fn policy(
        &self,
        revealed_fields: impl IntoIterator<Item = DisclosureField>,
    ) -> Result<DisclosurePolicy, ValidationError> {
        DisclosurePolicy::new(
            self.minimum_age,
            self.excluded_countries.iter().copied(),
            self.ofac_check,
            revealed_fields,
        )
    }
}

/// Raw, unvalidated inputs for [`assemble`].
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub scope: String,
    pub endpoint: String,
    pub user_id: String,
    pub user_id_kind: UserIdKind,
    /// 128 hex characters when present
    pub user_defined_data: Option<String>,
    pub minimum_age: Option<u32>,
    pub excluded_countries: Option<Vec<String>>,
    pub ofac_check: Option<bool>,
    pub revealed_fields: Vec<DisclosureField>,
}

/// A validated verification request. Only [`assemble`] produces one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    scope: String,
    endpoint: Url,
    user_id: UserId,
    user_defined_data: Option<UserDefinedData>,
    disclosure_policy: DisclosurePolicy,
}

impl VerificationRequest {
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub const fn user_id_kind(&self) -> UserIdKind {
        self.user_id.kind()
    }

    #[must_use]
    pub const fn user_defined_data(&self) -> Option<&UserDefinedData> {
        self.user_defined_data.as_ref()
    }

    #[must_use]
    pub const fn disclosure_policy(&self) -> &DisclosurePolicy {
        &self.disclosure_policy
    }
}

/// Validates request parameters and builds a canonical [`VerificationRequest`].
///
/// Policy values missing from `params` are taken from `defaults`.
///
/// # Errors
/// Returns the first [`ValidationError`] found. `userDefinedData` and `userId` are
/// checked before the scope, endpoint and policy.
pub fn assemble(
    params: RequestParams,
    defaults: &PolicyDefaults,
) -> Result<VerificationRequest, ValidationError> {
    let user_defined_data = params
        .user_defined_data
        .as_deref()
        .map(UserDefinedData::from_hex)
        .transpose()?;
    let user_id = UserId::parse(&params.user_id, params.user_id_kind)?;

    validate_scope(&params.scope)?;
    let endpoint = validate_endpoint(&params.endpoint)?;

    let minimum_age = match params.minimum_age {
        Some(age) => Some(u8::try_from(age).map_err(|_| ValidationError::InvalidMinimumAge)?),
        None => defaults.minimum_age,
    };

    let excluded_countries = match params.excluded_countries {
        Some(codes) => codes
            .iter()
            .map(|code| CountryCode::parse(code))
            .collect::<Result<BTreeSet<_>, _>>()?,
        None => defaults.excluded_countries.clone(),
    };

    let disclosure_policy = DisclosurePolicy::new(
        minimum_age,
        excluded_countries,
        params.ofac_check.unwrap_or(defaults.ofac_check),
        params.revealed_fields,
    )?;

    Ok(VerificationRequest {
        scope: params.scope,
        endpoint,
        user_id,
        user_defined_data,
        disclosure_policy,
    })
}

/// Scopes are hashed into a single field element and must be short printable ASCII.
pub(crate) fn validate_scope(scope: &str) -> Result<(), ValidationError> {
    let printable = scope.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if scope.is_empty() || scope.len() > MAX_SCOPE_LEN || !printable {
        return Err(ValidationError::InvalidScope);
    }
    Ok(())
}

pub(crate) fn validate_endpoint(endpoint: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(endpoint).map_err(|_| ValidationError::InvalidEndpoint)?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ValidationError::InvalidEndpoint);
    }
    Ok(url)
}
