use std::sync::Arc;

use axum::{Extension, Json};
use identity_verifier::{
    assemble, AppConfig, ConfigId, ConfigStore, DeepLinkEncoder, DisclosureField, RequestParams,
    UserDefinedData, UserIdKind,
};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::types::{AppError, Environment};

/// Label bound into demo links as user defined data
const DEMO_USER_DEFINED_DATA: &str = "Identity Check!";

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UniversalLinkResponse {
    pub success: bool,
    /// Link the companion app opens, also rendered as a QR code
    pub universal_link: String,
    pub user_id: String,
    /// App configuration carried by the link
    #[schemars(with = "serde_json::Value")]
    pub app_config: AppConfig,
}

/// Fresh user identifier of the configured kind
pub(super) fn fresh_user_id(kind: UserIdKind) -> String {
    match kind {
        UserIdKind::Hex => format!("0x{}", hex::encode(rand::random::<[u8; 20]>())),
        UserIdKind::Uuid => Uuid::new_v4().to_string(),
    }
}

/// Generate a universal link
///
/// Builds a verification request for a fresh user with the configured scope, endpoint
/// and default policy, revealing nationality. The policy is stored for the link.
#[instrument(skip_all)]
pub async fn universal_link(
    Extension(environment): Extension<Environment>,
    Extension(encoder): Extension<Arc<DeepLinkEncoder>>,
    Extension(config_store): Extension<Arc<dyn ConfigStore>>,
) -> Result<Json<UniversalLinkResponse>, AppError> {
    let user_id_kind = environment.user_id_kind();
    let user_defined_data = UserDefinedData::from_text(DEMO_USER_DEFINED_DATA)?;

    let request = assemble(
        RequestParams {
            scope: environment.scope(),
            endpoint: environment.verification_endpoint(),
            user_id: fresh_user_id(user_id_kind),
            user_id_kind,
            user_defined_data: Some(user_defined_data.to_hex()),
            minimum_age: None,
            excluded_countries: None,
            ofac_check: None,
            revealed_fields: vec![DisclosureField::Nationality],
        },
        &environment.policy_defaults(),
    )?;

    let app_config = AppConfig::from_request(&request, environment.presentation(), Uuid::new_v4());
    let universal_link = encoder.encode(&app_config)?;
    config_store
        .upsert(
            ConfigId::for_request(&request),
            request.disclosure_policy().clone(),
        )
        .await?;

    tracing::debug!(session_id = %app_config.session_id, "Universal link generated");

    Ok(Json(UniversalLinkResponse {
        success: true,
        universal_link,
        user_id: app_config.user_id.clone(),
        app_config,
    }))
}

#[cfg(test)]
mod tests {
    use identity_verifier::UserId;

    use super::*;

    #[test]
    fn test_fresh_user_ids_parse_as_their_kind() {
        for kind in [UserIdKind::Hex, UserIdKind::Uuid] {
            let user_id = fresh_user_id(kind);
            assert_eq!(UserId::parse(&user_id, kind).unwrap().kind(), kind);
        }
        assert_ne!(
            fresh_user_id(UserIdKind::Hex),
            fresh_user_id(UserIdKind::Hex)
        );
    }
}
