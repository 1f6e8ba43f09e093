use std::sync::Arc;

use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use identity_verifier::{
    assemble, AppConfig, ConfigId, ConfigStore, DeepLinkEncoder, DisclosureField, Presentation,
    RequestParams,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::universal_link::fresh_user_id;
use crate::types::{AppError, Environment, ValidatedJson};

const DEFAULT_APP_NAME: &str = "Passport Verification App";

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDeeplinkRequest {
    /// Defaults to "Passport Verification App"
    pub app_name: Option<String>,
    /// Generated when missing
    pub user_id: Option<String>,
    /// Defaults to the configured minimum age
    pub minimum_age: Option<u32>,
    /// Reveal the holder name (default `true`)
    pub require_name: Option<bool>,
    /// ISO 3166-1 alpha-3 codes
    pub excluded_countries: Option<Vec<String>>,
    /// Require an OFAC screening (default `true`)
    pub check_ofac: Option<bool>,
    /// 64-byte hex string (128 characters)
    #[validate(
        required(message = "userDefinedData must be a 64-byte hex string (128 characters)"),
        length(
            equal = 128,
            message = "userDefinedData must be a 64-byte hex string (128 characters)"
        )
    )]
    pub user_defined_data: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDeeplinkResponse {
    pub success: bool,
    pub deeplink: String,
    pub user_id: String,
    #[schemars(with = "serde_json::Value")]
    pub app_config: AppConfig,
    /// ISO-8601 UTC
    pub timestamp: String,
}

/// Generate a deep link
///
/// Builds a verification request from the given policy and encodes it as a link. The
/// policy is stored for the link, so `/verify` enforces it on proofs made from the link.
/// Configurations that don't fit into a QR code are rejected with `config_too_large`.
#[instrument(skip_all)]
pub async fn generate_deeplink(
    Extension(environment): Extension<Environment>,
    Extension(encoder): Extension<Arc<DeepLinkEncoder>>,
    Extension(config_store): Extension<Arc<dyn ConfigStore>>,
    ValidatedJson(payload): ValidatedJson<GenerateDeeplinkRequest>,
) -> Result<Json<GenerateDeeplinkResponse>, AppError> {
    let user_id_kind = environment.user_id_kind();

    let mut revealed_fields = vec![DisclosureField::Nationality];
    if payload.require_name.unwrap_or(true) {
        revealed_fields.push(DisclosureField::Name);
    }

    let request = assemble(
        RequestParams {
            scope: environment.scope(),
            endpoint: environment.verification_endpoint(),
            user_id: payload
                .user_id
                .unwrap_or_else(|| fresh_user_id(user_id_kind)),
            user_id_kind,
            user_defined_data: payload.user_defined_data,
            minimum_age: payload.minimum_age,
            excluded_countries: payload.excluded_countries,
            ofac_check: Some(payload.check_ofac.unwrap_or(true)),
            revealed_fields,
        },
        &environment.policy_defaults(),
    )?;

    let presentation = Presentation {
        app_name: payload
            .app_name
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        ..environment.presentation()
    };
    let app_config = AppConfig::from_request(&request, presentation, Uuid::new_v4());
    let deeplink = encoder.encode(&app_config)?;
    config_store
        .upsert(
            ConfigId::for_request(&request),
            request.disclosure_policy().clone(),
        )
        .await?;

    Ok(Json(GenerateDeeplinkResponse {
        success: true,
        deeplink,
        user_id: app_config.user_id.clone(),
        app_config,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
