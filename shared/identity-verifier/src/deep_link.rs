use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::constants::{
    APP_CONFIG_VERSION, DEEP_LINK_PAYLOAD_PARAM, MAX_DEEP_LINK_FIELD_LEN, MAX_DEEP_LINK_LEN,
};
use crate::error::{DeepLinkError, ValidationError};
use crate::request::{validate_endpoint, validate_scope, VerificationRequest};
use crate::types::{DisclosurePolicy, EndpointType, UserDefinedData, UserId, UserIdKind};

/// How the companion app presents a verification request to the holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub app_name: String,
    /// Logo as a URL or base64 image
    pub logo_base64: String,
    pub endpoint_type: EndpointType,
    pub dev_mode: bool,
    pub header: String,
    pub deeplink_callback: Option<String>,
}

/// Configuration the companion app opens from a deep link or QR code.
///
/// Field order is the serialization order, and policy sets are ordered, so equal
/// configurations always produce equal links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub version: u8,
    pub app_name: String,
    pub logo_base64: String,
    pub endpoint: String,
    pub endpoint_type: EndpointType,
    pub scope: String,
    pub session_id: Uuid,
    pub user_id: String,
    pub user_id_type: UserIdKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_defined_data: Option<String>,
    pub disclosures: DisclosurePolicy,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deeplink_callback: Option<String>,
}

impl AppConfig {
    /// Builds the configuration for one render of `request`.
    #[must_use]
    pub fn from_request(
        request: &VerificationRequest,
        presentation: Presentation,
        session_id: Uuid,
    ) -> Self {
        Self {
            version: APP_CONFIG_VERSION,
            app_name: presentation.app_name,
            logo_base64: presentation.logo_base64,
            endpoint: request.endpoint().to_string(),
            endpoint_type: presentation.endpoint_type,
            scope: request.scope().to_string(),
            session_id,
            user_id: request.user_id().to_string(),
            user_id_type: request.user_id_kind(),
            user_defined_data: request.user_defined_data().map(UserDefinedData::to_hex),
            disclosures: request.disclosure_policy().clone(),
            dev_mode: presentation.dev_mode,
            header: presentation.header,
            deeplink_callback: presentation.deeplink_callback,
        }
    }

    /// Checks the request invariants a decoded configuration must still satisfy.
    ///
    /// # Errors
    /// Returns the first violated [`ValidationError`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version != APP_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion(self.version));
        }
        if self.app_name.trim().is_empty() {
            return Err(ValidationError::InvalidAppName);
        }

        validate_scope(&self.scope)?;
        validate_endpoint(&self.endpoint)?;
        UserId::parse(&self.user_id, self.user_id_type)?;
        if let Some(data) = &self.user_defined_data {
            UserDefinedData::from_hex(data)?;
        }

        Ok(())
    }

    fn string_fields(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("appName", Some(self.app_name.as_str())),
            ("logoBase64", Some(self.logo_base64.as_str())),
            ("endpoint", Some(self.endpoint.as_str())),
            ("scope", Some(self.scope.as_str())),
            ("userId", Some(self.user_id.as_str())),
            ("userDefinedData", self.user_defined_data.as_deref()),
            ("header", Some(self.header.as_str())),
            ("deeplinkCallback", self.deeplink_callback.as_deref()),
        ]
    }
}

/// Encodes app configurations into universal links and back.
///
/// Links have the form `{base}?selfApp={url-encoded JSON}`.
#[derive(Debug, Clone)]
pub struct DeepLinkEncoder {
    base: Url,
}

impl DeepLinkEncoder {
    /// # Errors
    /// Returns [`DeepLinkError::InvalidUri`] if `base` is not an absolute URL.
    pub fn new(base: &str) -> Result<Self, DeepLinkError> {
        let base = Url::parse(base).map_err(|e| DeepLinkError::InvalidUri(e.to_string()))?;
        Ok(Self { base })
    }

    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Serializes `config` into a link.
    ///
    /// # Errors
    /// Returns [`DeepLinkError::Invalid`] if the configuration is invalid and
    /// [`DeepLinkError::ConfigTooLarge`] if a field or the link exceeds its size limit.
    pub fn encode(&self, config: &AppConfig) -> Result<String, DeepLinkError> {
        config.validate()?;

        for (field, value) in config.string_fields() {
            let size = value.map_or(0, str::len);
            if size > MAX_DEEP_LINK_FIELD_LEN {
                return Err(DeepLinkError::ConfigTooLarge {
                    field,
                    size,
                    limit: MAX_DEEP_LINK_FIELD_LEN,
                });
            }
        }

        let payload = serde_json::to_string(config)
            .map_err(|e| DeepLinkError::MalformedPayload(e.to_string()))?;

        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair(DEEP_LINK_PAYLOAD_PARAM, &payload);
        let link = String::from(url);

        if link.len() > MAX_DEEP_LINK_LEN {
            return Err(DeepLinkError::ConfigTooLarge {
                field: "link",
                size: link.len(),
                limit: MAX_DEEP_LINK_LEN,
            });
        }

        Ok(link)
    }

    /// Parses a link produced by [`DeepLinkEncoder::encode`].
    ///
    /// Any base is accepted; only the payload parameter is read.
    ///
    /// # Errors
    /// Returns a [`DeepLinkError`] describing why the link can't be decoded.
    pub fn decode(&self, link: &str) -> Result<AppConfig, DeepLinkError> {
        let url = Url::parse(link).map_err(|e| DeepLinkError::InvalidUri(e.to_string()))?;

        let payload = url
            .query_pairs()
            .find(|(key, _)| key == DEEP_LINK_PAYLOAD_PARAM)
            .map(|(_, value)| value.into_owned())
            .ok_or(DeepLinkError::MissingPayload)?;

        let config: AppConfig = serde_json::from_str(&payload)
            .map_err(|e| DeepLinkError::MalformedPayload(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::constants::DEFAULT_UNIVERSAL_LINK_BASE;
    use crate::request::{assemble, PolicyDefaults, RequestParams};
    use crate::types::{CountryCode, DisclosureField};

    fn request() -> VerificationRequest {
        assemble(
            RequestParams {
                scope: "self-workshop".to_string(),
                endpoint: "https://verify.example.com/api/verify".to_string(),
                user_id: "0x00000000000000000000000000000000000000aa".to_string(),
                user_id_kind: UserIdKind::Hex,
                user_defined_data: Some("00".repeat(64)),
                minimum_age: Some(18),
                excluded_countries: Some(vec!["PRK".to_string(), "IRN".to_string()]),
                ofac_check: Some(true),
                revealed_fields: vec![DisclosureField::Nationality, DisclosureField::Name],
            },
            &PolicyDefaults::default(),
        )
        .unwrap()
    }

    fn presentation() -> Presentation {
        Presentation {
            app_name: "Self Workshop".to_string(),
            logo_base64: "https://i.postimg.cc/mrmVf9hm/self.png".to_string(),
            endpoint_type: EndpointType::StagingHttps,
            dev_mode: false,
            header: String::new(),
            deeplink_callback: None,
        }
    }

    fn config() -> AppConfig {
        AppConfig::from_request(&request(), presentation(), Uuid::new_v4())
    }

    fn encoder() -> DeepLinkEncoder {
        DeepLinkEncoder::new(DEFAULT_UNIVERSAL_LINK_BASE).unwrap()
    }

    #[test]
    fn test_from_request() {
        let config = config();
        assert_eq!(config.version, APP_CONFIG_VERSION);
        assert_eq!(config.scope, "self-workshop");
        assert_eq!(config.user_id, "0x00000000000000000000000000000000000000aa");
        assert_eq!(config.user_id_type, UserIdKind::Hex);
        assert!(config.disclosures.reveals(DisclosureField::OlderThan));
        assert!(config.disclosures.reveals(DisclosureField::Ofac));
    }

    #[test]
    fn test_round_trip() {
        let encoder = encoder();
        let config = config();
        let link = encoder.encode(&config).unwrap();

        assert!(link.starts_with("https://redirect.self.xyz/?selfApp="));
        assert_eq!(encoder.decode(&link).unwrap(), config);
    }

    #[test]
    fn test_encoding_is_canonical() {
        let encoder = encoder();
        let config = config();

        // Same policy, countries inserted in a different order
        let mut reordered = config.clone();
        reordered.disclosures = DisclosurePolicy::new(
            Some(18),
            [CountryCode::parse("IRN").unwrap(), CountryCode::parse("PRK").unwrap()],
            true,
            [DisclosureField::Name, DisclosureField::Nationality],
        )
        .unwrap();

        assert_eq!(encoder.encode(&config).unwrap(), encoder.encode(&reordered).unwrap());
    }

    #[test]
    fn test_camel_case_payload() {
        let json = serde_json::to_value(config()).unwrap();
        assert_eq!(json["appName"], "Self Workshop");
        assert_eq!(json["endpointType"], "staging_https");
        assert_eq!(json["userIdType"], "hex");
        assert_eq!(json["disclosures"]["minimumAge"], 18);
        assert_eq!(json["disclosures"]["ofac"], true);
        assert!(json.get("deeplinkCallback").is_none());
    }

    #[test]
    fn test_field_too_large() {
        let mut config = config();
        config.header = "h".repeat(MAX_DEEP_LINK_FIELD_LEN + 1);

        assert_eq!(
            encoder().encode(&config),
            Err(DeepLinkError::ConfigTooLarge {
                field: "header",
                size: MAX_DEEP_LINK_FIELD_LEN + 1,
                limit: MAX_DEEP_LINK_FIELD_LEN,
            })
        );
    }

    #[test]
    fn test_link_too_large() {
        let mut config = config();
        config.header = "h".repeat(MAX_DEEP_LINK_FIELD_LEN);
        config.logo_base64 = "l".repeat(MAX_DEEP_LINK_FIELD_LEN);
        config.deeplink_callback = Some(format!("https://example.com/{}", "c".repeat(900)));

        match encoder().encode(&config) {
            Err(DeepLinkError::ConfigTooLarge { field, size, limit }) => {
                assert_eq!(field, "link");
                assert!(size > limit);
            }
            other => panic!("expected ConfigTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_rejects_invalid_config() {
        let mut config = config();
        config.user_defined_data = Some("abc".to_string());
        assert_eq!(
            encoder().encode(&config),
            Err(DeepLinkError::Invalid(ValidationError::InvalidUserData))
        );

        let mut config = self::config();
        config.version = 1;
        assert_eq!(
            encoder().encode(&config),
            Err(DeepLinkError::Invalid(ValidationError::UnsupportedVersion(1)))
        );
    }

    #[test]
    fn test_decode_errors() {
        let encoder = encoder();

        assert!(matches!(
            encoder.decode("not a uri"),
            Err(DeepLinkError::InvalidUri(_))
        ));
        assert_eq!(
            encoder.decode("https://redirect.self.xyz/?other=1"),
            Err(DeepLinkError::MissingPayload)
        );
        assert!(matches!(
            encoder.decode("https://redirect.self.xyz/?selfApp=%7Bnope"),
            Err(DeepLinkError::MalformedPayload(_))
        ));

        // Well-formed JSON that breaks a request invariant
        let mut json = serde_json::to_value(config()).unwrap();
        json["userId"] = serde_json::json!("not-an-address");
        let mut url = Url::parse(DEFAULT_UNIVERSAL_LINK_BASE).unwrap();
        url.query_pairs_mut()
            .append_pair(DEEP_LINK_PAYLOAD_PARAM, &json.to_string());
        assert_eq!(
            encoder.decode(url.as_str()),
            Err(DeepLinkError::Invalid(ValidationError::InvalidUserId(
                UserIdKind::Hex
            )))
        );
    }

    #[test]
    fn test_decode_keeps_policy_sets_ordered() {
        let encoder = encoder();
        let link = encoder.encode(&config()).unwrap();
        let decoded = encoder.decode(&link).unwrap();

        let countries: Vec<_> = decoded
            .disclosures
            .excluded_countries()
            .iter()
            .map(CountryCode::as_str)
            .collect();
        assert_eq!(countries, ["IRN", "PRK"]);
        assert_eq!(
            decoded.disclosures.revealed_fields(),
            &BTreeSet::from([
                DisclosureField::Name,
                DisclosureField::Nationality,
                DisclosureField::OlderThan,
                DisclosureField::Ofac,
            ])
        );
    }
}
