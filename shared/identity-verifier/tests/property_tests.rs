//! Property-based tests for identity-verifier
//!
//! These tests use proptest to check link encoding and verification invariants across
//! a wide range of inputs.

#[cfg(test)]
mod strategies {
    use identity_verifier::{DisclosureField, EndpointType, UserIdKind};
    use proptest::prelude::*;

    pub const COUNTRIES: [&str; 6] = ["UTO", "PRK", "IRN", "FRA", "DEU", "D<<"];

    pub const FIELDS: [DisclosureField; 9] = [
        DisclosureField::IssuingState,
        DisclosureField::Name,
        DisclosureField::DocumentNumber,
        DisclosureField::Nationality,
        DisclosureField::DateOfBirth,
        DisclosureField::Gender,
        DisclosureField::ExpiryDate,
        DisclosureField::OlderThan,
        DisclosureField::Ofac,
    ];

    /// Display text with URL-significant characters and non-ASCII letters
    pub fn display_text() -> impl Strategy<Value = String> {
        "[A-Za-zé漢][A-Za-z0-9&+=?#% éü漢字🛂]{0,24}"
    }

    pub fn user_id() -> impl Strategy<Value = (String, UserIdKind)> {
        prop_oneof![
            prop::array::uniform20(any::<u8>())
                .prop_map(|bytes| (format!("0x{}", hex::encode(bytes)), UserIdKind::Hex)),
            any::<u128>().prop_map(|id| (uuid::Uuid::from_u128(id).to_string(), UserIdKind::Uuid)),
        ]
    }

    pub fn user_defined_data() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop::collection::vec(any::<u8>(), 64).prop_map(hex::encode))
    }

    pub fn countries() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(COUNTRIES.to_vec()), 0..8)
            .prop_map(|codes| codes.into_iter().map(str::to_string).collect())
    }

    pub fn fields() -> impl Strategy<Value = Vec<DisclosureField>> {
        prop::collection::vec(prop::sample::select(FIELDS.to_vec()), 0..12)
    }

    pub fn endpoint_type() -> impl Strategy<Value = EndpointType> {
        prop::sample::select(vec![
            EndpointType::Https,
            EndpointType::StagingHttps,
            EndpointType::Celo,
            EndpointType::StagingCelo,
        ])
    }
}

#[cfg(test)]
mod deep_link_properties {
    use identity_verifier::{
        assemble, constants::DEFAULT_UNIVERSAL_LINK_BASE, AppConfig, DeepLinkEncoder,
        DisclosureField, EndpointType, PolicyDefaults, Presentation, RequestParams, UserIdKind,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::strategies::*;

    struct Draft {
        user_id: (String, UserIdKind),
        user_defined_data: Option<String>,
        minimum_age: Option<u32>,
        countries: Vec<String>,
        ofac_check: bool,
        fields: Vec<DisclosureField>,
    }

    fn app_config(draft: Draft, presentation: Presentation, session_id: Uuid) -> AppConfig {
        let request = assemble(
            RequestParams {
                scope: "passport-verify".to_string(),
                endpoint: "https://verify.example.com/api/verify".to_string(),
                user_id: draft.user_id.0,
                user_id_kind: draft.user_id.1,
                user_defined_data: draft.user_defined_data,
                minimum_age: draft.minimum_age,
                excluded_countries: Some(draft.countries),
                ofac_check: Some(draft.ofac_check),
                revealed_fields: draft.fields,
            },
            &PolicyDefaults::default(),
        )
        .expect("Generated parameters are valid");
        AppConfig::from_request(&request, presentation, session_id)
    }

    fn presentation(
        app_name: String,
        header: String,
        endpoint_type: EndpointType,
        deeplink_callback: Option<String>,
    ) -> Presentation {
        Presentation {
            app_name,
            logo_base64: "https://example.com/logo.png".to_string(),
            endpoint_type,
            dev_mode: false,
            header,
            deeplink_callback,
        }
    }

    fn encoder() -> DeepLinkEncoder {
        DeepLinkEncoder::new(DEFAULT_UNIVERSAL_LINK_BASE).expect("Default base is valid")
    }

    proptest! {
        /// Decoding an encoded link gives back the same configuration
        #[test]
        fn link_round_trip(
            app_name in display_text(),
            header in prop::option::of(display_text()),
            endpoint_type in endpoint_type(),
            callback in prop::option::of("https://example\\.com/done\\?next=[a-z0-9&+ ]{0,12}"),
            user_id in user_id(),
            user_defined_data in user_defined_data(),
            minimum_age in prop::option::of(0u32..=99),
            countries in countries(),
            ofac_check in any::<bool>(),
            fields in fields(),
            session_id in any::<u128>(),
        ) {
            let config = app_config(
                Draft { user_id, user_defined_data, minimum_age, countries, ofac_check, fields },
                presentation(app_name, header.unwrap_or_default(), endpoint_type, callback),
                Uuid::from_u128(session_id),
            );

            let link = encoder().encode(&config).expect("Config fits into a link");
            let decoded = encoder().decode(&link).expect("Link decodes");

            prop_assert_eq!(decoded, config);
        }

        /// Policy sets are canonical: insertion order doesn't change the link
        #[test]
        fn link_ignores_insertion_order(
            app_name in display_text(),
            user_id in user_id(),
            minimum_age in prop::option::of(0u32..=99),
            countries in countries(),
            ofac_check in any::<bool>(),
            fields in fields(),
        ) {
            let session_id = Uuid::from_u128(7);
            let draft = |countries: Vec<String>, fields: Vec<DisclosureField>| Draft {
                user_id: user_id.clone(),
                user_defined_data: None,
                minimum_age,
                countries,
                ofac_check,
                fields,
            };
            let shown = || presentation(app_name.clone(), String::new(), EndpointType::Https, None);

            let mut reversed_countries = countries.clone();
            reversed_countries.reverse();
            let mut reversed_fields = fields.clone();
            reversed_fields.reverse();

            let forward = encoder()
                .encode(&app_config(draft(countries, fields), shown(), session_id))
                .expect("Config fits into a link");
            let backward = encoder()
                .encode(&app_config(
                    draft(reversed_countries, reversed_fields),
                    shown(),
                    session_id,
                ))
                .expect("Config fits into a link");

            prop_assert_eq!(forward.as_bytes(), backward.as_bytes());
        }
    }
}

#[cfg(test)]
mod verification_properties {
    use std::sync::Arc;

    use identity_verifier::{
        testing::{AttestationFixture, TEST_CIRCUIT_KEY, TEST_SCOPE},
        CountryCode, DigestProofSystem, DisclosureField, DisclosurePolicy, ProofVerifier,
        UserIdKind, VerificationResult, VerifierConfig,
    };
    use proptest::prelude::*;

    use super::strategies::*;

    fn verify(fixture: &AttestationFixture, policy: &DisclosurePolicy) -> VerificationResult {
        let prover = DigestProofSystem::new(TEST_CIRCUIT_KEY);
        let config = VerifierConfig::new(TEST_SCOPE, UserIdKind::Hex).expect("Test scope is valid");
        let verifier = ProofVerifier::new(config, Arc::new(prover.clone()));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("Failed to build runtime");
        runtime
            .block_on(verifier.verify(
                fixture.attestation_id(),
                &fixture.prove(&prover),
                &fixture.public_signals(),
                &fixture.user_context_data(),
                policy,
            ))
            .expect("Digest verification is always available")
    }

    fn random_policy() -> impl Strategy<Value = DisclosurePolicy> {
        (
            prop::option::of(0u8..=99),
            countries(),
            any::<bool>(),
            fields(),
        )
            .prop_map(|(minimum_age, countries, ofac_check, fields)| {
                let countries = countries
                    .iter()
                    .map(|code| CountryCode::parse(code).expect("Generated codes are valid"));
                DisclosurePolicy::new(minimum_age, countries, ofac_check, fields)
                    .expect("Generated policies are within limits")
            })
    }

    fn random_holder() -> impl Strategy<Value = AttestationFixture> {
        (
            any::<bool>(),
            0u8..=99,
            prop::sample::select(COUNTRIES.to_vec()),
            any::<bool>(),
        )
            .prop_map(|(passport, older_than, nationality, listed)| {
                let fixture = if passport {
                    AttestationFixture::passport(TEST_SCOPE)
                } else {
                    AttestationFixture::eu_id_card(TEST_SCOPE)
                };
                let fixture = fixture
                    .with_older_than(older_than)
                    .with_field(DisclosureField::Nationality, nationality.as_bytes());
                if listed {
                    fixture.with_ofac_listed()
                } else {
                    fixture
                }
            })
    }

    proptest! {
        /// Verifying the same attestation twice gives the same result
        #[test]
        fn verify_is_deterministic(holder in random_holder(), policy in random_policy()) {
            prop_assert_eq!(verify(&holder, &policy), verify(&holder, &policy));
        }

        /// Results never disclose a field the policy doesn't reveal
        #[test]
        fn disclosures_stay_within_policy(holder in random_holder(), policy in random_policy()) {
            let result = verify(&holder, &policy);

            if result.is_valid() {
                prop_assert!(result
                    .disclosures()
                    .keys()
                    .all(|field| policy.revealed_fields().contains(field)));
            } else {
                prop_assert!(result.disclosures().is_empty());
            }
        }
    }
}
