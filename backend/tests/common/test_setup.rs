use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::{body::Body, http::Request, response::Response, Extension, Router};
use backend::{pool::VerificationPool, routes, types::Environment};
use identity_verifier::{
    constants::DEFAULT_UNIVERSAL_LINK_BASE,
    testing::{TEST_CIRCUIT_KEY, TEST_SCOPE},
    ConfigId, ConfigStore, DeepLinkEncoder, DigestProofSystem, DisclosureField, DisclosurePolicy,
    InMemoryConfigStore, ProofSystem, ProofVerifier, UserIdKind, VerifierConfig,
};
use tower::ServiceExt;

/// Setup test environment variables with all the required configuration
pub fn setup_test_env() {
    // Load test environment variables
    dotenvy::from_path(".env.example").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Policy enforced by default: adults only, nationality revealed
pub fn default_policy() -> DisclosurePolicy {
    DisclosurePolicy::new(Some(18), [], false, [DisclosureField::Nationality])
        .expect("Default policy is valid")
}

/// Knobs for the service under test
pub struct TestOptions {
    pub proof_system: Arc<dyn ProofSystem>,
    /// Scope policy; `None` leaves the config store empty
    pub policy: Option<DisclosurePolicy>,
    /// Check proofs without an issued link against the scope policy
    pub scope_fallback: bool,
    pub max_concurrency: usize,
    pub max_queue: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            proof_system: Arc::new(DigestProofSystem::new(TEST_CIRCUIT_KEY)),
            policy: Some(default_policy()),
            scope_fallback: true,
            max_concurrency: 4,
            max_queue: 64,
        }
    }
}

/// Base test setup with core dependencies
pub struct TestSetup {
    pub router: Router,
    pub environment: Environment,
    pub pool: Arc<VerificationPool>,
    /// Issues proofs the default proof system accepts
    pub prover: DigestProofSystem,
}

impl TestSetup {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        setup_test_env();

        let environment = Environment::Development {
            verification_keys_dir: None,
        };

        let config =
            VerifierConfig::new(TEST_SCOPE, UserIdKind::Hex).expect("Test scope is valid");
        let verifier = Arc::new(ProofVerifier::new(config, options.proof_system));

        let mut store = InMemoryConfigStore::new();
        if let Some(policy) = options.policy {
            if options.scope_fallback {
                store = store.with_fallback(policy.clone());
            }
            store = store.with_policy(ConfigId::from_scope(TEST_SCOPE), policy);
        }
        let config_store: Arc<dyn ConfigStore> = Arc::new(store);

        let pool = Arc::new(VerificationPool::new(
            options.max_concurrency,
            options.max_queue,
        ));
        let encoder = Arc::new(
            DeepLinkEncoder::new(DEFAULT_UNIVERSAL_LINK_BASE).expect("Default link base is valid"),
        );

        let mut openapi = OpenApi::default();
        let router = routes::handler()
            .finish_api(&mut openapi)
            .layer(Extension(openapi))
            .layer(Extension(environment.clone()))
            .layer(Extension(verifier))
            .layer(Extension(config_store))
            .layer(Extension(pool.clone()))
            .layer(Extension(encoder));

        Self {
            router,
            environment,
            pool,
            prover: DigestProofSystem::new(TEST_CIRCUIT_KEY),
        }
    }

    pub async fn send_post_request(
        &self,
        route: &str,
        payload: serde_json::Value,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", "application/json")
            .body(Body::from(payload.to_string()))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_get_request(
        &self,
        route: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }
}
