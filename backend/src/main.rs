use std::sync::Arc;

use backend::{pool::VerificationPool, server, types::Environment};
use identity_verifier::{
    ConfigId, ConfigStore, DeepLinkEncoder, DigestProofSystem, Groth16ProofSystem,
    InMemoryConfigStore, ProofSystem, ProofVerifier, VerifierConfig,
};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env();

    // Configure logging format based on environment
    // Use JSON format for staging/production (Datadog), regular format for development
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();
    match environment {
        Environment::Production | Environment::Staging => {
            fmt().json().with_env_filter(env_filter).init();
        }
        Environment::Development { .. } => {
            fmt().with_env_filter(env_filter).init();
        }
    }

    let allowed_attestations = environment.allowed_attestations();
    let proof_system: Arc<dyn ProofSystem> = match environment.verification_keys_dir() {
        Some(dir) => Arc::new(Groth16ProofSystem::from_key_dir(
            dir,
            allowed_attestations.iter().copied(),
        )?),
        None => {
            tracing::warn!(
                "VERIFICATION_KEYS_DIR not set, using the development digest proof system"
            );
            Arc::new(DigestProofSystem::new(environment.dev_circuit_key()))
        }
    };

    let scope = environment.scope();
    let config = VerifierConfig::new(scope.clone(), environment.user_id_kind())?
        .with_allowed_attestations(allowed_attestations);
    let verifier = Arc::new(ProofVerifier::new(config, proof_system));

    let scope_policy = environment.verification_policy()?;
    let mut store = InMemoryConfigStore::new()
        .with_max_link_policies(environment.max_stored_policies())
        .with_policy(ConfigId::from_scope(&scope), scope_policy.clone());
    if environment.scope_policy_fallback() {
        tracing::info!("Proofs without an issued link are checked against the scope policy");
        store = store.with_fallback(scope_policy);
    }
    let config_store: Arc<dyn ConfigStore> = Arc::new(store);

    let pool = Arc::new(VerificationPool::new(
        environment.verify_max_concurrency(),
        environment.verify_max_queue(),
    ));

    let encoder = Arc::new(DeepLinkEncoder::new(&environment.universal_link_base())?);

    server::start(environment, verifier, config_store, pool, encoder).await
}
