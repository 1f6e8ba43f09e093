mod deep_link;
mod docs;
mod health;
mod universal_link;
mod verify;

use aide::axum::{
    routing::{get, post},
    ApiRouter,
};

pub use deep_link::{GenerateDeeplinkRequest, GenerateDeeplinkResponse};
pub use universal_link::UniversalLinkResponse;
pub use verify::{VerifyRequest, VerifyResponse, VerifyStatus};

/// Creates the router with all handler routes
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .merge(docs::handler())
        .api_route("/health", get(health::handler))
        .api_route("/verify", post(verify::verify))
        .api_route("/api/verify", post(verify::verify))
        .api_route("/universallink", get(universal_link::universal_link))
        .api_route("/api/universallink", get(universal_link::universal_link))
        .api_route("/generate-deeplink", post(deep_link::generate_deeplink))
}
