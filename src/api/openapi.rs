use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use super::handlers::{health, login, sessions, twofactor};

/// The generated OpenAPI document for the served routes.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the OpenAPI document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both
/// served and documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Login, logout, and lockout handling".to_string());

    let mut twofa_tag = Tag::new("2fa");
    twofa_tag.description = Some("TOTP enrollment, verification, and backup codes".to_string());

    let mut sessions_tag = Tag::new("sessions");
    sessions_tag.description = Some("Per-device session listing and revocation".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![auth_tag, twofa_tag, sessions_tag]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path.
    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(login::login))
        .routes(routes!(login::logout))
        .routes(routes!(
            twofactor::two_factor_status,
            twofactor::two_factor_manage
        ))
        .routes(routes!(
            sessions::list_sessions,
            sessions::revoke_sessions
        ))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    OpenApiBuilder::new().info(info).build()
}
