//! OpenAPI documentation for the `/api/v1` surface.
//!
//! Served as JSON at `/api/v1/openapi.json`, with an interactive viewer at `/api/docs` when
//! `enable_docs` is set.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, errors};

/// Bearer access token scheme referenced by every authenticated path.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from `/auth/login` or `/auth/register`:\n\n\
                            ```\nAuthorization: Bearer ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "quotactl",
        description = "Accounts, per-account resource quotas and owned resources."
    ),
    servers(
        (url = "/api/v1", description = "REST API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::users::get_me,
        api::handlers::users::update_me,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::delete_user,
        api::handlers::users::get_user_options,
        api::handlers::users::update_user_options,
        api::handlers::resources::list_resources,
        api::handlers::resources::create_resource,
        api::handlers::resources::get_resource,
        api::handlers::resources::delete_resource,
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::TokenPairResponse,
            api::models::users::ProfileResponse,
            api::models::users::ProfileUpdate,
            api::models::users::UserCreate,
            api::models::users::UserResponse,
            api::models::users::OptionsResponse,
            api::models::users::OptionsUpdate,
            api::models::resources::ResourceCreate,
            api::models::resources::ResourceResponse,
            errors::ErrorBody,
        )
    ),
    tags(
        (name = "authentication", description = "Registration and login"),
        (name = "users", description = "Profiles, account management and quotas"),
        (name = "resources", description = "Quota-limited resources owned by accounts"),
    )
)]
pub struct ApiDoc;
