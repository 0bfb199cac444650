use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, TokenType},
    config::Config,
    db::{
        errors::DbError,
        handlers::{Accounts, Repository},
    },
    errors::{Error, Result},
    types::abbrev_uuid,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Pull the token out of an `Authorization: Bearer <token>` header.
/// Returns:
/// - None: no Authorization header, or a different scheme
/// - Some(Ok(token)): a bearer token is present
/// - Some(Err(error)): the header is not valid UTF-8
fn bearer_token(headers: &HeaderMap) -> Option<Result<&str>> {
    let header = headers.get(AUTHORIZATION)?;
    let value = match header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };
    value.strip_prefix("Bearer ").map(|token| Ok(token.trim()))
}

/// Whether the request carries a bearer token that verifies as an access token.
///
/// Only checks the signature and claims; the account itself is not looked up.
pub fn has_valid_access_token(headers: &HeaderMap, config: &Config) -> bool {
    matches!(
        bearer_token(headers),
        Some(Ok(token)) if session::verify_token(token, TokenType::Access, config).is_ok()
    )
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    /// Verifies the bearer access token, then re-reads the account so that deactivation and
    /// staff changes apply to tokens that were issued earlier.
    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => token?,
            None => {
                trace!("No bearer token found in request");
                return Err(Error::Unauthenticated { message: None });
            }
        };

        let claims = session::verify_token(token, TokenType::Access, &state.config)?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;
        let account = Accounts::new(&mut conn).get_by_id(claims.sub).await?;

        match account {
            Some(account) if account.is_active => {
                debug!("Authenticated account {}", abbrev_uuid(&account.id));
                Ok(CurrentUser::from(account))
            }
            Some(_) => Err(Error::Unauthenticated {
                message: Some("User is inactive".to_string()),
            }),
            None => Err(Error::Unauthenticated {
                message: Some("User not found".to_string()),
            }),
        }
    }
}
