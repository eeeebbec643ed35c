//! Token issuing and verification under `/api/users`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use bookshelf_authz::{AuthError, Claims, CredentialVerifier, IssuedToken, Subject, TokenAuthority};
use bookshelf_http::AppError;
use bookshelf_kernel::{InitCtx, Module};

pub struct UsersModule {
    authority: Arc<TokenAuthority>,
}

impl UsersModule {
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self { authority }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub sub: String,
    pub name: String,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "reader".to_string()
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let verifier: Arc<dyn CredentialVerifier> = self.authority.clone();
        let guarded: Router = Router::new()
            .route("/info", get(info))
            .route_layer(middleware::from_fn_with_state(verifier.clone(), require_credential));
        let verify: Router = Router::new()
            .route("/verify", get(verify_token))
            .with_state(verifier);

        Router::new()
            .route("/token", post(issue_token))
            .with_state(self.authority.clone())
            .merge(verify)
            .merge(guarded)
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "users module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "users module stopped");
        Ok(())
    }
}

fn auth_error(err: AuthError) -> AppError {
    match err {
        AuthError::TokenGenerationFailed => AppError::Internal(err.into()),
        other => AppError::unauthorized(other.to_string()),
    }
}

fn authorization(request: &Request) -> &str {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Reject requests without a valid credential; pass the claims on to the
/// handler otherwise.
pub async fn require_credential(
    State(verifier): State<Arc<dyn CredentialVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verifier
        .verify(authorization(&request))
        .map_err(auth_error)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

async fn issue_token(
    State(authority): State<Arc<TokenAuthority>>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, AppError> {
    let Json(request) = body?;
    if request.sub.trim().is_empty() {
        return Err(AppError::validation(
            vec![json!({ "field": "sub", "error": "must not be blank" })],
            "invalid token request",
        ));
    }

    let issued = authority
        .issue(Subject {
            sub: request.sub,
            name: request.name,
            level: request.level,
        })
        .map_err(auth_error)?;
    Ok(Json(issued))
}

async fn verify_token(
    State(verifier): State<Arc<dyn CredentialVerifier>>,
    request: Request,
) -> Result<Json<Claims>, AppError> {
    let claims = verifier
        .verify(authorization(&request))
        .map_err(auth_error)?;
    Ok(Json(claims))
}

async fn info(Extension(claims): Extension<Claims>) -> Json<serde_json::Value> {
    Json(json!({
        "sub": claims.sub,
        "name": claims.name,
        "level": claims.level,
    }))
}

fn openapi_fragment() -> serde_json::Value {
    let unauthorized = json!({
        "description": "Missing or rejected credential",
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } }
        }
    });
    let bearer = json!([{ "name": "Authorization", "in": "header", "required": true,
        "schema": { "type": "string" } }]);

    json!({
        "paths": {
            "/token": {
                "post": {
                    "summary": "Issue a signed token",
                    "tags": ["Users"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "sub": { "type": "string" },
                                        "name": { "type": "string" },
                                        "level": { "type": "string" }
                                    },
                                    "required": ["sub", "name"]
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Issued token",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/IssuedToken" }
                                }
                            }
                        }
                    }
                }
            },
            "/verify": {
                "get": {
                    "summary": "Verify the presented token",
                    "tags": ["Users"],
                    "parameters": bearer,
                    "responses": {
                        "200": {
                            "description": "Token claims",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Claims" }
                                }
                            }
                        },
                        "401": unauthorized
                    }
                }
            },
            "/info": {
                "get": {
                    "summary": "Identity of the caller",
                    "tags": ["Users"],
                    "parameters": bearer,
                    "responses": {
                        "200": { "description": "Subject, name and level" },
                        "401": unauthorized
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "IssuedToken": {
                    "type": "object",
                    "properties": {
                        "token": { "type": "string" },
                        "token_type": { "type": "string" },
                        "expires_at": { "type": "integer" }
                    }
                },
                "Claims": {
                    "type": "object",
                    "properties": {
                        "sub": { "type": "string" },
                        "name": { "type": "string" },
                        "level": { "type": "string" },
                        "iss": { "type": "string" },
                        "iat": { "type": "integer" },
                        "exp": { "type": "integer" }
                    }
                }
            }
        }
    })
}

/// Create the users module issuing and checking tokens with `authority`.
pub fn create_module(authority: Arc<TokenAuthority>) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(authority))
}
