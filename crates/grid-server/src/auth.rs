//! HTTP Basic Auth for the grid's three flat roles.
//!
//! Extracts `Authorization: Basic <base64>`, matches the decoded
//! `user:pass` against whichever of `GRID_ADMIN_CREDENTIALS` /
//! `GRID_CLIENT_CREDENTIALS` / `GRID_NODE_CREDENTIALS` it equals, and
//! injects a `Principal` into request extensions. Returns 401 if missing,
//! malformed, or matching no configured role.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Client,
    Node,
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

/// `user:pass` pairs for each role, read once at startup.
#[derive(Clone)]
pub struct AuthConfig {
    admin: (String, String),
    client: (String, String),
    node: (String, String),
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            admin: parse_credential(&env_or("GRID_ADMIN_CREDENTIALS", "admin:admin")),
            client: parse_credential(&env_or("GRID_CLIENT_CREDENTIALS", "client:client")),
            node: parse_credential(&env_or("GRID_NODE_CREDENTIALS", "node:node")),
        }
    }

    fn role_for(&self, username: &str, password: &str) -> Option<Role> {
        if (username, password) == (self.admin.0.as_str(), self.admin.1.as_str()) {
            Some(Role::Admin)
        } else if (username, password) == (self.client.0.as_str(), self.client.1.as_str()) {
            Some(Role::Client)
        } else if (username, password) == (self.node.0.as_str(), self.node.1.as_str()) {
            Some(Role::Node)
        } else {
            None
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_credential(s: &str) -> (String, String) {
    match s.split_once(':') {
        Some((user, pass)) => (user.to_string(), pass.to_string()),
        None => (s.to_string(), String::new()),
    }
}

fn unauthorized(msg: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error_msg": msg})),
    )
        .into_response()
}

/// Authenticates the request and injects a [`Principal`]. Does not check
/// role — pair with [`require_admin`]/[`require_client_or_admin`]/
/// [`require_node_or_admin`] for role-gated routes.
pub async fn basic_auth(mut req: Request, next: Next) -> Result<Response, Response> {
    let config = req
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .ok_or_else(|| unauthorized("auth not configured"))?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing Authorization header"))?;

    let encoded = header_value
        .strip_prefix("Basic ")
        .ok_or_else(|| unauthorized("expected Basic auth"))?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| unauthorized("malformed Basic auth payload"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| unauthorized("malformed Basic auth payload"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| unauthorized("malformed Basic auth payload"))?;

    let role = config
        .role_for(username, password)
        .ok_or_else(|| unauthorized("invalid credentials"))?;

    req.extensions_mut().insert(Principal {
        username: username.to_string(),
        role,
    });

    Ok(next.run(req).await)
}

fn require(req: &Request, allowed: &[Role]) -> Result<(), Response> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| unauthorized("not authenticated"))?;
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error_msg": format!("role {:?} cannot access this endpoint", principal.role)})),
        )
            .into_response())
    }
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    require(&req, &[Role::Admin])?;
    Ok(next.run(req).await)
}

pub async fn require_client_or_admin(req: Request, next: Next) -> Result<Response, Response> {
    require(&req, &[Role::Admin, Role::Client])?;
    Ok(next.run(req).await)
}

pub async fn require_node_or_admin(req: Request, next: Next) -> Result<Response, Response> {
    require(&req, &[Role::Admin, Role::Node])?;
    Ok(next.run(req).await)
}

pub async fn require_any_role(req: Request, next: Next) -> Result<Response, Response> {
    require(&req, &[Role::Admin, Role::Client, Role::Node])?;
    Ok(next.run(req).await)
}
