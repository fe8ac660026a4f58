use crate::common::errors::BusinessError;
use crate::common::sales_token;
use crate::common::state::AppState;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum_keycloak_auth::decode::KeycloakToken;
use serde::Deserialize;

pub const ADMIN_ROLE: &str = "lims-admin";
pub const SALES_ROLE: &str = "lims-sales";
pub const LAB_ROLE: &str = "lims-lab";
pub const CUSTOMER_ROLE: &str = "lims-customer";

/// Trusted identity headers, only honoured when Keycloak is disabled
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_PHONE_HEADER: &str = "x-user-phone";

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Role {
    Administrator,
    Sales,
    Lab,
    Customer,
    Unknown(String),
}
impl axum_keycloak_auth::role::Role for Role {}

impl Role {
    /// Higher wins when a token carries several roles
    fn rank(&self) -> u8 {
        match self {
            Role::Administrator => 4,
            Role::Sales => 3,
            Role::Lab => 2,
            Role::Customer => 1,
            Role::Unknown(_) => 0,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Administrator => f.write_str(ADMIN_ROLE),
            Role::Sales => f.write_str(SALES_ROLE),
            Role::Lab => f.write_str(LAB_ROLE),
            Role::Customer => f.write_str(CUSTOMER_ROLE),
            Role::Unknown(unknown) => f.write_fmt(format_args!("Unknown role: {unknown}")),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            ADMIN_ROLE | "admin" => Role::Administrator,
            SALES_ROLE | "sales" => Role::Sales,
            LAB_ROLE | "lab" => Role::Lab,
            CUSTOMER_ROLE | "customer" => Role::Customer,
            _ => Role::Unknown(value),
        }
    }
}

/// The authenticated party behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

#[derive(Deserialize)]
struct SalesTokenQuery {
    sales_token: Option<String>,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = BusinessError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Ok(Query(SalesTokenQuery {
            sales_token: Some(token),
        })) = Query::<SalesTokenQuery>::try_from_uri(&parts.uri)
        {
            let claims = sales_token::verify(
                &state.config.sales_token_secret,
                &token,
                chrono::Utc::now(),
            )?;
            return Ok(Caller {
                user_id: None,
                role: Role::Sales,
                phone: Some(claims.phone),
            });
        }

        if let Some(token) = parts.extensions.get::<KeycloakToken<Role>>() {
            let role = token
                .roles
                .iter()
                .map(|r| r.role().clone())
                .max_by_key(Role::rank)
                .unwrap_or_else(|| Role::Unknown(String::new()));
            return Ok(Caller {
                user_id: Some(token.subject.clone()),
                role,
                phone: None,
            });
        }

        if state.keycloak_auth_instance.is_none() {
            let header = |name: &str| {
                parts
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(ToString::to_string)
            };
            if let Some(role) = header(USER_ROLE_HEADER) {
                return Ok(Caller {
                    user_id: header(USER_ID_HEADER),
                    role: Role::from(role),
                    phone: header(USER_PHONE_HEADER),
                });
            }
        }

        Err(BusinessError::Unauthorized {
            message: "no valid bearer token or sales link".to_string(),
        })
    }
}
