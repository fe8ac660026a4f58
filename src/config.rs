use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub db_url: Option<String>,
    pub app_name: String,
    pub keycloak_ui_id: String,
    pub keycloak_url: String,
    pub keycloak_realm: String,
    pub deployment: String,
    pub workflow_api_url: String,
    pub workflow_app_key: String,
    pub workflow_app_secret: String,
    pub workflow_form_id: String,
    pub workflow_timeout_secs: u64,
    pub sales_token_secret: String,
    pub sales_token_ttl_hours: i64,
    pub public_base_url: String,
    pub tests_running: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok(); // Load from .env file if available
        let db_url = env::var("DB_URL").ok().or_else(|| {
            Some(format!(
                "{}://{}:{}@{}:{}/{}",
                env::var("DB_PREFIX").unwrap_or_else(|_| "postgresql".to_string()),
                env::var("DB_USER").expect("DB_USER must be set"),
                env::var("DB_PASSWORD").expect("DB_PASSWORD must be set"),
                env::var("DB_HOST").expect("DB_HOST must be set"),
                env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string()),
                env::var("DB_NAME").expect("DB_NAME must be set"),
            ))
        });

        Config {
            app_name: env::var("APP_NAME").expect("APP_NAME must be set"),
            keycloak_ui_id: env::var("KEYCLOAK_UI_ID").expect("KEYCLOAK_UI_ID must be set"),
            keycloak_url: env::var("KEYCLOAK_URL").expect("KEYCLOAK_URL must be set"),
            keycloak_realm: env::var("KEYCLOAK_REALM").expect("KEYCLOAK_REALM must be set"),
            deployment: env::var("DEPLOYMENT")
                .expect("DEPLOYMENT must be set, this can be local, dev, stage, or prod"),
            workflow_api_url: env::var("WORKFLOW_API_URL").expect("WORKFLOW_API_URL must be set"),
            workflow_app_key: env::var("WORKFLOW_APP_KEY").expect("WORKFLOW_APP_KEY must be set"),
            workflow_app_secret: env::var("WORKFLOW_APP_SECRET")
                .expect("WORKFLOW_APP_SECRET must be set"),
            workflow_form_id: env::var("WORKFLOW_FORM_ID").expect("WORKFLOW_FORM_ID must be set"),
            workflow_timeout_secs: env::var("WORKFLOW_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            sales_token_secret: env::var("SALES_TOKEN_SECRET")
                .expect("SALES_TOKEN_SECRET must be set"),
            sales_token_ttl_hours: env::var("SALES_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(72),
            public_base_url: env::var("PUBLIC_BASE_URL").expect("PUBLIC_BASE_URL must be set"),
            tests_running: false,
            db_url,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            app_name: "lims-intake-api-test".to_string(),
            keycloak_ui_id: "test-ui".to_string(),
            keycloak_url: "http://localhost:8080".to_string(),
            keycloak_realm: "test-realm".to_string(),
            deployment: "test".to_string(),
            workflow_api_url: "http://localhost:9100".to_string(),
            workflow_app_key: "test-app-key".to_string(),
            workflow_app_secret: "test-app-secret".to_string(),
            workflow_form_id: "FORM-TEST".to_string(),
            workflow_timeout_secs: 5,
            sales_token_secret: "test-sales-secret".to_string(),
            sales_token_ttl_hours: 72,
            public_base_url: "https://lims.test".to_string(),
            tests_running: true,
            db_url: None,
        }
    }

    /// Link handed to lab staff for login-free access to an order's sample tables
    pub fn samples_view_url(&self, order_uuid: &str, token: &str) -> String {
        format!(
            "{}/order/{order_uuid}/view/{token}",
            self.public_base_url.trim_end_matches('/')
        )
    }
}
