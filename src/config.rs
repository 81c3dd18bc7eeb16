use serde::Deserialize;

/// Google OAuth client settings. The defaults are the placeholders a fresh
/// checkout ships with; real deployments set the env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from_email: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Process-wide signing secret; loaded once at startup, never rotated
    /// at runtime.
    pub secret_key: String,
    pub reset_ttl_secs: u64,
    pub public_base_url: String,
    pub model_path: String,
    pub oauth: OAuthConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let secret_key = std::env::var("SECRET_KEY")?;
        let reset_ttl_secs = std::env::var("RESET_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into());
        let model_path =
            std::env::var("MODEL_PATH").unwrap_or_else(|_| "model.json".into());
        let oauth = OAuthConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID")
                .unwrap_or_else(|_| "your-client-id".into()),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .unwrap_or_else(|_| "your-client-secret".into()),
            redirect_url: std::env::var("GOOGLE_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:8080/google_login".into()),
        };
        let mail = MailConfig {
            from_email: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@weatherly.example".into()),
            region: std::env::var("MAIL_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        Ok(Self {
            database_url,
            secret_key,
            reset_ttl_secs,
            public_base_url,
            model_path,
            oauth,
            mail,
        })
    }
}
