use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub mailer_url: String,
    pub mailer_from: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            mailer_url: env::var("MAILER_URL")
                .unwrap_or_else(|_| {
                    warn!("MAILER_URL not set, booking confirmations will not be sent");
                    String::new()
                }),
            mailer_from: env::var("MAILER_FROM")
                .unwrap_or_else(|_| "Healthcare Team <noreply@clinic.example>".to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_mailer_configured(&self) -> bool {
        !self.mailer_url.is_empty()
    }
}
