use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "contacthub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "contacthub-users".into()),
            session_ttl_minutes: std::env::var("JWT_SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
            reset_ttl_minutes: std::env::var("JWT_RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(20),
        };
        let smtp = SmtpConfig {
            host: std::env::var("MAIL_SERVER").unwrap_or_else(|_| "smtp.gmail.com".into()),
            port: std::env::var("MAIL_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("MAIL_USERNAME").unwrap_or_default(),
            password: std::env::var("MAIL_PASSWORD").unwrap_or_default(),
            sender: std::env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "noreply@contacthub.com".into()),
        };
        Ok(Self {
            database_url,
            frontend_url,
            jwt,
            smtp,
        })
    }
}
