use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// SMTP credentials handed to the mailer at construction time.
/// `user`/`password` left empty means mail is only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
    pub single_use: bool,
    pub debug_routes: bool,
    /// Keep codes in process memory instead of Postgres (single instance only).
    pub in_memory: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub ml_api_url: String,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub otp: OtpConfig,
    pub assistant: AssistantConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "medassist".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "medassist-users".into()),
            ttl_minutes: parse_env("JWT_TTL_MINUTES", 60),
        };

        let smtp_user = std::env::var("SMTP_USER").unwrap_or_default();
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
            from: std::env::var("SMTP_FROM").unwrap_or_else(|_| smtp_user.clone()),
            password: std::env::var("SMTP_PASS").unwrap_or_default(),
            user: smtp_user,
        };

        let otp = OtpConfig {
            ttl_seconds: parse_env("OTP_TTL_SECONDS", 300),
            single_use: parse_env("OTP_SINGLE_USE", false),
            debug_routes: parse_env("OTP_DEBUG_ROUTES", false),
            in_memory: std::env::var("OTP_STORE")
                .map(|v| v.eq_ignore_ascii_case("memory"))
                .unwrap_or(false),
        };

        let assistant = AssistantConfig {
            ml_api_url: std::env::var("ML_API_URL")
                .unwrap_or_else(|_| "http://localhost:5000/predict".into()),
            llm_api_url: std::env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.mistral.ai/v1/chat/completions".into()),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "mistral-small-latest".into()),
            timeout_secs: parse_env("ASSISTANT_TIMEOUT_SECS", 30),
        };

        Ok(Self {
            database_url,
            jwt,
            smtp,
            otp,
            assistant,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
