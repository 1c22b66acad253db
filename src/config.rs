use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sms: HelloSmsConfig,
    pub email: SendGridConfig,
    pub payment: PaymentConfig,
    pub ai: OpenAiConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Public base URL used when building payment confirmation/callback URLs.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelloSmsConfig {
    /// Credentials are optional; when either is missing the mock provider is used.
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_url: String,
    /// Default sender label when a business has no override (≤11 chars).
    pub default_sender: String,
}

impl HelloSmsConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridConfig {
    /// Optional; absence selects the mock provider.
    pub api_key: Option<String>,
    /// Verified sender identity; its domain is reused for per-business senders.
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub klarna: KlarnaConfig,
    pub swish: SwishConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KlarnaConfig {
    pub username: String,
    pub password: String,
    /// "production" selects the live API host, anything else the playground.
    pub environment: String,
}

impl KlarnaConfig {
    pub fn api_base(&self) -> &'static str {
        if self.environment == "production" {
            "https://api.klarna.com"
        } else {
            "https://api.playground.klarna.com"
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwishConfig {
    pub payee_alias: String,
    pub environment: String,
}

impl SwishConfig {
    pub fn api_base(&self) -> &'static str {
        if self.environment == "production" {
            "https://cpc.getswish.net"
        } else {
            "https://mss.cpc.getswish.net"
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// Optional; absence disables the AI content endpoints.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints (e.g. /api/auth/signin)
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
    /// Allowed requests per second (per IP) for payment webhook endpoints
    pub webhook_per_second: u32,
    /// Burst size for webhook endpoints
    pub webhook_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                base_url: env::var("BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/klario.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            sms: HelloSmsConfig {
                username: env::var("HELLOSMS_USERNAME").ok(),
                password: env::var("HELLOSMS_PASSWORD").ok(),
                api_url: env::var("HELLOSMS_API_URL")
                    .unwrap_or_else(|_| "https://api.hellosms.se/api/v1".to_string()),
                default_sender: env::var("HELLOSMS_SENDER")
                    .unwrap_or_else(|_| "Klario".to_string()),
            },
            email: SendGridConfig {
                api_key: env::var("SENDGRID_API_KEY").ok(),
                from_email: env::var("SENDGRID_FROM_EMAIL")
                    .unwrap_or_else(|_| "noreply@klario.se".to_string()),
            },
            payment: PaymentConfig {
                klarna: KlarnaConfig {
                    username: env::var("KLARNA_USERNAME").unwrap_or_default(),
                    password: env::var("KLARNA_PASSWORD").unwrap_or_default(),
                    environment: env::var("KLARNA_ENVIRONMENT")
                        .unwrap_or_else(|_| "playground".to_string()),
                },
                swish: SwishConfig {
                    payee_alias: env::var("SWISH_PAYEE_ALIAS").unwrap_or_default(),
                    environment: env::var("SWISH_ENVIRONMENT")
                        .unwrap_or_else(|_| "test".to_string()),
                },
            },
            ai: OpenAiConfig {
                api_key: env::var("OPENAI_API_KEY").ok(),
                api_url: env::var("OPENAI_API_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "168".to_string())
                    .parse()
                    .unwrap_or(168),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                webhook_per_second: env::var("RATE_LIMIT_WEBHOOKS_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                webhook_burst: env::var("RATE_LIMIT_WEBHOOKS_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/klario.db".to_string(),
                max_connections: 5,
            },
            sms: HelloSmsConfig {
                username: None,
                password: None,
                api_url: "https://api.hellosms.se/api/v1".to_string(),
                default_sender: "Klario".to_string(),
            },
            email: SendGridConfig {
                api_key: None,
                from_email: "noreply@klario.se".to_string(),
            },
            payment: PaymentConfig {
                klarna: KlarnaConfig {
                    username: String::new(),
                    password: String::new(),
                    environment: "playground".to_string(),
                },
                swish: SwishConfig {
                    payee_alias: String::new(),
                    environment: "test".to_string(),
                },
            },
            ai: OpenAiConfig {
                api_key: None,
                api_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 168,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
                webhook_per_second: 10,
                webhook_burst: 50,
            },
        }
    }
}
