use std::env;

/// Placeholder used in dev mode when no course file location is configured.
const DEV_RESOURCE_URL: &str = "https://example.com/course.pdf";

/// Per-IP request limits (requests per minute). 0 disables a tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
            relaxed_rpm: 60,
        }
    }
}

impl RateLimitConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            strict_rpm: env_u32("RATE_LIMIT_STRICT_RPM", defaults.strict_rpm),
            standard_rpm: env_u32("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
            relaxed_rpm: env_u32("RATE_LIMIT_RELAXED_RPM", defaults.relaxed_rpm),
        }
    }
}

/// Stripe credentials. Absent entirely when `STRIPE_SECRET_KEY` is unset.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Pre-configured Stripe Price for the course (price_xxx)
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl StripeConfig {
    /// `None` when no secret key is set. A secret key without a webhook
    /// signing secret is an error: webhooks could not be authenticated.
    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        base_url: &str,
    ) -> Result<Option<Self>, String> {
        let Some(secret_key) = lookup("STRIPE_SECRET_KEY").filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let webhook_secret = lookup("STRIPE_WEBHOOK_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                "STRIPE_WEBHOOK_SECRET must be set when STRIPE_SECRET_KEY is set".to_string()
            })?;

        Ok(Some(Self {
            secret_key,
            webhook_secret,
            price_id: lookup("STRIPE_PRICE_ID").unwrap_or_default(),
            success_url: lookup("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|| format!("{}/success", base_url)),
            cancel_url: lookup("CHECKOUT_CANCEL_URL").unwrap_or_else(|| base_url.to_string()),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Link target handed to buyers; the token is appended as `?token=`
    pub download_base_url: String,
    /// Where a successfully consumed token redirects to
    pub resource_url: String,
    /// Bearer key required by the collaborator-facing issuance endpoint
    pub service_api_key: Option<String>,
    pub stripe: Option<StripeConfig>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("COURSEDROP_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let download_base_url = env::var("DOWNLOAD_BASE_URL")
            .unwrap_or_else(|_| format!("{}/download-course", base_url.trim_end_matches('/')));

        let resource_url = match env::var("COURSE_RESOURCE_URL") {
            Ok(url) => url,
            Err(_) if dev_mode => DEV_RESOURCE_URL.to_string(),
            Err(_) => return Err("COURSE_RESOURCE_URL must be set".to_string()),
        };

        let stripe = StripeConfig::from_lookup(|key| env::var(key).ok(), &base_url)?;

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "coursedrop.db".to_string()),
            base_url,
            download_base_url,
            resource_url,
            service_api_key: env::var("SERVICE_API_KEY").ok().filter(|k| !k.is_empty()),
            stripe,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Course <noreply@example.com>".to_string()),
            rate_limit: RateLimitConfig::from_env(),
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
