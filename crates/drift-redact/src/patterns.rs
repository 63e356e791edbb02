//! Sensitive variable name patterns.
//!
//! The set is fixed and enumerated; there is no user extension point.
//! All matching is case-insensitive substring matching on the variable
//! NAME, never on the value.

use once_cell::sync::Lazy;
use regex::Regex;

// Generic secret vocabulary.
static RE_GENERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(password|passwd|pwd|passphrase|secret_key|secret|token|api_key|apikey|key|auth_token|private_key|auth|credential|cred|login|userpass|private|priv|access_token|refresh_token|id_token|connection_string|conn_str|db_uri|database_url)",
    )
    .unwrap()
});

// Cloud provider credentials.
static RE_CLOUD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(aws_access_key_id|aws_secret_access_key|aws_session_token|azure_client_secret|azure_tenant|azure_storage_key|google_application_credentials|gcp_service_account|gcloud_key|digitalocean_token|do_token|heroku_api_key)",
    )
    .unwrap()
});

// AI service keys.
static RE_AI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(openai_api_key|openai_key|huggingface_token|hf_token|anthropic_api_key|anthropic_key|cohere_api_key|stability_api_key|replicate_api_token)",
    )
    .unwrap()
});

// Database credentials.
static RE_DATABASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(mysql_pwd|mysql_root_password|postgres_password|pgpassword|mongo_initdb_root_password|redis_password|db_password|database_password)",
    )
    .unwrap()
});

// Token exchange: JWT, OAuth, SSO.
static RE_TOKEN_EXCHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(jwt_secret|jwt_token|oauth_token|oauth_secret|oauth_client_secret|sso_token|saml_key|session_secret)").unwrap()
});

// Payment and messaging platform tokens.
static RE_PLATFORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(stripe_secret_key|stripe_api_key|paypal_client_secret|twilio_auth_token|twilio_api_key|slack_token|slack_webhook|discord_token|discord_webhook|telegram_bot_token|telegram_token)",
    )
    .unwrap()
});

static ALL: Lazy<[&'static Regex; 6]> = Lazy::new(|| {
    [
        &RE_GENERIC,
        &RE_CLOUD,
        &RE_AI,
        &RE_DATABASE,
        &RE_TOKEN_EXCHANGE,
        &RE_PLATFORM,
    ]
});

/// Whether a variable name matches any secret pattern.
pub fn is_secret_name(name: &str) -> bool {
    ALL.iter().any(|re| re.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_vocabulary() {
        for name in [
            "PASSWORD",
            "DB_PASSWD",
            "pwd",
            "GPG_PASSPHRASE",
            "MY_SECRET",
            "GITHUB_TOKEN",
            "API_KEY",
            "ApiKey",
            "SSH_PRIVATE_KEY",
            "AUTH_TOKEN",
            "USER_CREDENTIAL",
            "APP_SECRET_KEY",
            "ACCESS_TOKEN",
            "REFRESH_TOKEN",
            "ID_TOKEN",
            "CONNECTION_STRING",
            "CONN_STR",
            "DB_URI",
            "DATABASE_URL",
        ] {
            assert!(is_secret_name(name), "{name} should match");
        }
    }

    #[test]
    fn test_cloud_and_ai_keys() {
        for name in [
            "AWS_SECRET_ACCESS_KEY",
            "AWS_ACCESS_KEY_ID",
            "AZURE_CLIENT_SECRET",
            "GOOGLE_APPLICATION_CREDENTIALS",
            "DO_TOKEN",
            "HEROKU_API_KEY",
            "OPENAI_API_KEY",
            "HF_TOKEN",
            "ANTHROPIC_API_KEY",
            "COHERE_API_KEY",
            "STABILITY_API_KEY",
            "REPLICATE_API_TOKEN",
        ] {
            assert!(is_secret_name(name), "{name} should match");
        }
    }

    #[test]
    fn test_database_and_platform_tokens() {
        for name in [
            "MYSQL_PWD",
            "PGPASSWORD",
            "REDIS_PASSWORD",
            "JWT_SECRET",
            "OAUTH_CLIENT_SECRET",
            "STRIPE_SECRET_KEY",
            "TWILIO_AUTH_TOKEN",
            "SLACK_TOKEN",
            "DISCORD_WEBHOOK",
            "TELEGRAM_BOT_TOKEN",
        ] {
            assert!(is_secret_name(name), "{name} should match");
        }
    }

    #[test]
    fn test_benign_names_pass_through() {
        for name in ["PATH", "HOME", "LANG", "SHELL", "TERM", "EDITOR", "PS1"] {
            assert!(!is_secret_name(name), "{name} should not match");
        }
    }
}
