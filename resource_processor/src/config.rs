use std::{env, str::FromStr, time::Duration};

use log::*;
use lrp_common::Secret;
use resource_engine::policy::RolePolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/legacy_store.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_CREATE_TOPIC: &str = "challenge.resource.create";
const DEFAULT_DELETE_TOPIC: &str = "challenge.resource.delete";
const DEFAULT_PAYMENT_TOPIC: &str = "challenge.payment.update";
const DEFAULT_OUTBOUND_TOPIC: &str = "challenge.notification.events";
const DEFAULT_RETRY_DELAY_MS: u64 = 10_000;
const DEFAULT_ORIGINATOR: &str = "legacy.resource.processor";
const DEFAULT_MIME_TYPE: &str = "application/json";
const DEFAULT_CHALLENGE_API_URL: &str = "http://localhost:4000/v5";

#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub topics: TopicConfig,
    /// How long a not-yet-ready message waits before it is republished. The retry is unbounded;
    /// only the delay is configurable.
    pub retry_delay: Duration,
    /// Originator stamped on envelopes this process publishes (requeues and notifications).
    pub originator: String,
    pub mime_type: String,
    pub challenge_api_url: String,
    pub auth: AuthConfig,
    pub policy: RolePolicy,
}

#[derive(Clone, Debug)]
pub struct TopicConfig {
    pub create: String,
    pub delete: String,
    pub payment_update: String,
    pub outbound: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            create: DEFAULT_CREATE_TOPIC.into(),
            delete: DEFAULT_DELETE_TOPIC.into(),
            payment_update: DEFAULT_PAYMENT_TOPIC.into(),
            outbound: DEFAULT_OUTBOUND_TOPIC.into(),
        }
    }
}

/// OAuth2 client-credentials settings for the upstream challenge API.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub audience: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            topics: TopicConfig::default(),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            originator: DEFAULT_ORIGINATOR.into(),
            mime_type: DEFAULT_MIME_TYPE.into(),
            challenge_api_url: DEFAULT_CHALLENGE_API_URL.into(),
            auth: AuthConfig::default(),
            policy: RolePolicy::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("LRP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ LRP_DATABASE_URL is not set. Falling back to {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let max_connections = parsed_env("LRP_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let topics = TopicConfig {
            create: env_or("LRP_CREATE_TOPIC", DEFAULT_CREATE_TOPIC),
            delete: env_or("LRP_DELETE_TOPIC", DEFAULT_DELETE_TOPIC),
            payment_update: env_or("LRP_PAYMENT_UPDATE_TOPIC", DEFAULT_PAYMENT_TOPIC),
            outbound: env_or("LRP_OUTBOUND_TOPIC", DEFAULT_OUTBOUND_TOPIC),
        };
        let retry_delay = Duration::from_millis(parsed_env("LRP_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS));
        let originator = env_or("LRP_ORIGINATOR", DEFAULT_ORIGINATOR);
        let mime_type = env_or("LRP_MIME_TYPE", DEFAULT_MIME_TYPE);
        let challenge_api_url = env_or("LRP_CHALLENGE_API_URL", DEFAULT_CHALLENGE_API_URL);
        let auth = AuthConfig::from_env_or_default();
        let policy = role_policy_from_env();
        Self {
            database_url,
            max_connections,
            topics,
            retry_delay,
            originator,
            mime_type,
            challenge_api_url,
            auth,
            policy,
        }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        let token_url = env::var("LRP_AUTH_TOKEN_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ LRP_AUTH_TOKEN_URL is not set. Upstream calls will be unauthenticated.");
            String::default()
        });
        let client_id = env::var("LRP_AUTH_CLIENT_ID").ok().unwrap_or_default();
        let client_secret = Secret::new(env::var("LRP_AUTH_CLIENT_SECRET").ok().unwrap_or_default());
        let audience = env::var("LRP_AUTH_AUDIENCE").ok().unwrap_or_default();
        Self { token_url, client_id, client_secret, audience }
    }
}

/// The role mappings are deployment data, so every [`RolePolicy`] field can be overridden from the
/// environment. Anything absent or unparseable keeps the built-in default.
fn role_policy_from_env() -> RolePolicy {
    let defaults = RolePolicy::default();
    RolePolicy {
        submitter_role_id: parsed_env("LRP_SUBMITTER_ROLE_ID", defaults.submitter_role_id),
        manager_role_id: parsed_env("LRP_MANAGER_ROLE_ID", defaults.manager_role_id),
        notification_exempt_roles: list_env("LRP_NOTIFICATION_EXEMPT_ROLES", defaults.notification_exempt_roles),
        exempt_project_roles: list_env("LRP_EXEMPT_PROJECT_ROLES", defaults.exempt_project_roles),
        reviewer_role_ids: list_env("LRP_REVIEWER_ROLE_IDS", defaults.reviewer_role_ids),
        copilot_role_ids: list_env("LRP_COPILOT_ROLE_IDS", defaults.copilot_role_ids),
        studio_challenge_types: list_env("LRP_STUDIO_CHALLENGE_TYPES", defaults.studio_challenge_types),
        reviewer_payment_type_id: parsed_env("LRP_REVIEWER_PAYMENT_TYPE_ID", defaults.reviewer_payment_type_id),
        copilot_payment_type_id: parsed_env("LRP_COPILOT_PAYMENT_TYPE_ID", defaults.copilot_payment_type_id),
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).ok().unwrap_or_else(|| {
        debug!("🪛️ {key} is not set. Using the default, {default}.");
        default.into()
    })
}

fn parsed_env<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default:?}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn list_env<T>(key: &str, default: Vec<T>) -> Vec<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(s) => parse_list(&s).unwrap_or_else(|e| {
            error!("🪛️ Could not parse {key}. {e} Using the built-in default instead.");
            default
        }),
        Err(_) => default,
    }
}

fn parse_list<T>(s: &str) -> Result<Vec<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<T>().map_err(|e| format!("'{item}': {e}")))
        .collect()
}
