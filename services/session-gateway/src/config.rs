//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The signing secret and the provider app secret are loaded from
//! AUTH_SIGNING_SECRET / OAUTH_APP_SECRET or from the files named in the
//! config, never stored in the TOML directly to avoid leaking secrets.

use bearer_token::{
    DEFAULT_ACCEPTED_USER, DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_ROLE, IssuerSettings,
};
use common::{Secret, resolve_secret};
use delegated_login::ProviderConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub token: TokenConfig,
    pub oauth: OAuthConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Externally visible origin, used to build the provider callback URL
    pub public_base_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Bearer token issuance settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub issuer: String,
    pub audience: String,
    pub validity_days: u64,
    pub default_role: String,
    pub accepted_users: Vec<String>,
    /// Path to a file containing the signing secret (alternative to AUTH_SIGNING_SECRET)
    pub signing_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub signing_secret: Option<Secret<String>>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            validity_days: 7,
            default_role: DEFAULT_ROLE.to_string(),
            accepted_users: vec![DEFAULT_ACCEPTED_USER.to_string()],
            signing_secret_file: None,
            signing_secret: None,
        }
    }
}

/// Identity provider registration.
///
/// The cookie session is the sign-in scheme and this provider is the
/// challenge scheme; there is no other login strategy.
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    /// Overridden by OAUTH_APP_ID when set
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub app_secret: Option<Secret<String>>,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_userinfo_endpoint")]
    pub userinfo_endpoint: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

/// Upper bound on `validity_days`, ten years.
const MAX_VALIDITY_DAYS: u64 = 3650;

fn default_max_connections() -> usize {
    1000
}

fn default_authorize_endpoint() -> String {
    "https://www.facebook.com/v3.2/dialog/oauth".into()
}

fn default_token_endpoint() -> String {
    "https://graph.facebook.com/v3.2/oauth/access_token".into()
}

fn default_userinfo_endpoint() -> String {
    "https://graph.facebook.com/me?fields=id,name,email".into()
}

fn default_scope() -> String {
    "email".into()
}

fn default_callback_path() -> String {
    "/signin-facebook".into()
}

fn default_login_path() -> String {
    "/account/login".into()
}

/// Routes the gateway always mounts; configurable paths must avoid them.
const RESERVED_PATHS: &[&str] = &[
    "",
    "/health",
    "/metrics",
    "/api/user/login",
    "/api/user/me",
    "/account/fblogin",
    "/account/logout",
    "/dashboard",
];

fn require_http_url(name: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

fn require_local_path(name: &str, value: &str) -> common::Result<()> {
    if !value.starts_with('/') {
        return Err(common::Error::Config(format!(
            "{name} must start with '/', got: {value}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order:
    /// 1. AUTH_SIGNING_SECRET / OAUTH_APP_SECRET env vars
    /// 2. signing_secret_file / app_secret_file paths from config
    ///
    /// A secret missing from both sources is `common::Error::Missing`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.validate()?;

        if let Ok(app_id) = std::env::var("OAUTH_APP_ID") {
            let app_id = app_id.trim();
            if !app_id.is_empty() {
                config.oauth.app_id = app_id.to_owned();
            }
        }
        if config.oauth.app_id.trim().is_empty() {
            return Err(common::Error::Missing(
                "provider app id (OAUTH_APP_ID or oauth.app_id)".into(),
            ));
        }

        config.token.signing_secret = resolve_secret(
            "AUTH_SIGNING_SECRET",
            config.token.signing_secret_file.as_deref(),
        )?;
        if config.token.signing_secret.is_none() {
            return Err(common::Error::Missing(
                "signing secret (AUTH_SIGNING_SECRET or token.signing_secret_file)".into(),
            ));
        }

        config.oauth.app_secret =
            resolve_secret("OAUTH_APP_SECRET", config.oauth.app_secret_file.as_deref())?;
        if config.oauth.app_secret.is_none() {
            return Err(common::Error::Missing(
                "provider app secret (OAUTH_APP_SECRET or oauth.app_secret_file)".into(),
            ));
        }

        Ok(config)
    }

    /// Checks that need no secrets.
    pub fn validate(&self) -> common::Result<()> {
        require_http_url("public_base_url", &self.server.public_base_url)?;
        require_http_url("authorize_endpoint", &self.oauth.authorize_endpoint)?;
        require_http_url("token_endpoint", &self.oauth.token_endpoint)?;
        require_http_url("userinfo_endpoint", &self.oauth.userinfo_endpoint)?;

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.token.validity_days == 0 {
            return Err(common::Error::Config(
                "validity_days must be greater than 0".into(),
            ));
        }
        if self.token.validity_days > MAX_VALIDITY_DAYS {
            return Err(common::Error::Config(format!(
                "validity_days must be at most {MAX_VALIDITY_DAYS}, got {}",
                self.token.validity_days
            )));
        }
        if self.token.issuer.is_empty() || self.token.audience.is_empty() {
            return Err(common::Error::Config(
                "token issuer and audience must not be empty".into(),
            ));
        }
        if self.token.audience.trim_end_matches('/') == self.session_audience() {
            return Err(common::Error::Config(format!(
                "token audience must differ from public_base_url, both are {}",
                self.token.audience
            )));
        }
        if self.token.accepted_users.is_empty() {
            return Err(common::Error::Config(
                "accepted_users must name at least one user".into(),
            ));
        }

        require_local_path("callback_path", &self.oauth.callback_path)?;
        require_local_path("login_path", &self.oauth.login_path)?;
        for (name, path) in [
            ("callback_path", &self.oauth.callback_path),
            ("login_path", &self.oauth.login_path),
        ] {
            if RESERVED_PATHS.contains(&path.trim_end_matches('/')) {
                return Err(common::Error::Config(format!(
                    "{name} {path} collides with a built-in route"
                )));
            }
        }
        if self.oauth.callback_path.trim_end_matches('/')
            == self.oauth.login_path.trim_end_matches('/')
        {
            return Err(common::Error::Config(format!(
                "callback_path and login_path must differ, both are {}",
                self.oauth.callback_path
            )));
        }
        Ok(())
    }

    /// Absolute callback URL registered with the provider.
    pub fn callback_url(&self) -> String {
        format!(
            "{}{}",
            self.server.public_base_url.trim_end_matches('/'),
            self.oauth.callback_path
        )
    }

    /// Settings for API bearer tokens.
    pub fn issuer_settings(&self) -> IssuerSettings {
        IssuerSettings {
            issuer: self.token.issuer.clone(),
            audience: self.token.audience.clone(),
            validity: self.validity(),
            default_role: self.token.default_role.clone(),
        }
    }

    /// Settings for session cookies: same issuer and lifetime, but scoped to
    /// this gateway's origin so a cookie is never a valid API token.
    pub fn session_issuer_settings(&self) -> IssuerSettings {
        IssuerSettings {
            audience: self.session_audience(),
            ..self.issuer_settings()
        }
    }

    fn session_audience(&self) -> String {
        self.server.public_base_url.trim_end_matches('/').to_string()
    }

    // Bounded by MAX_VALIDITY_DAYS in validate().
    fn validity(&self) -> Duration {
        Duration::from_secs(self.token.validity_days.saturating_mul(24 * 60 * 60))
    }

    pub fn signing_secret(&self) -> common::Result<&Secret<String>> {
        self.token
            .signing_secret
            .as_ref()
            .ok_or_else(|| common::Error::Missing("signing secret".into()))
    }

    pub fn provider_config(&self) -> common::Result<ProviderConfig> {
        let app_secret = self
            .oauth
            .app_secret
            .clone()
            .ok_or_else(|| common::Error::Missing("provider app secret".into()))?;
        Ok(ProviderConfig {
            app_id: self.oauth.app_id.clone(),
            app_secret,
            authorize_endpoint: self.oauth.authorize_endpoint.clone(),
            token_endpoint: self.oauth.token_endpoint.clone(),
            userinfo_endpoint: self.oauth.userinfo_endpoint.clone(),
            scope: self.oauth.scope.clone(),
            callback_url: self.callback_url(),
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-gateway.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_secret_env() {
        unsafe {
            remove_env("AUTH_SIGNING_SECRET");
            remove_env("OAUTH_APP_ID");
            remove_env("OAUTH_APP_SECRET");
        }
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"
public_base_url = "https://app.example"

[oauth]
app_id = "app-123"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config_with_env_secrets() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        clear_secret_env();
        unsafe {
            set_env("AUTH_SIGNING_SECRET", "signing-from-env");
            set_env("OAUTH_APP_SECRET", "app-secret-from-env");
        }

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.token.issuer, "myapi.com");
        assert_eq!(config.token.audience, "myapi.com");
        assert_eq!(config.token.validity_days, 7);
        assert_eq!(config.token.default_role, "User");
        assert_eq!(config.token.accepted_users, vec!["Prerak".to_string()]);
        assert_eq!(config.oauth.callback_path, "/signin-facebook");
        assert_eq!(config.oauth.login_path, "/account/login");
        assert_eq!(
            config.token.signing_secret.as_ref().unwrap().expose(),
            "signing-from-env"
        );
        assert_eq!(
            config.oauth.app_secret.as_ref().unwrap().expose(),
            "app-secret-from-env"
        );

        clear_secret_env();
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_secrets_from_files() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let signing_path = dir.path().join("signing");
        let app_path = dir.path().join("app_secret");
        std::fs::write(&signing_path, "signing-from-file\n").unwrap();
        std::fs::write(&app_path, "app-from-file\n").unwrap();

        let toml_content = format!(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
public_base_url = "https://app.example"

[token]
signing_secret_file = "{}"

[oauth]
app_id = "app-123"
app_secret_file = "{}"
"#,
            signing_path.display(),
            app_path.display()
        );
        let path = write_config(&dir, &toml_content);

        clear_secret_env();
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.token.signing_secret.as_ref().unwrap().expose(),
            "signing-from-file"
        );
        assert_eq!(
            config.oauth.app_secret.as_ref().unwrap().expose(),
            "app-from-file"
        );
    }

    #[test]
    fn test_env_overrides_files() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let signing_path = dir.path().join("signing");
        std::fs::write(&signing_path, "signing-from-file").unwrap();

        let toml_content = format!(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
public_base_url = "https://app.example"

[token]
signing_secret_file = "{}"

[oauth]
app_id = "from-file"
"#,
            signing_path.display()
        );
        let path = write_config(&dir, &toml_content);

        clear_secret_env();
        unsafe {
            set_env("AUTH_SIGNING_SECRET", "signing-from-env");
            set_env("OAUTH_APP_ID", "from-env");
            set_env("OAUTH_APP_SECRET", "app-secret");
        }
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.token.signing_secret.as_ref().unwrap().expose(),
            "signing-from-env"
        );
        assert_eq!(config.oauth.app_id, "from-env");

        clear_secret_env();
    }

    #[test]
    fn test_missing_signing_secret_is_configuration_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        clear_secret_env();
        unsafe { set_env("OAUTH_APP_SECRET", "app-secret") };
        let result = Config::load(&path);
        assert!(
            matches!(result, Err(common::Error::Missing(ref what)) if what.contains("signing secret")),
            "got {result:?}"
        );

        clear_secret_env();
    }

    #[test]
    fn test_missing_app_secret_is_configuration_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        clear_secret_env();
        unsafe { set_env("AUTH_SIGNING_SECRET", "signing") };
        let result = Config::load(&path);
        assert!(
            matches!(result, Err(common::Error::Missing(ref what)) if what.contains("app secret")),
            "got {result:?}"
        );

        clear_secret_env();
    }

    #[test]
    fn test_blank_app_id_is_configuration_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"
public_base_url = "https://app.example"

[oauth]
"#,
        );

        clear_secret_env();
        unsafe {
            set_env("AUTH_SIGNING_SECRET", "signing");
            set_env("OAUTH_APP_SECRET", "app-secret");
        }
        assert!(matches!(
            Config::load(&path),
            Err(common::Error::Missing(_))
        ));

        clear_secret_env();
    }

    #[test]
    fn test_whitespace_secret_file_is_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let signing_path = dir.path().join("signing");
        std::fs::write(&signing_path, "  \n  ").unwrap();

        let toml_content = format!(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
public_base_url = "https://app.example"

[token]
signing_secret_file = "{}"

[oauth]
app_id = "app-123"
"#,
            signing_path.display()
        );
        let path = write_config(&dir, &toml_content);

        clear_secret_env();
        unsafe { set_env("OAUTH_APP_SECRET", "app-secret") };
        assert!(matches!(
            Config::load(&path),
            Err(common::Error::Missing(_))
        ));

        clear_secret_env();
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("session-gateway.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }

    fn parse(extra_server: &str, extra_token: &str, extra_oauth: &str) -> Config {
        let toml_content = format!(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
public_base_url = "https://app.example"
{extra_server}

[token]
{extra_token}

[oauth]
app_id = "app-123"
{extra_oauth}
"#
        );
        toml::from_str(&toml_content).unwrap()
    }

    #[test]
    fn test_invalid_public_base_url_rejected() {
        let mut config = parse("", "", "");
        config.server.public_base_url = "app.example".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(
            err.contains("public_base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_non_http_endpoint_rejected() {
        let config = parse("", "", r#"token_endpoint = "ftp://graph.example/token""#);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let config = parse("max_connections = 0", "", "");
        assert!(config.validate().is_err(), "max_connections = 0 must be rejected");
    }

    #[test]
    fn test_zero_validity_rejected() {
        let config = parse("", "validity_days = 0", "");
        assert!(config.validate().is_err(), "validity_days = 0 must be rejected");
    }

    #[test]
    fn test_huge_validity_rejected() {
        let config = parse("", "validity_days = 9223372036854775807", "");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at most 3650"), "got: {err}");

        let config = parse("", "validity_days = 3650", "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_audience_equal_to_base_url_rejected() {
        let config = parse("", r#"audience = "https://app.example/""#, "");
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must differ from public_base_url"), "got: {err}");
    }

    #[test]
    fn test_session_settings_use_gateway_origin_as_audience() {
        let config = parse("", "validity_days = 2", "");
        let api = config.issuer_settings();
        let session = config.session_issuer_settings();
        assert_eq!(api.audience, "myapi.com");
        assert_eq!(session.audience, "https://app.example");
        assert_eq!(session.issuer, api.issuer);
        assert_eq!(session.validity, Duration::from_secs(2 * 86_400));
    }

    #[test]
    fn test_empty_accepted_users_rejected() {
        let config = parse("", "accepted_users = []", "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_callback_path_must_differ_from_login_path() {
        let config = parse(
            "",
            "",
            r#"
callback_path = "/account/login"
login_path = "/account/login/"
"#,
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must differ"), "got: {err}");
    }

    #[test]
    fn test_callback_path_on_builtin_route_rejected() {
        let config = parse("", "", r#"callback_path = "/dashboard""#);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("built-in route"), "got: {err}");
    }

    #[test]
    fn test_relative_callback_path_rejected() {
        let config = parse("", "", r#"callback_path = "signin-facebook""#);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_callback_url_joins_base_and_path() {
        let mut config = parse("", "", "");
        assert_eq!(config.callback_url(), "https://app.example/signin-facebook");

        config.server.public_base_url = "https://app.example/".into();
        assert_eq!(config.callback_url(), "https://app.example/signin-facebook");
    }

    #[test]
    fn test_issuer_settings_from_token_section() {
        let config = parse(
            "",
            r#"
issuer = "issuer.example"
validity_days = 1
default_role = "Admin"
"#,
            "",
        );
        let settings = config.issuer_settings();
        assert_eq!(settings.issuer, "issuer.example");
        assert_eq!(settings.audience, "myapi.com");
        assert_eq!(settings.validity, Duration::from_secs(86_400));
        assert_eq!(settings.default_role, "Admin");
    }

    #[test]
    fn test_provider_config_requires_resolved_secret() {
        let mut config = parse("", "", "");
        assert!(matches!(
            config.provider_config(),
            Err(common::Error::Missing(_))
        ));

        config.oauth.app_secret = Some(Secret::new("app-secret".into()));
        let provider = config.provider_config().unwrap();
        assert_eq!(provider.app_id, "app-123");
        assert_eq!(provider.callback_url, "https://app.example/signin-facebook");
        assert_eq!(provider.scope, "email");
    }
}
