use crate::error::{CsrfError, Result};
use crate::token::MIN_TOKEN_BYTES;
use serde::Deserialize;

/// Environment variable prefix read by [`CsrfConfig::from_env`].
pub const ENV_PREFIX: &str = "FORMGUARD_CSRF_";

/// CSRF protection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Form field carrying the token
    pub field_name: String,

    /// Header carrying the token for script-driven requests
    pub header_name: String,

    /// Session data key the token is stored under
    pub session_key: String,

    /// Random bytes per token (at least 16)
    pub token_bytes: usize,

    /// What happens to the token after a successful verification
    pub rotation: RotationPolicy,

    /// Safe HTTP methods (not checked for CSRF)
    pub safe_methods: Vec<String>,

    /// Path prefixes excluded from verification
    pub exclude_paths: Vec<String>,

    /// Session cookie name
    pub cookie_name: String,

    /// Cookie domain
    pub cookie_domain: Option<String>,

    /// Cookie path
    pub cookie_path: String,

    /// Cookie secure flag (HTTPS only)
    pub cookie_secure: bool,

    /// Cookie HttpOnly flag
    pub cookie_http_only: bool,

    /// Cookie SameSite policy
    pub cookie_same_site: SameSite,
}

/// Token lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// One token for the whole session.
    #[default]
    Never,
    /// Replace the token after every successful verification, so each
    /// rendered form can be submitted once.
    PerVerification,
}

impl RotationPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "never" | "off" | "none" => Some(RotationPolicy::Never),
            "per_verification" | "always" => Some(RotationPolicy::PerVerification),
            _ => None,
        }
    }
}

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SameSite {
    #[serde(alias = "strict")]
    Strict,
    #[serde(alias = "lax")]
    Lax,
    #[serde(alias = "none")]
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

impl From<SameSite> for formguard_core::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => formguard_core::SameSite::Strict,
            SameSite::Lax => formguard_core::SameSite::Lax,
            SameSite::None => formguard_core::SameSite::None,
        }
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            field_name: "authenticity_token".to_string(),
            header_name: "X-CSRF-Token".to_string(),
            session_key: "_csrf_token".to_string(),
            token_bytes: 32,
            rotation: RotationPolicy::Never,
            safe_methods: vec![
                "GET".to_string(),
                "HEAD".to_string(),
                "OPTIONS".to_string(),
                "TRACE".to_string(),
            ],
            exclude_paths: Vec::new(),
            cookie_name: "_formguard_session".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
        }
    }
}

impl CsrfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// ```
    /// use formguard_csrf::{CsrfConfig, RotationPolicy};
    ///
    /// let config = CsrfConfig::from_toml_str(r#"
    ///     field_name = "_token"
    ///     rotation = "per_verification"
    ///     exclude_paths = ["/webhooks"]
    /// "#).unwrap();
    ///
    /// assert_eq!(config.field_name, "_token");
    /// assert_eq!(config.rotation, RotationPolicy::PerVerification);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| CsrfError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read overrides from `FORMGUARD_CSRF_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Build a config from a key lookup (keys without the prefix, e.g.
    /// `FIELD_NAME`). Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let flag = |key: &str, value: String| -> Result<bool> {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(CsrfError::Config(format!("{}: invalid boolean '{}'", key, other))),
            }
        };
        let list = |value: String| -> Vec<String> {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        if let Some(v) = lookup("FIELD_NAME") {
            config.field_name = v;
        }
        if let Some(v) = lookup("HEADER_NAME") {
            config.header_name = v;
        }
        if let Some(v) = lookup("SESSION_KEY") {
            config.session_key = v;
        }
        if let Some(v) = lookup("TOKEN_BYTES") {
            config.token_bytes = v
                .trim()
                .parse()
                .map_err(|_| CsrfError::Config(format!("TOKEN_BYTES: invalid number '{}'", v)))?;
        }
        if let Some(v) = lookup("ROTATION") {
            config.rotation = RotationPolicy::parse(&v)
                .ok_or_else(|| CsrfError::Config(format!("ROTATION: unknown policy '{}'", v)))?;
        }
        if let Some(v) = lookup("SAFE_METHODS") {
            config.safe_methods = list(v).into_iter().map(|m| m.to_ascii_uppercase()).collect();
        }
        if let Some(v) = lookup("EXCLUDE_PATHS") {
            config.exclude_paths = list(v);
        }
        if let Some(v) = lookup("COOKIE_NAME") {
            config.cookie_name = v;
        }
        if let Some(v) = lookup("COOKIE_DOMAIN") {
            config.cookie_domain = Some(v);
        }
        if let Some(v) = lookup("COOKIE_PATH") {
            config.cookie_path = v;
        }
        if let Some(v) = lookup("COOKIE_SECURE") {
            config.cookie_secure = flag("COOKIE_SECURE", v)?;
        }
        if let Some(v) = lookup("COOKIE_HTTP_ONLY") {
            config.cookie_http_only = flag("COOKIE_HTTP_ONLY", v)?;
        }
        if let Some(v) = lookup("COOKIE_SAME_SITE") {
            config.cookie_same_site = SameSite::parse(&v).ok_or_else(|| {
                CsrfError::Config(format!("COOKIE_SAME_SITE: unknown value '{}'", v))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would weaken or break the guard.
    pub fn validate(&self) -> Result<()> {
        if self.token_bytes < MIN_TOKEN_BYTES {
            return Err(CsrfError::Config(format!(
                "token_bytes must be at least {} (got {})",
                MIN_TOKEN_BYTES, self.token_bytes
            )));
        }
        for (name, value) in [
            ("field_name", &self.field_name),
            ("header_name", &self.header_name),
            ("session_key", &self.session_key),
            ("cookie_name", &self.cookie_name),
        ] {
            if value.trim().is_empty() {
                return Err(CsrfError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.cookie_same_site == SameSite::None && !self.cookie_secure {
            return Err(CsrfError::Config(
                "SameSite=None cookies must be Secure".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn with_token_bytes(mut self, bytes: usize) -> Self {
        self.token_bytes = bytes;
        self
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_safe_methods(mut self, methods: Vec<String>) -> Self {
        self.safe_methods = methods;
        self
    }

    pub fn with_exclude_paths(mut self, paths: Vec<String>) -> Self {
        self.exclude_paths = paths;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    pub fn with_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    pub fn is_safe_method(&self, method: &str) -> bool {
        self.safe_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}
