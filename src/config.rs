use serde::Deserialize;
use std::path::Path;

/// Upstream origin whose pages are relayed
pub const DEFAULT_UPSTREAM_BASE: &str = "https://credentialfinder.org/pathwaydisplay/";

/// Debug script injected alongside the stylesheet link
pub const DEFAULT_INJECT_SCRIPT: &str = r#"
    <script>
        console.log("Custom CSS file has been injected.");
        document.body.style.border = "5px solid red"; // Debugging
    </script>
    "#;

/// Global configuration for the relay
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream origin and the prefix it is rewritten to
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Local asset overrides
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Markers injected into relayed pages
    #[serde(default)]
    pub inject: InjectConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listening port (default: 5000, overridden by the PORT environment variable)
    #[serde(default = "default_listen_port")]
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_listen_port(),
            bind: default_bind_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Fully-qualified origin, including the trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Local prefix substituted for `base_url` in relayed pages
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mount_prefix: default_mount_prefix(),
        }
    }
}

impl UpstreamConfig {
    /// Path of the page route: the mount prefix without its trailing slash
    pub fn page_path(&self) -> &str {
        self.mount_prefix.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    /// Directory checked before falling back to upstream
    #[serde(default = "default_assets_root")]
    pub root: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InjectConfig {
    /// Stylesheet href placed in the injected `<link>` tag
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,

    /// Raw script block placed after the stylesheet link
    #[serde(default = "default_script")]
    pub script: String,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            stylesheet: default_stylesheet(),
            script: default_script(),
        }
    }
}

fn default_listen_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_base_url() -> String {
    DEFAULT_UPSTREAM_BASE.to_string()
}

fn default_mount_prefix() -> String {
    "/proxy/".to_string()
}

fn default_assets_root() -> String {
    "static".to_string()
}

fn default_stylesheet() -> String {
    "/static/customTest.css".to_string()
}

fn default_script() -> String {
    DEFAULT_INJECT_SCRIPT.to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (currently only `PORT`)
    pub fn apply_env(&mut self, port: Option<&str>) -> anyhow::Result<()> {
        if let Some(raw) = port {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT value '{}': {}", raw, e))?;
        }
        Ok(())
    }

    /// Validate the configuration, collecting every problem found
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        let base = &self.upstream.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            errors.push(format!("upstream.base_url '{}' must be an http(s) URL", base));
        }
        if !base.ends_with('/') {
            errors.push(format!("upstream.base_url '{}' must end with '/'", base));
        }

        let prefix = &self.upstream.mount_prefix;
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            errors.push(format!(
                "upstream.mount_prefix '{}' must start and end with '/' and name a path",
                prefix
            ));
        }

        if self.server.port == 0 {
            errors.push("server.port must be greater than 0".to_string());
        }

        if self.assets.root.is_empty() {
            errors.push("assets.root must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "))
        }
    }
}
