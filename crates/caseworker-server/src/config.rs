use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub relay_prefix: String,
    pub asset_root: PathBuf,
    pub index_document: String,
    pub disable_system_proxy: bool,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    upstream: UpstreamSection,
    #[serde(default)]
    relay: RelaySection,
    #[serde(default)]
    assets: AssetsSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamSection {
    #[serde(default = "default_upstream_url")]
    url: String,
    #[serde(default)]
    disable_system_proxy: bool,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            disable_system_proxy: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelaySection {
    #[serde(default = "default_relay_prefix")]
    prefix: String,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            prefix: default_relay_prefix(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetsSection {
    #[serde(default = "default_asset_root")]
    root: PathBuf,
    #[serde(default = "default_index_document")]
    index: String,
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            root: default_asset_root(),
            index: default_index_document(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_upstream_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_relay_prefix() -> String {
    "/chat-stream".to_string()
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("dist")
}

fn default_index_document() -> String {
    "index.html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_url: default_upstream_url(),
            relay_prefix: default_relay_prefix(),
            asset_root: default_asset_root(),
            index_document: default_index_document(),
            disable_system_proxy: false,
        }
    }
}

impl ServerConfig {
    /// Load from an explicit TOML file, `CASEWORKER_CONFIG`, or `./caseworker.toml`,
    /// falling back to environment variables when no file is found.
    ///
    /// `PORT` wins over the file's `[server] port` when set.
    pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(file_config) = load_from_file(explicit_path)? {
            let mut config = Self::from_file(file_config);
            config.apply_port_override(env::var("PORT").ok().as_deref());
            return Ok(config);
        }

        Ok(Self::from_env())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn from_file(file_config: FileConfig) -> Self {
        Self {
            host: file_config.server.host,
            port: file_config.server.port,
            upstream_url: file_config.upstream.url,
            relay_prefix: normalize_prefix(&file_config.relay.prefix),
            asset_root: file_config.assets.root,
            index_document: file_config.assets.index,
            disable_system_proxy: file_config.upstream.disable_system_proxy,
        }
    }

    fn apply_port_override(&mut self, value: Option<&str>) {
        if let Some(port) = value.and_then(parse_port) {
            self.port = port;
        }
    }

    fn from_env() -> Self {
        let host = env::var("CASEWORKER_HOST").unwrap_or_else(|_| default_host());
        let port = env::var("PORT")
            .ok()
            .as_deref()
            .and_then(parse_port)
            .unwrap_or_else(default_port);
        let upstream_url =
            env::var("CASEWORKER_UPSTREAM_URL").unwrap_or_else(|_| default_upstream_url());
        let relay_prefix = env::var("CASEWORKER_RELAY_PREFIX")
            .map(|value| normalize_prefix(&value))
            .unwrap_or_else(|_| default_relay_prefix());
        let asset_root = env::var_os("CASEWORKER_ASSET_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_asset_root);
        let disable_system_proxy = env::var_os("CASEWORKER_DISABLE_SYSTEM_PROXY").is_some();

        Self {
            host,
            port,
            upstream_url,
            relay_prefix,
            asset_root,
            index_document: default_index_document(),
            disable_system_proxy,
        }
    }
}

fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse().ok()
}

/// Prefixes always start with `/` and never end with one, so `starts_with`
/// matching behaves the same for `chat-stream`, `/chat-stream` and `/chat-stream/`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn load_from_file(explicit_path: Option<&Path>) -> anyhow::Result<Option<FileConfig>> {
    let path = if let Some(path) = explicit_path {
        Some(path.to_path_buf())
    } else if let Some(path) = env::var_os("CASEWORKER_CONFIG") {
        Some(PathBuf::from(path))
    } else if Path::new("caseworker.toml").exists() {
        Some(PathBuf::from("caseworker.toml"))
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path.display(), err))?;
    let parsed: FileConfig = toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), err))?;
    Ok(Some(parsed))
}
