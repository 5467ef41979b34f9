use reconcile::{BackendKind, BackendSettings, DEFAULT_STATE_FILE, Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Property Keys
// ============================================================================

pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
pub const STATE_BACKEND: &str = "topology.state.backend";
pub const STATE_FILE: &str = "topology.state.file";
pub const REDIS_HOST: &str = "topology.state.redis.host";
pub const REDIS_PORT: &str = "topology.state.redis.port";
pub const REST_PROXY_URL: &str = "topology.rest.proxy.url";

const DEFAULT_REST_PROXY_URL: &str = "http://localhost:8082";

// ============================================================================
// Builder Config
// ============================================================================

/// Fully resolved settings for one builder run.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// Descriptor file or directory
    pub topology: PathBuf,
    /// Client configuration (properties) file
    pub client_config: PathBuf,
    /// Bootstrap brokers, informational when talking to a REST proxy
    pub brokers: Option<String>,
    pub allow_delete: bool,
    pub dry_run: bool,
    pub quiet: bool,
}

impl BuilderConfig {
    pub fn new(topology: impl Into<PathBuf>, client_config: impl Into<PathBuf>) -> Self {
        Self {
            topology: expand(topology.into()),
            client_config: expand(client_config.into()),
            ..Default::default()
        }
    }

    /// Both input files must exist before anything else happens.
    pub fn verify_required_parameters(&self) -> Result<()> {
        if !self.topology.exists() {
            return Err(Error::config(format!(
                "topology file or directory not found: {}",
                self.topology.display()
            )));
        }
        if !self.client_config.exists() {
            return Err(Error::config(format!(
                "client configuration file not found: {}",
                self.client_config.display()
            )));
        }
        Ok(())
    }

    /// Read the client configuration file; `--brokers` overrides its servers.
    pub fn load_properties(&self) -> Result<Properties> {
        let mut properties = Properties::load(&self.client_config)?;
        if let Some(brokers) = &self.brokers {
            properties.set(BOOTSTRAP_SERVERS, brokers.as_str());
        }
        Ok(properties)
    }
}

fn expand(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
        None => path,
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Java-style properties: `key=value`, `key: value` or `key value`, with
/// `#`/`!` comments and `\` escaping separators inside keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = split_entry(line);
            entries.insert(key, value.trim_end().to_string());
        }

        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "could not read client configuration {}: {e}",
                path.display()
            ))
        })?;
        let properties = Self::parse(&content);
        log::debug!(
            "Loaded {} properties from {}",
            properties.len(),
            path.display()
        );
        Ok(properties)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve the state backend selection.
    pub fn backend_settings(&self) -> Result<BackendSettings> {
        let kind: BackendKind = match self.get(STATE_BACKEND) {
            Some(raw) => raw.parse()?,
            None => BackendKind::default(),
        };

        match kind {
            BackendKind::File => {
                let raw = self.get(STATE_FILE).unwrap_or(DEFAULT_STATE_FILE);
                Ok(BackendSettings::File {
                    path: expand(PathBuf::from(raw)),
                })
            }
            BackendKind::Redis => {
                let host = self.require(REDIS_HOST)?;
                let raw = self.require(REDIS_PORT)?;
                let port = raw
                    .parse::<u16>()
                    .map_err(|_| Error::config(format!("invalid {REDIS_PORT} '{raw}'")))?;
                Ok(BackendSettings::Redis {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("redis state backend requires {key}")))
    }

    /// Base URL of the Kafka REST proxy.
    pub fn rest_proxy_url(&self) -> String {
        self.get(REST_PROXY_URL)
            .unwrap_or(DEFAULT_REST_PROXY_URL)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Split a trimmed line at the first unescaped `=`, `:` or whitespace.
///
/// Whitespace around the separator is dropped, so `key = value` and
/// `key value` both yield `value`.
fn split_entry(line: &str) -> (String, &str) {
    let mut key = String::new();
    let mut chars = line.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    key.push(escaped);
                }
            }
            '=' | ':' => return (key, line[idx + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[idx..].trim_start();
                let rest = rest
                    .strip_prefix(['=', ':'])
                    .map_or(rest, str::trim_start);
                return (key, rest);
            }
            c => key.push(c),
        }
    }

    (key, "")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_separators_and_comments() {
        let props = Properties::parse(
            "# comment\n! also comment\n\nbootstrap.servers=localhost:9092\n\
             topology.state.backend: redis\n  spaced.key =  value  \nflag\n",
        );

        assert_eq!(props.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(props.get(STATE_BACKEND), Some("redis"));
        assert_eq!(props.get("spaced.key"), Some("value"));
        assert_eq!(props.get("flag"), None);
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn test_whitespace_separator() {
        let props = Properties::parse(
            "topology.rest.proxy.url http://proxy:8082\n\
             tabbed.key\t\tvalue\n\
             spaced.colon.key   :   other\n",
        );

        assert_eq!(props.get(REST_PROXY_URL), Some("http://proxy:8082"));
        assert_eq!(props.rest_proxy_url(), "http://proxy:8082");
        assert_eq!(props.get("tabbed.key"), Some("value"));
        assert_eq!(props.get("spaced.colon.key"), Some("other"));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_escaped_separators_stay_in_key() {
        let props = Properties::parse("listener\\:name\\ one = PLAINTEXT://:9092\n");

        assert_eq!(props.get("listener:name one"), Some("PLAINTEXT://:9092"));
    }

    #[test]
    fn test_default_backend_is_file() {
        let props = Properties::default();
        match props.backend_settings().unwrap() {
            BackendSettings::File { path } => {
                assert_eq!(path, PathBuf::from(DEFAULT_STATE_FILE));
            }
            other => panic!("unexpected settings: {other:?}"),
        }
    }

    #[test]
    fn test_redis_backend() {
        let mut props = Properties::default();
        props.set(STATE_BACKEND, "redis");
        props.set(REDIS_HOST, "cache.internal");
        props.set(REDIS_PORT, "6380");

        assert_eq!(
            props.backend_settings().unwrap(),
            BackendSettings::Redis {
                host: "cache.internal".to_string(),
                port: 6380,
            }
        );
    }

    #[test]
    fn test_invalid_backend_settings() {
        let mut props = Properties::default();
        props.set(STATE_BACKEND, "zookeeper");
        assert!(props.backend_settings().unwrap_err().is_config());

        props.set(STATE_BACKEND, "redis");
        let err = props.backend_settings().unwrap_err();
        assert!(err.to_string().contains(REDIS_HOST));

        props.set(REDIS_HOST, "localhost");
        let err = props.backend_settings().unwrap_err();
        assert!(err.to_string().contains(REDIS_PORT));

        props.set(REDIS_PORT, "not-a-port");
        assert!(props.backend_settings().unwrap_err().is_config());
    }

    #[test]
    fn test_rest_proxy_url() {
        let mut props = Properties::default();
        assert_eq!(props.rest_proxy_url(), "http://localhost:8082");
        props.set(REST_PROXY_URL, "http://proxy:8082/");
        assert_eq!(props.rest_proxy_url(), "http://proxy:8082");
    }

    #[test]
    fn test_verify_required_parameters() {
        let dir = TempDir::new().unwrap();
        let topology = dir.path().join("topology.yaml");
        let client = dir.path().join("client.properties");

        let config = BuilderConfig::new(&topology, &client);
        assert!(config.verify_required_parameters().unwrap_err().is_config());

        fs::write(&topology, "context: ctx\n").unwrap();
        let err = config.verify_required_parameters().unwrap_err();
        assert!(err.to_string().contains("client configuration"));

        fs::write(&client, "").unwrap();
        config.verify_required_parameters().unwrap();
        assert_eq!(config.load_properties().unwrap().len(), 0);
    }

    #[test]
    fn test_brokers_override() {
        let dir = TempDir::new().unwrap();
        let client = dir.path().join("client.properties");
        fs::write(&client, "bootstrap.servers=localhost:9092\n").unwrap();

        let mut config = BuilderConfig::new(dir.path(), &client);
        config.brokers = Some("kafka-1:9092,kafka-2:9092".into());

        let props = config.load_properties().unwrap();
        assert_eq!(props.get(BOOTSTRAP_SERVERS), Some("kafka-1:9092,kafka-2:9092"));
    }
}
