//! Server configuration read from the environment

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tasklane_core::attachment::AttachmentMode;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATA_DIR: &str = ".tasklane-data";
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Root of the task document store and attachment storage
    pub data_dir: PathBuf,
    pub attachment_mode: AttachmentMode,
    /// Static client bundle served at `/`
    pub public_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            attachment_mode: AttachmentMode::default(),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn env_value<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Ignoring invalid {}={:?}: {}", name, raw, err);
                default
            }
        },
        _ => default,
    }
}

/// `TASKS_DATA_DIR`, falling back to a `file://` `MONGODB_URI`
///
/// Any other `MONGODB_URI` cannot be served by the file store and is reported.
fn data_dir(lookup: &impl Fn(&str) -> Option<String>, default: PathBuf) -> PathBuf {
    let uri = lookup("MONGODB_URI").filter(|raw| !raw.trim().is_empty());
    if lookup("TASKS_DATA_DIR").is_some_and(|raw| !raw.trim().is_empty()) {
        if uri.is_some() {
            tracing::warn!("MONGODB_URI is ignored because TASKS_DATA_DIR is set");
        }
        return env_value(lookup, "TASKS_DATA_DIR", default);
    }

    match uri {
        Some(raw) => match raw.trim().strip_prefix("file://") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => {
                tracing::warn!(
                    "MONGODB_URI={:?} is not supported, storing tasks under {:?}",
                    raw,
                    default
                );
                default
            }
        },
        None => default,
    }
}

impl ServerConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: env_value(&lookup, "PORT", defaults.port),
            data_dir: data_dir(&lookup, defaults.data_dir),
            attachment_mode: env_value(&lookup, "ATTACHMENT_MODE", defaults.attachment_mode),
            public_dir: env_value(&lookup, "PUBLIC_DIR", defaults.public_dir),
            max_upload_bytes: env_value(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Bind on all interfaces
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.attachment_mode, AttachmentMode::Blob);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8088"),
            ("TASKS_DATA_DIR", "/var/lib/tasklane"),
            ("ATTACHMENT_MODE", "path"),
            ("PUBLIC_DIR", "web"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ]));
        assert_eq!(config.port, 8088);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/tasklane"));
        assert_eq!(config.attachment_mode, AttachmentMode::Path);
        assert_eq!(config.public_dir, PathBuf::from("web"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.listen_addr().port(), 8088);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("ATTACHMENT_MODE", "s3"),
            ("MAX_UPLOAD_BYTES", " "),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.attachment_mode, AttachmentMode::Blob);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn store_uri_alias() {
        let config = ServerConfig::from_lookup(lookup(&[("MONGODB_URI", "file:///srv/tasks")]));
        assert_eq!(config.data_dir, PathBuf::from("/srv/tasks"));

        let config = ServerConfig::from_lookup(lookup(&[(
            "MONGODB_URI",
            "mongodb://localhost:27017/tasks",
        )]));
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));

        let config = ServerConfig::from_lookup(lookup(&[
            ("MONGODB_URI", "file:///srv/tasks"),
            ("TASKS_DATA_DIR", "local"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("local"));
    }
}
