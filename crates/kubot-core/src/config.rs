//! kubot.toml configuration parser.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below. Command-line flags are applied on top by the binary.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "kubot.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubotConfig {
    pub run: RunConfig,
    pub cluster: ClusterConfig,
    pub volume: VolumeConfig,
    pub pod: PodConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Top-level suite name of the combined report.
    pub name: String,
    /// Number of suites run concurrently.
    pub batch_size: usize,
    /// Local directory the combined output is downloaded into.
    pub results_dir: PathBuf,
    /// Pause between the last batch and the merge.
    pub settle_delay_secs: u64,
    /// Write each suite's console output under `<results_dir>/console`.
    pub console_logs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "Kubot Results".to_string(),
            batch_size: 25,
            results_dir: PathBuf::from(".kubot"),
            settle_delay_secs: 5,
            console_logs: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Requested claim size, as a Kubernetes quantity.
    pub size: String,
    /// Storage class; the cluster default when absent.
    pub storage_class: Option<String>,
    /// Give up waiting for the claim to bind after this long. Absent means
    /// wait forever.
    pub bind_timeout_secs: Option<u64>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            size: "1Gi".to_string(),
            storage_class: None,
            bind_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    /// Image with the test runner and aggregator installed.
    pub image: String,
    /// Minimal image used to seed the volume.
    pub init_image: String,
    pub poll_interval_secs: u64,
    pub start_timeout_secs: u64,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            init_image: "docker.io/ubuntu:bionic".to_string(),
            poll_interval_secs: 5,
            start_timeout_secs: 300,
        }
    }
}

impl KubotConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `explicit` if given, else `kubot.toml` in `dir` if present, else
    /// the defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> CoreResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A config with every default spelled out, for `kubot init`.
    pub fn scaffold(namespace: &str, image: &str) -> Self {
        Self {
            cluster: ClusterConfig {
                namespace: namespace.to_string(),
            },
            pod: PodConfig {
                image: image.to_string(),
                ..PodConfig::default()
            },
            ..Self::default()
        }
    }

    /// Reject settings that would break a run before any cluster work starts.
    pub fn validate(&self) -> CoreResult<()> {
        if self.run.batch_size == 0 {
            return Err(CoreError::Invalid("batch size must be greater than 0".into()));
        }
        if self.run.name.trim().is_empty() {
            return Err(CoreError::Invalid("suite name must not be empty".into()));
        }
        if self.cluster.namespace.trim().is_empty() {
            return Err(CoreError::Invalid("namespace must not be empty".into()));
        }
        if self.pod.image.trim().is_empty() {
            return Err(CoreError::Invalid("execution image must not be empty".into()));
        }
        if self.pod.poll_interval_secs == 0 {
            return Err(CoreError::Invalid("poll interval must be greater than 0".into()));
        }
        if self.volume.size.trim().is_empty() {
            return Err(CoreError::Invalid("volume size must not be empty".into()));
        }
        Ok(())
    }

    pub fn batch_size(&self) -> CoreResult<NonZeroUsize> {
        NonZeroUsize::new(self.run.batch_size)
            .ok_or_else(|| CoreError::Invalid("batch size must be greater than 0".into()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.pod.poll_interval_secs)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.pod.start_timeout_secs)
    }

    pub fn bind_timeout(&self) -> Option<Duration> {
        self.volume.bind_timeout_secs.map(Duration::from_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.run.settle_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> KubotConfig {
        KubotConfig::scaffold("qa", "ppodgorsek/robot-framework:latest")
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = KubotConfig::default();
        assert_eq!(config.run.name, "Kubot Results");
        assert_eq!(config.run.batch_size, 25);
        assert_eq!(config.run.results_dir, PathBuf::from(".kubot"));
        assert_eq!(config.volume.size, "1Gi");
        assert_eq!(config.pod.init_image, "docker.io/ubuntu:bionic");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.start_timeout(), Duration::from_secs(300));
        assert_eq!(config.bind_timeout(), None);
    }

    #[test]
    fn parse_partial_file() {
        let toml_str = r#"
[run]
batch_size = 4

[volume]
storage_class = "azurefile-premium"
bind_timeout_secs = 600
"#;
        let config: KubotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.run.batch_size, 4);
        assert_eq!(config.run.name, "Kubot Results");
        assert_eq!(config.volume.storage_class.as_deref(), Some("azurefile-premium"));
        assert_eq!(config.bind_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.volume.size, "1Gi");
    }

    #[test]
    fn scaffold_round_trips_through_toml() {
        let config = valid();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("qa"));
        let parsed: KubotConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = valid();
        config.run.batch_size = 0;
        assert!(matches!(config.validate(), Err(CoreError::Invalid(_))));
        assert!(config.batch_size().is_err());
    }

    #[test]
    fn missing_image_or_namespace_is_rejected() {
        let mut config = valid();
        config.pod.image.clear();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.cluster.namespace = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn discover_prefers_explicit_then_local_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            KubotConfig::discover(None, dir.path()).unwrap(),
            KubotConfig::default()
        );

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run]\nbatch_size = 7\n").unwrap();
        assert_eq!(KubotConfig::discover(None, dir.path()).unwrap().run.batch_size, 7);

        let other = dir.path().join("other.toml");
        std::fs::write(&other, "[run]\nbatch_size = 9\n").unwrap();
        assert_eq!(
            KubotConfig::discover(Some(&other), dir.path()).unwrap().run.batch_size,
            9
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            KubotConfig::discover(Some(&missing), dir.path()),
            Err(CoreError::Io { .. })
        ));
    }
}
