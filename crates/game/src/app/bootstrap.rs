use std::fs;
use std::path::{Path, PathBuf};

use mintloop::{LoopConfig, RoomRegistry};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, DemoConfig};

const CONFIG_ENV_VAR: &str = "MINTLOOP_CONFIG";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path} at `{field}`: {message}")]
    Parse {
        path: PathBuf,
        field: String,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct ConfigFile {
    pub(crate) runtime: LoopConfig,
    pub(crate) demo: DemoConfig,
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) registry: RoomRegistry,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== mintloop demo startup ===");

    let file = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "loading_config_file");
            load_config_file(&path)?
        }
        None => ConfigFile::default(),
    };
    Ok(wire(file))
}

fn wire(file: ConfigFile) -> AppWiring {
    let mut config = file.runtime;
    if config.input.bindings.is_empty() {
        config.input.bindings = gameplay::default_bindings();
    }

    AppWiring {
        config,
        registry: gameplay::build_registry(&file.demo),
    }
}

pub(crate) fn load_config_file(path: &Path) -> Result<ConfigFile, BootstrapError> {
    let raw = fs::read_to_string(path).map_err(|source| BootstrapError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let deserializer = &mut serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(deserializer).map_err(|err| BootstrapError::Parse {
        path: path.to_path_buf(),
        field: err.path().to_string(),
        message: err.inner().to_string(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        fs::write(file.path(), contents).expect("write config");
        file
    }

    #[test]
    fn config_file_sections_are_optional() {
        let file = write_config(r#"{ "runtime": { "show_fps": true } }"#);

        let config = load_config_file(file.path()).expect("valid config");

        assert!(config.runtime.show_fps);
        assert_eq!(config.runtime.target_fps, 60);
        assert_eq!(config.demo, DemoConfig::default());
    }

    #[test]
    fn parse_errors_name_the_offending_field() {
        let file = write_config(r#"{ "demo": { "title_fade_frames": "slow" } }"#);

        let err = load_config_file(file.path()).expect_err("bad field type");

        match err {
            BootstrapError::Parse { field, .. } => assert_eq!(field, "demo.title_fade_frames"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");

        let err = load_config_file(&dir.path().join("absent.json")).expect_err("no file");

        assert!(matches!(err, BootstrapError::Read { .. }));
    }

    #[test]
    fn empty_bindings_fall_back_to_demo_defaults() {
        let wiring = wire(ConfigFile::default());

        assert_eq!(wiring.config.input.bindings, gameplay::default_bindings());
        assert_eq!(
            wiring.registry.names().collect::<Vec<_>>(),
            vec!["title", "redirect", "play"]
        );
    }

    #[test]
    fn configured_bindings_are_kept() {
        let file =
            write_config(r#"{ "runtime": { "input": { "bindings": { "confirm": "Enter" } } } }"#);
        let config = load_config_file(file.path()).expect("valid config");

        let wiring = wire(config);

        assert_eq!(wiring.config.input.bindings.len(), 1);
        assert_eq!(
            wiring.config.input.bindings.get("confirm").map(String::as_str),
            Some("Enter")
        );
    }
}
