use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_ENGINE: &str = "podman";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
pub const DEFAULT_IMAGE_EXPORT_DIR: &str = "podman";
pub const DEFAULT_OUTPUT_DIR: &str = "target";

/// Everything a single build invocation is configured with. Loaded by the host, either from a
/// YAML file, from the command line or both.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildConfig {
    pub skip_build: bool,
    pub skip_tag: bool,
    pub output_dir: PathBuf,
    pub dockerfile_dir: PathBuf,
    pub dockerfile_name: String,
    pub image_export_dir: String,
    pub export_image: bool,
    pub tags: Vec<String>,
    pub image_name: Option<String>,
    pub engine: String,
    pub variables: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            skip_build: false,
            skip_tag: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            dockerfile_dir: PathBuf::from("."),
            dockerfile_name: DEFAULT_DOCKERFILE.to_owned(),
            image_export_dir: DEFAULT_IMAGE_EXPORT_DIR.to_owned(),
            export_image: false,
            tags: Vec::new(),
            image_name: None,
            engine: DEFAULT_ENGINE.to_owned(),
            variables: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let to_error = |cause: Box<dyn std::error::Error + Send + Sync>| Error::ConfigFile {
            path: path.to_owned(),
            cause,
        };
        let source = std::fs::read_to_string(path).map_err(|error| to_error(error.into()))?;
        Self::from_yaml(&source).map_err(|error| to_error(error.into()))
    }

    pub fn source_dockerfile(&self) -> PathBuf {
        self.dockerfile_dir.join(&self.dockerfile_name)
    }

    pub fn target_dockerfile(&self) -> PathBuf {
        self.output_dir.join(&self.dockerfile_name)
    }

    /// Exported archives go to `<output_dir>/podman`, unless exporting is enabled and a different
    /// directory name was configured.
    pub fn resolved_image_export_dir(&self) -> PathBuf {
        if self.export_image && self.image_export_dir != DEFAULT_IMAGE_EXPORT_DIR {
            self.output_dir.join(&self.image_export_dir)
        } else {
            self.output_dir.join(DEFAULT_IMAGE_EXPORT_DIR)
        }
    }
}
