use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use crate::{config::BuildConfig, error::ConfigurationError, image::ImageConfiguration};

/// Everything one build invocation needs, resolved and validated up front. Only the image hash
/// changes after construction.
#[derive(Debug)]
pub struct BuildContext {
    source_dockerfile: PathBuf,
    target_dockerfile: PathBuf,
    output_dir: PathBuf,
    image_export_dir: PathBuf,
    export_image: bool,
    engine: String,
    variables: BTreeMap<String, String>,
    image_configuration: ImageConfiguration,
}

impl BuildContext {
    pub fn builder() -> BuildContextBuilder {
        BuildContextBuilder::default()
    }

    /// Resolves the paths of `config` and validates the result.
    pub fn from_config(
        config: &BuildConfig,
        variables: BTreeMap<String, String>,
    ) -> Result<Self, ConfigurationError> {
        validate_export_dir_name(&config.image_export_dir)?;

        Self::builder()
            .with_source_dockerfile(config.source_dockerfile())
            .with_target_dockerfile(config.target_dockerfile())
            .with_output_dir(&config.output_dir)
            .with_image_export_dir(config.resolved_image_export_dir())
            .with_export_image(config.export_image)
            .with_engine(&config.engine)
            .with_variables(variables)
            .with_image_configuration(ImageConfiguration::new(
                config.image_name.clone(),
                config.tags.clone(),
            ))
            .build()
    }

    pub fn source_dockerfile(&self) -> &Path {
        &self.source_dockerfile
    }

    pub fn target_dockerfile(&self) -> &Path {
        &self.target_dockerfile
    }

    /// The directory the filtered Dockerfile is written to and the build runs in.
    pub fn build_dir(&self) -> &Path {
        self.target_dockerfile
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn image_export_dir(&self) -> &Path {
        &self.image_export_dir
    }

    pub fn export_image(&self) -> bool {
        self.export_image
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn image_configuration(&self) -> &ImageConfiguration {
        &self.image_configuration
    }

    pub(crate) fn image_configuration_mut(&mut self) -> &mut ImageConfiguration {
        &mut self.image_configuration
    }
}

fn validate_export_dir_name(name: &str) -> Result<(), ConfigurationError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigurationError::InvalidExportDir(name.to_owned())),
    }
}

#[derive(Debug, Default)]
pub struct BuildContextBuilder {
    source_dockerfile: Option<PathBuf>,
    target_dockerfile: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    image_export_dir: Option<PathBuf>,
    export_image: bool,
    engine: Option<String>,
    variables: BTreeMap<String, String>,
    image_configuration: Option<ImageConfiguration>,
}

impl BuildContextBuilder {
    pub fn with_source_dockerfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_dockerfile = Some(path.into());
        self
    }

    pub fn with_target_dockerfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_dockerfile = Some(path.into());
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn with_image_export_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_export_dir = Some(path.into());
        self
    }

    pub fn with_export_image(mut self, export_image: bool) -> Self {
        self.export_image = export_image;
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_image_configuration(mut self, image_configuration: ImageConfiguration) -> Self {
        self.image_configuration = Some(image_configuration);
        self
    }

    /// Validates the collected values. A [`BuildContext`] only exists once this succeeds.
    pub fn build(self) -> Result<BuildContext, ConfigurationError> {
        let Self {
            source_dockerfile,
            target_dockerfile,
            output_dir,
            image_export_dir,
            export_image,
            engine,
            variables,
            image_configuration,
        } = self;

        let source_dockerfile =
            source_dockerfile.ok_or(ConfigurationError::MissingField("source_dockerfile"))?;
        let target_dockerfile =
            target_dockerfile.ok_or(ConfigurationError::MissingField("target_dockerfile"))?;
        let output_dir = output_dir.ok_or(ConfigurationError::MissingField("output_dir"))?;
        let image_export_dir =
            image_export_dir.ok_or(ConfigurationError::MissingField("image_export_dir"))?;
        let engine = engine.ok_or(ConfigurationError::MissingField("engine"))?;
        let image_configuration =
            image_configuration.ok_or(ConfigurationError::MissingField("image_configuration"))?;

        if engine.trim().is_empty() {
            return Err(ConfigurationError::EmptyEngine);
        }

        if !source_dockerfile.is_file() {
            return Err(ConfigurationError::MissingDockerfile(source_dockerfile));
        }

        if is_same_file(&source_dockerfile, &target_dockerfile) {
            return Err(ConfigurationError::SameDockerfile(source_dockerfile));
        }

        image_configuration.validate()?;

        Ok(BuildContext {
            source_dockerfile,
            target_dockerfile,
            output_dir,
            image_export_dir,
            export_image,
            engine,
            variables,
            image_configuration,
        })
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        // A target that does not exist yet can not be the source.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> BuildConfig {
        std::fs::write(dir.join("Dockerfile"), "FROM scratch\n").unwrap();
        BuildConfig {
            dockerfile_dir: dir.to_owned(),
            output_dir: dir.join("target"),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            export_image: true,
            image_export_dir: "images".to_owned(),
            image_name: Some("app".to_owned()),
            tags: vec!["latest".to_owned()],
            ..config_in(dir.path())
        };

        let context = BuildContext::from_config(&config, BTreeMap::new()).unwrap();

        assert_eq!(context.source_dockerfile(), dir.path().join("Dockerfile"));
        assert_eq!(
            context.target_dockerfile(),
            dir.path().join("target/Dockerfile")
        );
        assert_eq!(context.build_dir(), dir.path().join("target"));
        assert_eq!(context.image_export_dir(), dir.path().join("target/images"));
        assert!(context.export_image());
        assert_eq!(context.engine(), "podman");
        assert_eq!(
            context.image_configuration().full_image_names(),
            ["app:latest"]
        );
    }

    #[test]
    fn test_missing_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            dockerfile_dir: dir.path().to_owned(),
            ..Default::default()
        };

        assert_eq!(
            BuildContext::from_config(&config, BTreeMap::new()).unwrap_err(),
            ConfigurationError::MissingDockerfile(dir.path().join("Dockerfile"))
        );
    }

    #[test]
    fn test_target_must_not_overwrite_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            output_dir: dir.path().to_owned(),
            ..config_in(dir.path())
        };

        assert!(matches!(
            BuildContext::from_config(&config, BTreeMap::new()),
            Err(ConfigurationError::SameDockerfile(_))
        ));
    }

    #[test]
    fn test_invalid_export_dir_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["", "a/b", "..", "/abs"] {
            let config = BuildConfig {
                image_export_dir: name.to_owned(),
                ..config_in(dir.path())
            };
            assert_eq!(
                BuildContext::from_config(&config, BTreeMap::new()).unwrap_err(),
                ConfigurationError::InvalidExportDir(name.to_owned()),
                "{name}"
            );
        }
    }

    #[test]
    fn test_empty_engine() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            engine: " ".to_owned(),
            ..config_in(dir.path())
        };
        assert_eq!(
            BuildContext::from_config(&config, BTreeMap::new()).unwrap_err(),
            ConfigurationError::EmptyEngine
        );
    }

    #[test]
    fn test_tags_require_image_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            tags: vec!["latest".to_owned()],
            ..config_in(dir.path())
        };
        assert_eq!(
            BuildContext::from_config(&config, BTreeMap::new()).unwrap_err(),
            ConfigurationError::MissingImageName
        );
    }

    #[test]
    fn test_builder_reports_missing_fields() {
        assert_eq!(
            BuildContext::builder().build().unwrap_err(),
            ConfigurationError::MissingField("source_dockerfile")
        );
    }
}
