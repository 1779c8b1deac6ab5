use std::path::PathBuf;

use clap::Parser;
use constcat::concat;
use log::debug;

use crate::{
    config::{self, BuildConfig},
    orchestrator::{self, Outcome},
    services::ServiceHub,
    Result,
};

fn variable(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err("variable name must not be empty".to_owned());
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Filter a Dockerfile template, build it with a container engine, then export and tag the image.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// YAML configuration file. Options given on the command line take precedence.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Skip building container images altogether.
    #[arg(long = "skip-build", env = "PODMAN_BUILD_SKIP")]
    pub skip_build: bool,

    /// Skip tagging the built image.
    #[arg(long = "skip-tag", env = "PODMAN_BUILD_SKIP_TAG")]
    pub skip_tag: bool,

    #[arg(long = "output-dir", help = concat!("Directory the filtered Dockerfile is written to and the build runs in [default: ", config::DEFAULT_OUTPUT_DIR, "]"))]
    pub output_dir: Option<PathBuf>,

    /// Directory containing the Dockerfile template [default: .]
    #[arg(long = "dockerfile-dir")]
    pub dockerfile_dir: Option<PathBuf>,

    #[arg(long = "dockerfile", help = concat!("File name of the Dockerfile template [default: ", config::DEFAULT_DOCKERFILE, "]"))]
    pub dockerfile_name: Option<String>,

    #[arg(long = "image-export-dir", help = concat!("Name of the directory inside the output directory that exported images are written to [default: ", config::DEFAULT_IMAGE_EXPORT_DIR, "]"))]
    pub image_export_dir: Option<String>,

    /// Export the built image as an OCI archive.
    #[arg(long = "export-image")]
    pub export_image: bool,

    /// Image name, including the registry if any, that tags are applied to.
    #[arg(long = "image-name")]
    pub image_name: Option<String>,

    /// Tag to apply to the built image. May be repeated, tags are applied in order.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    #[arg(long = "engine", help = concat!("Container engine command [default: ", config::DEFAULT_ENGINE, "]"))]
    pub engine: Option<String>,

    /// Variable available to the Dockerfile template as `${KEY}`. May be repeated.
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = variable)]
    pub variables: Vec<(String, String)>,

    /// Log debug output, including the output of the container engine.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// The configuration file, if any, with the command line options applied on top.
    pub fn build_config(&self) -> Result<BuildConfig> {
        let mut config = match self.config.as_deref() {
            Some(path) => BuildConfig::from_file(path)?,
            None => BuildConfig::default(),
        };

        config.skip_build |= self.skip_build;
        config.skip_tag |= self.skip_tag;
        config.export_image |= self.export_image;
        if let Some(value) = &self.output_dir {
            config.output_dir = value.clone();
        }
        if let Some(value) = &self.dockerfile_dir {
            config.dockerfile_dir = value.clone();
        }
        if let Some(value) = &self.dockerfile_name {
            config.dockerfile_name = value.clone();
        }
        if let Some(value) = &self.image_export_dir {
            config.image_export_dir = value.clone();
        }
        if let Some(value) = &self.image_name {
            config.image_name = Some(value.clone());
        }
        if !self.tags.is_empty() {
            config.tags = self.tags.clone();
        }
        if let Some(value) = &self.engine {
            config.engine = value.clone();
        }
        config.variables.extend(self.variables.iter().cloned());

        Ok(config)
    }

    pub fn run(self) -> Result<()> {
        let config = self.build_config()?;
        debug!("{config:?}");

        let hub = ServiceHub::default();
        match orchestrator::execute(&config, &hub)? {
            Outcome::Skipped => {}
            Outcome::Built { image_hash } => println!("{image_hash}"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_line_only() {
        let cli = Cli::try_parse_from([
            "podman-build",
            "--image-name",
            "registry.example.com/app",
            "--tag",
            "1.0.0",
            "--tag",
            "latest",
            "--export-image",
            "-D",
            "project.version=1.0.0",
            "-Dempty=",
            "--engine",
            "docker",
        ])
        .unwrap();

        let config = cli.build_config().unwrap();

        assert_eq!(config.image_name.as_deref(), Some("registry.example.com/app"));
        assert_eq!(config.tags, ["1.0.0", "latest"]);
        assert!(config.export_image);
        assert_eq!(config.engine, "docker");
        assert_eq!(config.variables["project.version"], "1.0.0");
        assert_eq!(config.variables["empty"], "");
        assert_eq!(config.output_dir, Path::new(config::DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podman-build.yaml");
        std::fs::write(
            &path,
            "
image-name: app
tags: [from-file]
output-dir: out
variables:
  a: file
  b: file
",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "podman-build",
            "--config",
            path.to_str().unwrap(),
            "--tag",
            "from-cli",
            "-D",
            "b=cli",
        ])
        .unwrap();

        let config = cli.build_config().unwrap();

        assert_eq!(config.image_name.as_deref(), Some("app"));
        assert_eq!(config.tags, ["from-cli"]);
        assert_eq!(config.output_dir, Path::new("out"));
        assert_eq!(config.variables["a"], "file");
        assert_eq!(config.variables["b"], "cli");
    }

    #[test]
    fn test_invalid_variable() {
        assert!(Cli::try_parse_from(["podman-build", "-D", "no-equals-sign"]).is_err());
        assert!(Cli::try_parse_from(["podman-build", "-D", "=value"]).is_err());
    }
}
