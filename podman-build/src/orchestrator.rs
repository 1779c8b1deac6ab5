//! Runs the build step: filter the Dockerfile, build the image, then optionally export and tag it.

use std::fmt;

use log::{debug, info};
use time::OffsetDateTime;

use crate::{
    config::BuildConfig,
    context::BuildContext,
    error::{Error, ExportCause},
    filter,
    image::ImageHash,
    runner::CommandRunner,
    services::ServiceHub,
    Result,
};

const BUILD: &str = "build";
const SAVE: &str = "save";
const TAG: &str = "tag";
const ARCHIVE_FORMAT: &str = "oci-archive";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Built { image_hash: String },
}

#[derive(Debug, Clone, Copy)]
enum State {
    Init,
    Filtered,
    Built,
    Exported,
    Tagged,
    Done,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Init => "init",
            State::Filtered => "filtered",
            State::Built => "built",
            State::Exported => "exported",
            State::Tagged => "tagged",
            State::Done => "done",
        })
    }
}

fn enter(state: State) {
    debug!("build step state: {state}");
}

/// Builds the container image described by `config` with the services of `hub`.
pub fn execute(config: &BuildConfig, hub: &ServiceHub) -> Result<Outcome> {
    if config.skip_build {
        info!("Building container images is skipped.");
        return Ok(Outcome::Skipped);
    }

    let variables =
        filter::build_variables(config, filter::process_env(), OffsetDateTime::now_utc());
    let mut context = BuildContext::from_config(config, variables)?;
    enter(State::Init);

    debug!("Filtering Dockerfile...");
    hub.file_filter().filter_dockerfile(&context)?;
    enter(State::Filtered);

    let runner = hub.command_runner();

    build_container_image(&mut context, runner)?;
    enter(State::Built);

    if export_container_image(&context, runner)? {
        enter(State::Exported);
    }

    if tag_container_image(&context, config.skip_tag, runner)? {
        enter(State::Tagged);
    }

    enter(State::Done);
    info!("Built container image.");
    Ok(match context.image_configuration().image_hash() {
        ImageHash::Built(image_hash) => Outcome::Built {
            image_hash: image_hash.clone(),
        },
        ImageHash::Unbuilt => Outcome::Skipped,
    })
}

/// The engine prints the image hash as the last line of its output. Trailing warnings would be
/// mistaken for the hash.
fn build_container_image(context: &mut BuildContext, runner: &dyn CommandRunner) -> Result<()> {
    info!("Building container image...");

    let args = [BUILD, "."];
    let mut output = runner.run(context.build_dir(), context.engine(), &args)?;
    let Some(image_hash) = output.pop() else {
        return Err(Error::EmptyOutput {
            command: format!("{} {}", context.engine(), args.join(" ")),
        });
    };
    debug!("image hash: {image_hash}");

    context.image_configuration_mut().set_image_hash(image_hash);
    Ok(())
}

/// Returns whether the image was exported.
fn export_container_image(context: &BuildContext, runner: &dyn CommandRunner) -> Result<bool> {
    if !context.export_image() {
        return Ok(false);
    }
    let ImageHash::Built(image_hash) = context.image_configuration().image_hash() else {
        info!("No image hash available. Skipping export of container image.");
        return Ok(false);
    };

    let archive_name = format!("{image_hash}.tar.gz");
    let export_dir = context.image_export_dir();
    let destination = export_dir.join(&archive_name);
    info!("Exporting image {image_hash} to {}", destination.display());

    let to_error = |cause| Error::Export {
        image_hash: image_hash.to_owned(),
        destination: destination.clone(),
        cause,
    };

    std::fs::create_dir_all(export_dir).map_err(|error| to_error(ExportCause::Io(error)))?;

    runner
        .run(
            export_dir,
            context.engine(),
            &[
                SAVE,
                "--format",
                ARCHIVE_FORMAT,
                "-o",
                archive_name.as_str(),
                image_hash.as_str(),
            ],
        )
        .map_err(|error| to_error(ExportCause::Execution(error)))?;

    Ok(true)
}

/// Returns whether any tag was applied. The first failing tag aborts the remaining ones.
fn tag_container_image(
    context: &BuildContext,
    skip_tag: bool,
    runner: &dyn CommandRunner,
) -> Result<bool> {
    if skip_tag {
        info!("Tagging container images is skipped.");
        return Ok(false);
    }

    let image_configuration = context.image_configuration();
    if image_configuration.tags().is_empty() {
        info!("No tags specified. Skipping tagging of container images.");
        return Ok(false);
    }

    let ImageHash::Built(image_hash) = image_configuration.image_hash() else {
        info!("No image hash available. Skipping tagging container image.");
        return Ok(false);
    };

    for name in image_configuration.full_image_names() {
        info!("Tagging container image {image_hash} as {name}");

        runner
            .run(
                context.output_dir(),
                context.engine(),
                &[TAG, image_hash.as_str(), name.as_str()],
            )
            .map_err(|cause| Error::Tag {
                image_hash: image_hash.to_owned(),
                name: name.clone(),
                cause,
            })?;
    }

    Ok(true)
}
