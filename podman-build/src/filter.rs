use std::{borrow::Cow, collections::BTreeMap, sync::LazyLock};

use log::debug;
use regex::{Captures, Regex};
use time::{macros::format_description, OffsetDateTime};

use crate::{
    config::BuildConfig,
    context::BuildContext,
    error::{FilterError, FilterOperation},
};

/// Writes the filtered copy of the Dockerfile template of a [`BuildContext`].
pub trait FileFilter {
    fn filter_dockerfile(&self, context: &BuildContext) -> Result<(), FilterError>;
}

/// Replaces `${key}` placeholders with build variables. Unknown keys are left untouched and
/// `\${key}` produces a literal `${key}`.
#[derive(Debug, Default)]
pub struct TemplateFilter;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\)?\$\{([A-Za-z0-9_.-]+)\}").unwrap());

impl TemplateFilter {
    pub fn filter_str<'a>(
        &self,
        template: &'a str,
        variables: &BTreeMap<String, String>,
    ) -> Cow<'a, str> {
        PLACEHOLDER.replace_all(template, |captures: &Captures| {
            let key = &captures[2];
            if captures.get(1).is_some() {
                return format!("${{{key}}}");
            }
            match variables.get(key) {
                Some(value) => value.clone(),
                None => captures[0].to_owned(),
            }
        })
    }
}

impl FileFilter for TemplateFilter {
    fn filter_dockerfile(&self, context: &BuildContext) -> Result<(), FilterError> {
        let source = context.source_dockerfile();
        let target = context.target_dockerfile();
        debug!("filtering {source:?} into {target:?}");

        let template = std::fs::read_to_string(source).map_err(|cause| FilterError {
            operation: FilterOperation::Read,
            path: source.to_owned(),
            cause,
        })?;

        let filtered = self.filter_str(&template, context.variables());

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|cause| FilterError {
                operation: FilterOperation::CreateDir,
                path: parent.to_owned(),
                cause,
            })?;
        }

        std::fs::write(target, filtered.as_bytes()).map_err(|cause| FilterError {
            operation: FilterOperation::Write,
            path: target.to_owned(),
            cause,
        })
    }
}

/// Collects the variables available to the Dockerfile template. Later sources win: build metadata,
/// then `env.<NAME>` for every environment variable, then the configured variables.
pub fn build_variables<I>(
    config: &BuildConfig,
    env: I,
    timestamp: OffsetDateTime,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut variables = BTreeMap::new();

    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    if let Ok(timestamp) = timestamp.to_offset(time::UtcOffset::UTC).format(format) {
        variables.insert("build.timestamp".to_owned(), timestamp);
    }
    if let Some(name) = config.image_name.as_deref() {
        variables.insert("image.name".to_owned(), name.to_owned());
    }
    variables.insert("image.tags".to_owned(), config.tags.join(","));

    variables.extend(env.into_iter().map(|(key, value)| (format!("env.{key}"), value)));

    variables.extend(
        config
            .variables
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    variables
}

/// The process environment, skipping entries that are not valid UTF-8.
pub fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn variables(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_str() {
        let variables = variables(&[("project.version", "1.2.3"), ("base", "alpine:3")]);
        let filter = TemplateFilter;

        assert_eq!(
            filter.filter_str("FROM ${base}\nLABEL version=${project.version}\n", &variables),
            "FROM alpine:3\nLABEL version=1.2.3\n"
        );
    }

    #[test]
    fn test_filter_str_keeps_unknown_and_escaped_placeholders() {
        let variables = variables(&[("home", "/srv")]);
        let filter = TemplateFilter;

        assert_eq!(
            filter.filter_str("ENV A=${unknown} B=\\${home} C=${home} D=$home", &variables),
            "ENV A=${unknown} B=${home} C=/srv D=$home"
        );
    }

    #[test]
    fn test_filter_str_without_placeholders_borrows() {
        let filter = TemplateFilter;
        assert!(matches!(
            filter.filter_str("FROM scratch", &BTreeMap::new()),
            Cow::Borrowed("FROM scratch")
        ));
    }

    #[test]
    fn test_build_variables_precedence() {
        let config = BuildConfig {
            image_name: Some("registry.example.com/app".to_owned()),
            tags: vec!["1.0.0".to_owned(), "latest".to_owned()],
            variables: variables(&[("env.HOME", "/override"), ("custom", "value")]),
            ..Default::default()
        };
        let env = [
            ("HOME".to_owned(), "/root".to_owned()),
            ("USER".to_owned(), "builder".to_owned()),
        ];

        let variables = build_variables(&config, env, datetime!(2024-05-06 07:08:09 UTC));

        assert_eq!(variables["build.timestamp"], "2024-05-06T07:08:09Z");
        assert_eq!(variables["image.name"], "registry.example.com/app");
        assert_eq!(variables["image.tags"], "1.0.0,latest");
        assert_eq!(variables["env.USER"], "builder");
        assert_eq!(variables["env.HOME"], "/override");
        assert_eq!(variables["custom"], "value");
    }

    #[test]
    fn test_filter_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Dockerfile");
        std::fs::write(&source, "FROM ${base}\n").unwrap();

        let context = BuildContext::builder()
            .with_source_dockerfile(&source)
            .with_target_dockerfile(dir.path().join("target/nested/Dockerfile"))
            .with_output_dir(dir.path().join("target"))
            .with_image_export_dir(dir.path().join("target/podman"))
            .with_engine("podman")
            .with_variables(variables(&[("base", "debian")]))
            .with_image_configuration(Default::default())
            .build()
            .unwrap();

        TemplateFilter.filter_dockerfile(&context).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("target/nested/Dockerfile")).unwrap(),
            "FROM debian\n"
        );
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "FROM ${base}\n");
    }

    #[test]
    fn test_filter_dockerfile_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Dockerfile");
        std::fs::write(&source, "FROM scratch\n").unwrap();
        // A regular file where the output directory should be.
        std::fs::write(dir.path().join("target"), "").unwrap();

        let context = BuildContext::builder()
            .with_source_dockerfile(&source)
            .with_target_dockerfile(dir.path().join("target/Dockerfile"))
            .with_output_dir(dir.path().join("target"))
            .with_image_export_dir(dir.path().join("target/podman"))
            .with_engine("podman")
            .with_image_configuration(Default::default())
            .build()
            .unwrap();

        let error = TemplateFilter.filter_dockerfile(&context).unwrap_err();
        assert_eq!(error.operation, FilterOperation::CreateDir);
        assert_eq!(error.path, dir.path().join("target"));
    }
}
