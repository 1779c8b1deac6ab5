//! Container image identity: the base name, the configured tags and the hash produced by the
//! build.
//!
//! Name grammar follows
//! [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go):
//!
//! ```text
//! name             := [domain '/'] path-component ['/' path-component]*
//! domain           := domain-component ['.' domain-component]* [':' port-number]
//! domain-component := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! port-number      := /[0-9]+/
//! path-component   := alpha-numeric [separator alpha-numeric]*
//! alpha-numeric    := /[a-z0-9]+/
//! separator        := /[_.]|__|[-]*/
//! tag              := /[\w][\w.-]{0,127}/
//! ```

use std::{fmt, sync::LazyLock};

use constcat::concat;
use regex::Regex;

use crate::error::ConfigurationError;

const DOMAIN_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
const DOMAIN: &str = concat!(
    DOMAIN_COMPONENT,
    r"(?:\.",
    DOMAIN_COMPONENT,
    r")*(?::[0-9]+)?"
);
const PATH_COMPONENT: &str = r"[a-z0-9]+(?:(?:[_.]|__|-*)[a-z0-9]+)*";
const NAME: &str = concat!(
    "^(?:",
    DOMAIN,
    "/)?",
    PATH_COMPONENT,
    "(?:/",
    PATH_COMPONENT,
    ")*$"
);
const TAG: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$";

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(NAME).unwrap());
static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(TAG).unwrap());

pub fn is_valid_image_name(value: &str) -> bool {
    NAME_REGEX.is_match(value)
}

pub fn is_valid_tag(value: &str) -> bool {
    TAG_REGEX.is_match(value)
}

/// The identifier of a built image, as printed by the container engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageHash {
    #[default]
    Unbuilt,
    Built(String),
}

impl ImageHash {
    pub fn as_built(&self) -> Option<&str> {
        match self {
            ImageHash::Unbuilt => None,
            ImageHash::Built(hash) => Some(hash),
        }
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageHash::Unbuilt => f.write_str("<unbuilt>"),
            ImageHash::Built(hash) => f.write_str(hash),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageConfiguration {
    name: Option<String>,
    tags: Vec<String>,
    hash: ImageHash,
}

impl ImageConfiguration {
    pub fn new(name: Option<String>, tags: Vec<String>) -> Self {
        Self {
            name,
            tags,
            hash: ImageHash::Unbuilt,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn image_hash(&self) -> &ImageHash {
        &self.hash
    }

    /// Records the hash of the built image. The build step calls this once per invocation.
    pub fn set_image_hash(&mut self, hash: String) {
        debug_assert_eq!(self.hash, ImageHash::Unbuilt, "image hash is set once");
        self.hash = ImageHash::Built(hash);
    }

    /// Fully qualified names `<name>:<tag>`, one for every configured tag and in the same order.
    pub fn full_image_names(&self) -> Vec<String> {
        let Some(name) = self.name.as_deref() else {
            return Vec::new();
        };
        self.tags
            .iter()
            .map(|tag| format!("{name}:{tag}"))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.name.as_deref() {
            Some(name) if !is_valid_image_name(name) => {
                return Err(ConfigurationError::InvalidImageName(name.to_owned()))
            }
            None if !self.tags.is_empty() => return Err(ConfigurationError::MissingImageName),
            _ => {}
        }

        if let Some(tag) = self.tags.iter().find(|tag| !is_valid_tag(tag)) {
            return Err(ConfigurationError::InvalidTag(tag.clone()));
        }

        Ok(())
    }
}
