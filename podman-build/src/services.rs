use crate::{
    filter::{FileFilter, TemplateFilter},
    runner::{CommandRunner, ProcessRunner},
};

/// The collaborators of one build invocation.
pub struct ServiceHub {
    command_runner: Box<dyn CommandRunner>,
    file_filter: Box<dyn FileFilter>,
}

impl ServiceHub {
    pub fn new(command_runner: Box<dyn CommandRunner>, file_filter: Box<dyn FileFilter>) -> Self {
        Self {
            command_runner,
            file_filter,
        }
    }

    pub fn command_runner(&self) -> &dyn CommandRunner {
        self.command_runner.as_ref()
    }

    pub fn file_filter(&self) -> &dyn FileFilter {
        self.file_filter.as_ref()
    }
}

impl Default for ServiceHub {
    /// Runs real processes and filters with [`TemplateFilter`].
    fn default() -> Self {
        Self::new(Box::new(ProcessRunner), Box::new(TemplateFilter))
    }
}
