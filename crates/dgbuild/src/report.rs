use std::fmt;

/// Category of a non-fatal problem recorded during a run.
///
/// None of these abort a build: the pipeline always produces a best-effort bundle and
/// reports what went wrong in a summary line and in the returned [`RunReport`]. Minifier
/// warnings have no category; they are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A configured source path does not exist on disk
    MissingFile,
    /// A requested module or package is not present in the registry
    UnknownModule,
    /// The linter reported at least one diagnostic
    LintFinding,
    /// Declared dependency lists are inconsistent (unknown, cyclic or not flattened)
    DependencyAudit,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MissingFile => "Missing files",
            Self::UnknownModule => "Unknown modules",
            Self::LintFinding => "Lint",
            Self::DependencyAudit => "Dependency audit",
        };
        f.write_str(label)
    }
}

/// Run-scoped list of error categories, in the order they were recorded.
///
/// A category is pushed once per occurrence, so the list doubles as a rough counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    errors: Vec<ErrorCategory>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: ErrorCategory) {
        self.errors.push(category);
    }

    /// Append every entry of `other`, keeping its order
    pub fn merge(&mut self, other: &Self) {
        self.errors.extend_from_slice(&other.errors);
    }

    pub fn errors(&self) -> &[ErrorCategory] {
        &self.errors
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded entries of the given category
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.errors.iter().filter(|&&c| c == category).count()
    }

    pub fn contains(&self, category: ErrorCategory) -> bool {
        self.errors.contains(&category)
    }

    /// Log the end-of-run summary line
    pub fn log_summary(&self, action: &str) {
        if self.is_success() {
            log::info!("{action} successfully completed!");
        } else {
            log::error!("{action} ended with errors! [{self}]");
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, category) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{category}")?;
        }
        Ok(())
    }
}
