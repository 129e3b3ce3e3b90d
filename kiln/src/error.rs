use std::borrow::Cow;
use std::fmt;

/// Represents template errors.
///
/// Errors carry a kind, an optional human readable detail and, where known,
/// the name of the template the error happened in.  The alternative
/// formatting (``format!("{:#}", err)``) also prints the chain of source
/// errors.
///
/// # Example
///
/// Here is an example of how you might want to render errors:
///
/// ```rust
/// # let env = kiln::Environment::empty();
/// match env.get_template("index.html") {
///     Ok(tmpl) => println!("{}", tmpl.render(()).unwrap()),
///     Err(err) => {
///         eprintln!("Could not load template:");
///         eprintln!("  {:#}", err);
///     }
/// }
/// ```
pub struct Error {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = f.debug_struct("Error");
        err.field("kind", &self.kind);
        if let Some(ref detail) = self.detail {
            err.field("detail", detail);
        }
        if let Some(ref name) = self.name {
            err.field("name", name);
        }
        if let Some(ref source) = self.source {
            err.field("source", source);
        }
        err.finish()
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No loader could resolve the template.
    TemplateNotFound,
    /// The compiler rejected the template source.
    CompileError,
    /// A block was requested that no template in the chain defines.
    UnknownBlock,
    /// `super` was invoked for a block without a less derived body.
    NoSuperBlock,
    /// A filter was requested that is not registered.
    UnknownFilter,
    /// The operation is not valid in the current state.
    InvalidOperation,
    /// A filter or procedure was invoked with bad arguments.
    InvalidArguments,
    /// Render data could not be converted into the value format.
    BadSerialization,
    /// Writing to the output failed.
    WriteFailure,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::TemplateNotFound => "template not found",
            ErrorKind::CompileError => "compile error",
            ErrorKind::UnknownBlock => "unknown block",
            ErrorKind::NoSuperBlock => "no super block",
            ErrorKind::UnknownFilter => "unknown filter",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::InvalidArguments => "invalid arguments",
            ErrorKind::BadSerialization => "could not serialize to value",
            ErrorKind::WriteFailure => "failed to write output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.detail {
            ok!(write!(f, "{}: {}", self.kind, detail));
        } else {
            ok!(write!(f, "{}", self.kind));
        }
        if let Some(ref name) = self.name {
            ok!(write!(f, " (in {})", name));
        }
        if f.alternate() {
            let mut source = std::error::Error::source(self);
            while let Some(err) = source {
                ok!(write!(f, "\n  caused by: {}", err));
                source = err.source();
            }
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            kind,
            detail: Some(detail.into()),
            name: None,
            source: None,
        }
    }

    pub(crate) fn new_not_found(name: &str) -> Error {
        Error::new(
            ErrorKind::TemplateNotFound,
            format!("template {:?} does not exist", name),
        )
    }

    pub(crate) fn new_unknown_block(name: &str) -> Error {
        Error::new(ErrorKind::UnknownBlock, format!("block {:?} is not defined", name))
    }

    pub(crate) fn new_no_super_block(name: &str) -> Error {
        Error::new(
            ErrorKind::NoSuperBlock,
            format!("block {:?} has no parent body", name),
        )
    }

    /// Attaches the name of the template the error happened in.
    ///
    /// An already attached name is retained so that the innermost template
    /// wins.
    pub(crate) fn with_template_name(mut self, name: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(name.into());
        }
        self
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error detail.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the name of the template the error happened in.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            detail: None,
            name: None,
            source: None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::new(ErrorKind::WriteFailure, "formatting failed")
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::BadSerialization, msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_display() {
        let err = Error::new_not_found("index.html");
        assert_eq!(
            err.to_string(),
            "template not found: template \"index.html\" does not exist"
        );
        let err = Error::from(ErrorKind::UnknownFilter).with_template_name("a.html");
        assert_eq!(err.to_string(), "unknown filter (in a.html)");
    }

    #[test]
    fn test_innermost_name_wins() {
        let err = Error::new_unknown_block("body")
            .with_template_name("inner.html")
            .with_template_name("outer.html");
        assert_eq!(err.name(), Some("inner.html"));
    }

    #[test]
    fn test_alternate_prints_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = Error::new(ErrorKind::InvalidOperation, "could not read template")
            .with_source(io);
        assert_eq!(
            format!("{:#}", err),
            "invalid operation: could not read template\n  caused by: disk on fire"
        );
    }
}
