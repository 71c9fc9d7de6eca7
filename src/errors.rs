//! The tmplet error type, with terminal error reporting for template issues.
use std::fmt;

use std::error::Error as StdError;

use crate::reporting::generate_report;
use crate::utils::Span;

/// An error message attached to a location in a template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportError {
    pub(crate) message: String,
    pub(crate) template_name: String,
    pub(crate) source: String,
    pub(crate) span: Span,
}

impl ReportError {
    pub fn new(message: String, template_name: &str, source: &str, span: &Span) -> Self {
        Self {
            message,
            template_name: template_name.to_string(),
            source: source.to_string(),
            span: span.clone(),
        }
    }

    /// Create a ReportError without name/source - must call set_source before generating report
    pub fn new_without_source(message: String, span: &Span) -> Self {
        Self {
            message,
            template_name: String::new(),
            source: String::new(),
            span: span.clone(),
        }
    }

    pub fn set_source(&mut self, template_name: &str, source: &str) {
        self.template_name = template_name.to_string();
        self.source = source.to_string();
    }

    pub fn generate_report(&self) -> String {
        generate_report(self)
    }

    pub fn unexpected_end_of_input(span: &Span) -> Self {
        Self::new_without_source("Unexpected end of input".to_string(), span)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic error
    Msg(String),
    /// The data payload is not a valid JSON object
    PayloadParse(String),
    /// Both lexer and parser errors. Will point to the template source
    SyntaxError(ReportError),
    /// An error that happens while rendering a template. Will point to the template source
    RenderingError(ReportError),
    /// A directive referenced a name that is neither a payload key nor an assigned variable
    UndefinedVariable(ReportError),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Msg(ref message) => write!(f, "{message}"),
            ErrorKind::PayloadParse(ref message) => {
                write!(f, "Invalid JSON payload: {message}")
            }
            ErrorKind::SyntaxError(s)
            | ErrorKind::RenderingError(s)
            | ErrorKind::UndefinedVariable(s) => {
                write!(f, "{}", s.generate_report())
            }
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub(crate) source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Creates generic error with a source
    pub fn chain(value: impl ToString, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            kind: ErrorKind::Msg(value.to_string()),
            source: Some(source.into()),
        }
    }

    pub fn message(message: impl ToString) -> Self {
        Self {
            kind: ErrorKind::Msg(message.to_string()),
            source: None,
        }
    }

    pub(crate) fn syntax_error(message: String, span: &Span) -> Self {
        Self {
            kind: ErrorKind::SyntaxError(ReportError::new_without_source(message, span)),
            source: None,
        }
    }

    pub(crate) fn payload_parse(error: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::PayloadParse(error.to_string()),
            source: Some(Box::new(error)),
        }
    }

    pub(crate) fn invalid_payload(message: impl ToString) -> Self {
        Self {
            kind: ErrorKind::PayloadParse(message.to_string()),
            source: None,
        }
    }

    pub(crate) fn invalid_utf8(error: std::string::FromUtf8Error) -> Self {
        Self {
            kind: ErrorKind::Msg("Invalid UTF-8 characters found while rendering".to_string()),
            source: Some(Box::new(error)),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::chain("Io error while writing rendered value to output", error)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Self::invalid_utf8(error)
    }
}

pub type TmpletResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    #[test]
    fn test_error_is_send_and_sync() {
        fn test_send_sync<T: Send + Sync>() {}

        test_send_sync::<super::Error>();
    }
}
