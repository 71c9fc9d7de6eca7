use crate::errors::{Error, TmpletResult};

/// The pair of markers enclosing a directive inside a template.
///
/// Two presets exist, matching the two supported syntaxes: `<% %>` (the
/// default) and `{{ }}`. Any other pair can be used, e.g. for templating
/// files that themselves contain `<%` as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    /// Start marker of a directive, default: `<%`
    pub start: &'static str,
    /// End marker of a directive, default: `%>`
    pub end: &'static str,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: "<%",
            end: "%>",
        }
    }
}

impl Delimiters {
    /// The `{{ }}` directive syntax: `{{= expr }}` for interpolation,
    /// `{{ stmt }}` for code.
    pub fn curly() -> Self {
        Self {
            start: "{{",
            end: "}}",
        }
    }

    /// Returns an error if a delimiter is empty or if the pair is ambiguous
    pub(crate) fn validate(&self) -> TmpletResult<()> {
        if self.start.is_empty() {
            return Err(Error::message("`start` delimiter cannot be empty"));
        }
        if self.end.is_empty() {
            return Err(Error::message("`end` delimiter cannot be empty"));
        }
        if self.start == self.end {
            return Err(Error::message(
                "`start` and `end` delimiters cannot have the same value",
            ));
        }
        // `<% %%>` style pairs would make every directive close one byte early
        if self.end.starts_with(self.start) || self.start.starts_with(self.end) {
            return Err(Error::message(
                "`start` and `end` delimiters cannot be prefixes of each other",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_on_invalid_delimiters() {
        let inputs = vec![
            Delimiters {
                start: "",
                ..Delimiters::default()
            },
            Delimiters {
                end: "",
                ..Delimiters::default()
            },
            Delimiters {
                start: "[[",
                end: "[[",
            },
            Delimiters {
                start: "{",
                end: "{{",
            },
        ];

        for i in inputs {
            assert!(i.validate().is_err());
        }
    }

    #[test]
    fn presets_are_valid() {
        assert!(Delimiters::default().validate().is_ok());
        assert!(Delimiters::curly().validate().is_ok());
    }
}
