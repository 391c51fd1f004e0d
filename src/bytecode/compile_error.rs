/// Compilation errors. Every error aborts the whole compilation; there is no
/// word-at-a-time recovery and no warning path.
///
/// The driver attaches the offending token and its position in the stream via
/// [`CompileError::at`]; errors raised below the driver carry only a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A literal or offset does not fit its instruction field
    Range {
        message: String,
        token: Option<String>,
        position: Option<usize>,
    },
    /// A token that is not a primitive, number, keyword, or vocabulary entry
    UnknownWord {
        token: String,
        position: Option<usize>,
    },
    /// A construct used where the language does not allow it
    Structural {
        message: String,
        token: Option<String>,
        position: Option<usize>,
    },
    /// A name bound twice in the vocabulary
    DuplicateDefinition {
        name: String,
        position: Option<usize>,
    },
}

impl CompileError {
    pub fn range(message: impl Into<String>) -> Self {
        CompileError::Range {
            message: message.into(),
            token: None,
            position: None,
        }
    }

    pub fn unknown_word(token: impl Into<String>) -> Self {
        CompileError::UnknownWord {
            token: token.into(),
            position: None,
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        CompileError::Structural {
            message: message.into(),
            token: None,
            position: None,
        }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        CompileError::DuplicateDefinition {
            name: name.into(),
            position: None,
        }
    }

    /// Attach stream context without clobbering anything already recorded.
    pub fn at(mut self, at_token: &str, at_position: usize) -> Self {
        match &mut self {
            CompileError::Range { token, position, .. }
            | CompileError::Structural { token, position, .. } => {
                if token.is_none() {
                    *token = Some(at_token.to_string());
                }
                if position.is_none() {
                    *position = Some(at_position);
                }
            }
            CompileError::UnknownWord { position, .. }
            | CompileError::DuplicateDefinition { position, .. } => {
                if position.is_none() {
                    *position = Some(at_position);
                }
            }
        }
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Range {
                message,
                token,
                position,
            } => {
                write!(f, "compile error: {}", message)?;
                write_context(f, token.as_deref(), *position)
            }
            CompileError::UnknownWord { token, position } => {
                write!(f, "compile error: unknown word '{}'", token)?;
                write_context(f, None, *position)
            }
            CompileError::Structural {
                message,
                token,
                position,
            } => {
                write!(f, "compile error: {}", message)?;
                write_context(f, token.as_deref(), *position)
            }
            CompileError::DuplicateDefinition { name, position } => {
                write!(f, "compile error: '{}' is already defined", name)?;
                write_context(f, None, *position)
            }
        }
    }
}

fn write_context(
    f: &mut std::fmt::Formatter<'_>,
    token: Option<&str>,
    position: Option<usize>,
) -> std::fmt::Result {
    match (token, position) {
        (Some(t), Some(p)) => write!(f, " (token {} '{}')", p, t),
        (Some(t), None) => write!(f, " (token '{}')", t),
        (None, Some(p)) => write!(f, " (token {})", p),
        (None, None) => Ok(()),
    }
}

impl std::error::Error for CompileError {}
