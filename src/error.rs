use std::fmt;

#[derive(Debug)]
pub enum FormSealError {
    MissingTemplate(String),
    UnknownTemplate(String),
    EmptyBatch,
    Template(String),
    Font(String),
    Compose(String),
    Io(std::io::Error),
}

impl fmt::Display for FormSealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormSealError::MissingTemplate(name) => {
                write!(f, "template not available: {}", name)
            }
            FormSealError::UnknownTemplate(name) => {
                write!(f, "record references unknown template: {}", name)
            }
            FormSealError::EmptyBatch => write!(f, "no records provided to assemble"),
            FormSealError::Template(message) => write!(f, "template error: {}", message),
            FormSealError::Font(message) => write!(f, "font error: {}", message),
            FormSealError::Compose(message) => write!(f, "compose error: {}", message),
            FormSealError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for FormSealError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormSealError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FormSealError {
    fn from(value: std::io::Error) -> Self {
        FormSealError::Io(value)
    }
}
