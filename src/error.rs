use std::fmt;
use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};

/// Why a script could not be turned into a runnable effect.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    Header(HeaderError),
    Parse(ParseError),
}

/// Malformed metadata lines before the first section.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderError {
    InvalidSlider { line: usize, text: String },
    SliderIndexOutOfRange { line: usize, index: usize },
    InvalidNumber { line: usize, field: &'static str, text: String },
}

/// Body errors. Ordinary syntax mistakes are tolerated; only input the
/// parser cannot build a tree for at all ends up here.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    NestingTooDeep { line: usize, column: usize },
}

/// Why a script could not be handed to the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub enum HandoffError {
    Load(LoadError),
    /// The audio thread has not yet picked up earlier scripts.
    QueueFull,
}

impl LoadError {
    /// 1-based source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            LoadError::Header(HeaderError::InvalidSlider { line, .. })
            | LoadError::Header(HeaderError::SliderIndexOutOfRange { line, .. })
            | LoadError::Header(HeaderError::InvalidNumber { line, .. })
            | LoadError::Parse(ParseError::NestingTooDeep { line, .. }) => *line,
        }
    }

    /// Render a source-annotated diagnostic for editors and logs.
    pub fn report(&self, name: &str, source: &str) -> String {
        let span = line_span(source, self.line());
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, (name, span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message(self.to_string())
            .with_label(Label::new((name, span)).with_message(self.label()))
            .finish()
            .write((name, Source::from(source)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LoadError::Header(_) => "in this header line",
            LoadError::Parse(_) => "nested too deeply here",
        }
    }
}

/// Byte range of a 1-based line, clamped to the source.
fn line_span(source: &str, line: usize) -> Range<usize> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let trimmed = text.trim_end_matches(['\n', '\r']).len();
            return start..start + trimmed.max(1);
        }
        start += text.len();
    }
    let end = source.len();
    end.saturating_sub(1)..end
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Header(e) => write!(f, "Header error: {e}"),
            LoadError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::InvalidSlider { line, text } => {
                write!(f, "Malformed slider definition '{text}' on line {line}")
            }
            HeaderError::SliderIndexOutOfRange { line, index } => {
                write!(f, "Slider index {index} on line {line} is outside 1..=64")
            }
            HeaderError::InvalidNumber { line, field, text } => {
                write!(f, "Invalid {field} value '{text}' on line {line}")
            }
        }
    }
}

impl std::error::Error for HeaderError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NestingTooDeep { line, column } => {
                write!(f, "Expression nested too deeply at line {line}, column {column}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffError::Load(e) => write!(f, "{e}"),
            HandoffError::QueueFull => write!(f, "Script queue is full"),
        }
    }
}

impl std::error::Error for HandoffError {}

impl From<LoadError> for HandoffError {
    fn from(e: LoadError) -> Self {
        HandoffError::Load(e)
    }
}

impl From<HeaderError> for LoadError {
    fn from(e: HeaderError) -> Self {
        LoadError::Header(e)
    }
}

impl From<ParseError> for LoadError {
    fn from(e: ParseError) -> Self {
        LoadError::Parse(e)
    }
}
