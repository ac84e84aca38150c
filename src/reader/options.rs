/// How character cells are handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterOutput {
    /// Decoded through the file (or overridden) encoding.
    #[default]
    Text,
    /// Trimmed raw bytes, left undecoded.
    Bytes,
}

/// Configures how a [`SasReader`](super::SasReader) decodes rows.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    character_output: CharacterOutput,
    encoding: Option<String>,
    convert_dates: bool,
    column_names: Option<Vec<String>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            character_output: CharacterOutput::Text,
            encoding: None,
            convert_dates: true,
            column_names: None,
        }
    }

    #[must_use]
    pub const fn with_character_output(mut self, output: CharacterOutput) -> Self {
        self.character_output = output;
        self
    }

    /// Overrides the encoding announced by the file header.
    #[must_use]
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.encoding = (!label.trim().is_empty()).then_some(label);
        self
    }

    /// When disabled, date, datetime and time columns decode as numbers.
    #[must_use]
    pub const fn with_convert_dates(mut self, convert: bool) -> Self {
        self.convert_dates = convert;
        self
    }

    /// Restricts rows to the named columns, in the given order.
    #[must_use]
    pub fn with_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = names.into_iter().map(Into::into).collect();
        collected.retain(|name| !name.is_empty());
        if collected.is_empty() {
            self.column_names = None;
        } else {
            self.column_names = Some(collected);
        }
        self
    }

    #[must_use]
    pub const fn character_output(&self) -> CharacterOutput {
        self.character_output
    }

    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    #[must_use]
    pub const fn convert_dates(&self) -> bool {
        self.convert_dates
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&[String]> {
        self.column_names.as_deref()
    }
}
