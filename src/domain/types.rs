//! Shared domain enumerations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Markup flavour a stored body was authored in. Selects the rendering mode.
///
/// Deserialised through [`FromStr`], so content files may use `md` or `txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TextFormat {
    Html,
    #[default]
    Markdown,
    Text,
}

impl TextFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            TextFormat::Html => "html",
            TextFormat::Markdown => "markdown",
            TextFormat::Text => "text",
        }
    }
}

impl fmt::Display for TextFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(TextFormat::Html),
            "markdown" | "md" => Ok(TextFormat::Markdown),
            "text" | "txt" => Ok(TextFormat::Text),
            other => Err(DomainError::validation(format!(
                "unknown text format `{other}`"
            ))),
        }
    }
}

impl TryFrom<String> for TextFormat {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("MD".parse::<TextFormat>().unwrap(), TextFormat::Markdown);
        assert_eq!(" html ".parse::<TextFormat>().unwrap(), TextFormat::Html);
        assert_eq!("txt".parse::<TextFormat>().unwrap(), TextFormat::Text);
    }

    #[test]
    fn rejects_unknown_format() {
        let err = "rst".parse::<TextFormat>().unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&TextFormat::Markdown).unwrap();
        assert_eq!(json, "\"markdown\"");
    }

    #[test]
    fn deserialises_aliases_and_rejects_unknown() {
        let parsed: Vec<TextFormat> = serde_json::from_str(r#"["md", "TXT", "html"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![TextFormat::Markdown, TextFormat::Text, TextFormat::Html]
        );

        let err = serde_json::from_str::<TextFormat>(r#""rst""#).unwrap_err();
        assert!(err.to_string().contains("unknown text format `rst`"), "{err}");
    }
}
