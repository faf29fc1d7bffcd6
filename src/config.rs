//! Configuration of the command line tool.
//!
//! The config can be read from a toml file at
//! `~/.config/tex-math/config.toml`; every field is optional and missing
//! files fall back to defaults. The config converts into the parser
//! [`Options`].

use std::error::Error;

use serde::{Deserialize, Serialize};

use crate::math_interpreter::{Options, ParseError};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    allow_thousands_separator: Option<bool>,
    /// Each character of the string is accepted as a thousands separator.
    thousands_separator: Option<String>,
    /// Each entry must be a single character.
    decimal_separator: Option<Vec<String>>,
    decimal_places: Option<u32>,
    strict: Option<bool>,
    compare_grouping: Option<bool>,
    keep_text_whitespace: Option<bool>,
    ignore_text: Option<bool>,
}

impl Config {
    fn default() -> Self {
        Config {
            allow_thousands_separator: Some(false),
            thousands_separator: None,
            decimal_separator: None,
            decimal_places: None,
            strict: Some(false),
            compare_grouping: Some(false),
            keep_text_whitespace: Some(false),
            ignore_text: Some(false),
        }
    }

    /// Read the config file; cli flags are applied by the caller.
    pub fn init() -> Self {
        Self::from_file().unwrap_or_else(|e| {
            warn!("Failed to read config file: {}", e);
            Self::default()
        })
    }

    fn from_file() -> Result<Self, Box<dyn Error>> {
        use std::env;
        use std::fs;
        let home_dir: String = env::var("HOME")?;
        let config_str =
            match fs::read_to_string(home_dir + "/.config/tex-math/config.toml") {
                Ok(s) => {
                    debug!("Config file read successfully");
                    s
                }
                Err(_) => {
                    return Ok(Self::default());
                }
            };
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }

    /// Convert into parser options, rejecting malformed separator sets.
    pub fn to_options(&self) -> Result<Options, ParseError> {
        let mut options = Options::default();
        if let Some(allow) = self.allow_thousands_separator {
            options.allow_thousands_separator = allow;
        }
        if let Some(seps) = &self.thousands_separator {
            options.set_thousands_separator = seps.chars().collect();
        }
        if let Some(entries) = &self.decimal_separator {
            let mut chars = vec![];
            for entry in entries {
                let mut it = entry.chars();
                match (it.next(), it.next()) {
                    (Some(c), None) => chars.push(c),
                    _ => return Err(ParseError::new(1002, &[entry])),
                }
            }
            options.set_decimal_separator = chars;
        }
        options.decimal_places = self.decimal_places;
        options.strict = self.strict.unwrap_or(false);
        options.compare_grouping = self.compare_grouping.unwrap_or(false);
        options.keep_text_whitespace = self.keep_text_whitespace.unwrap_or(false);
        options.ignore_text = self.ignore_text.unwrap_or(false);
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_options() {
        let config: Config = toml::from_str(
            r#"
            allow_thousands_separator = true
            thousands_separator = ","
            decimal_places = 2
            strict = true
            "#,
        )
        .unwrap();
        let options = config.to_options().unwrap();
        assert!(options.allow_thousands_separator);
        assert_eq!(options.set_thousands_separator, vec![',']);
        assert_eq!(options.decimal_places, Some(2));
        assert!(options.strict);
    }

    #[test]
    fn test_decimal_separator_must_be_one_char() {
        let config: Config = toml::from_str(r#"decimal_separator = [",,"]"#).unwrap();
        assert_eq!(config.to_options().unwrap_err().code(), 1002);
    }

    #[test]
    fn test_conflicting_separators_rejected() {
        let config: Config = toml::from_str(
            r#"
            thousands_separator = ","
            decimal_separator = [","]
            "#,
        )
        .unwrap();
        assert_eq!(config.to_options().unwrap_err().code(), 1008);
    }
}
