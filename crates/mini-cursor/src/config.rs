use std::collections::HashMap;
use std::env;
use std::fmt::{self, Debug};
use std::path::Path;

use mini_cursor_core::DEFAULT_MAX_TURNS;
use mini_cursor_gemini_model::{GeminiConfig, GeminiConfigBuilder};

use crate::session::ToolKind;
use crate::tools::StderrPolicy;

const API_KEY: &str = "GOOGLE_API_KEY";
const MODEL: &str = "MINI_CURSOR_MODEL";
const BASE_URL: &str = "MINI_CURSOR_BASE_URL";
const TOOL: &str = "MINI_CURSOR_TOOL";
const MAX_TURNS: &str = "MINI_CURSOR_MAX_TURNS";
const STDERR_AS_FAILURE: &str = "MINI_CURSOR_STDERR_AS_FAILURE";

/// Fallback variables, read from the working directory.
pub const ENV_FILE: &str = ".env";

/// A configuration value is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable is set to something that cannot be used.
    #[error("invalid value {value:?} for {name}: expected {expected}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The value found.
        value: String,
        /// What the value should look like.
        expected: &'static str,
    },
}

/// Startup configuration, read from the environment.
#[derive(Clone)]
pub struct Config {
    /// The Gemini API key.
    pub api_key: String,
    /// The model to use, or the provider's default.
    pub model: Option<String>,
    /// The API base URL, or the provider's default.
    pub base_url: Option<String>,
    /// The tool offered to the model.
    pub tool_kind: ToolKind,
    /// The model-turn cap per message.
    pub max_turns: usize,
    /// How the shell tool treats stderr output.
    pub stderr_policy: StderrPolicy,
}

impl Config {
    /// Reads the configuration from the process environment, falling back
    /// to the variables in [`ENV_FILE`] for anything the environment does
    /// not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = read_env_file(Path::new(ENV_FILE));
        Self::from_lookup(|name| {
            env::var(name).ok().or_else(|| file.get(name).cloned())
        })
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value. Empty values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key = var(API_KEY).ok_or(ConfigError::Missing(API_KEY))?;

        let tool_kind = match var(TOOL) {
            Some(value) => {
                value.parse().map_err(|()| ConfigError::Invalid {
                    name: TOOL,
                    value,
                    expected: "`write_file` or `shell`",
                })?
            }
            None => ToolKind::default(),
        };

        let max_turns = match var(MAX_TURNS) {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: MAX_TURNS,
                        value,
                        expected: "a positive integer",
                    });
                }
            },
            None => DEFAULT_MAX_TURNS,
        };

        let stderr_policy = match var(STDERR_AS_FAILURE) {
            Some(value) => match parse_bool(&value) {
                Some(true) => StderrPolicy::TreatAsFailure,
                Some(false) => StderrPolicy::Ignore,
                None => {
                    return Err(ConfigError::Invalid {
                        name: STDERR_AS_FAILURE,
                        value,
                        expected: "`true` or `false`",
                    });
                }
            },
            None => StderrPolicy::default(),
        };

        Ok(Config {
            api_key,
            model: var(MODEL),
            base_url: var(BASE_URL),
            tool_kind,
            max_turns,
            stderr_policy,
        })
    }

    /// Builds the provider configuration.
    pub fn gemini_config(&self) -> GeminiConfig {
        let mut builder = GeminiConfigBuilder::with_api_key(&self.api_key);
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        builder.build()
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("tool_kind", &self.tool_kind)
            .field("max_turns", &self.max_turns)
            .field("stderr_policy", &self.stderr_policy)
            .finish()
    }
}

/// Reads the `KEY=value` pairs of a dotenv file. An unreadable or
/// malformed file contributes nothing.
fn read_env_file(path: &Path) -> HashMap<String, String> {
    let vars = dotenvy::from_path_iter(path)
        .and_then(|iter| iter.collect::<Result<HashMap<_, _>, _>>());
    match vars {
        Ok(vars) => {
            debug!("loaded {} variables from {}", vars.len(), path.display());
            vars
        }
        Err(err) => {
            if !err.not_found() {
                debug!("ignoring {}: {err}", path.display());
            }
            HashMap::new()
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<_, _> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[(API_KEY, "secret")]).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model, None);
        assert_eq!(config.tool_kind, ToolKind::WriteFile);
        assert_eq!(config.max_turns, DEFAULT_MAX_TURNS);
        assert_eq!(config.stderr_policy, StderrPolicy::TreatAsFailure);
        assert_eq!(config.gemini_config().model(), "gemini-2.5-flash");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (API_KEY, "secret"),
            (MODEL, "gemini-2.5-pro"),
            (TOOL, "shell"),
            (MAX_TURNS, "8"),
            (STDERR_AS_FAILURE, "false"),
        ])
        .unwrap();
        assert_eq!(config.tool_kind, ToolKind::Shell);
        assert_eq!(config.max_turns, 8);
        assert_eq!(config.stderr_policy, StderrPolicy::Ignore);
        assert_eq!(config.gemini_config().model(), "gemini-2.5-pro");
    }

    #[test]
    fn test_env_file_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ENV_FILE);
        std::fs::write(
            &path,
            "# local settings\nGOOGLE_API_KEY=from-file\nMINI_CURSOR_TOOL=\"shell\"\n",
        )
        .unwrap();

        let file = read_env_file(&path);
        assert_eq!(file.len(), 2);

        // The environment wins over the file.
        let env = HashMap::from([(TOOL.to_owned(), "write_file".to_owned())]);
        let config = Config::from_lookup(|name| {
            env.get(name).or_else(|| file.get(name)).cloned()
        })
        .unwrap();
        assert_eq!(config.api_key, "from-file");
        assert_eq!(config.tool_kind, ToolKind::WriteFile);
    }

    #[test]
    fn test_missing_env_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(&dir.path().join(ENV_FILE)).is_empty());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[(API_KEY, "  ")]),
            Err(ConfigError::Missing(API_KEY))
        ));
        for (name, value) in
            [(TOOL, "python"), (MAX_TURNS, "0"), (STDERR_AS_FAILURE, "maybe")]
        {
            let err = config(&[(API_KEY, "secret"), (name, value)]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { name: n, .. } if *n == name),
                "{err}"
            );
        }
    }
}
