//! Supported languages and their compile/run configuration

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A language submissions can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    JavaScript,
    Cpp,
    C,
    Rust,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::Java,
        Language::JavaScript,
        Language::Cpp,
        Language::C,
        Language::Rust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Rust => "rust",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Language {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "cpp" | "c++" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "rust" | "rs" => Ok(Language::Rust),
            _ => Err(EngineError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// How to build and run one language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Name of the source file (e.g., "main.cpp")
    pub source_file: String,
    /// Compile command template (None if not needed)
    pub compile_command: Option<Vec<String>>,
    /// Run command template
    pub run_command: Vec<String>,
    /// Time limit multiplier and bonus: (multiplier, bonus_ms)
    /// actual_time = base_time * multiplier + bonus
    pub time_limit: Option<(u64, u64)>,
}

impl LanguageConfig {
    /// Adjusted time limit in milliseconds for a base limit
    pub fn calculate_time_limit(&self, base_time_ms: u64) -> u64 {
        match self.time_limit {
            Some((multiplier, bonus_ms)) => base_time_ms * multiplier + bonus_ms,
            None => base_time_ms,
        }
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    compile_command: Option<String>,
    run_command: String,
    #[serde(default)]
    time_limit: Vec<u64>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Language configurations keyed by language
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    configs: HashMap<Language, LanguageConfig>,
    aliases: HashMap<String, Language>,
}

impl LanguageRegistry {
    /// Load language configurations from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read language config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse language config: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;
        let mut registry = Self::default();

        for (name, raw) in raw_configs {
            let language: Language = name
                .parse()
                .with_context(|| format!("Unknown language section: [{}]", name))?;

            let time_limit = match raw.time_limit.as_slice() {
                [] => None,
                [multiplier, bonus] => Some((*multiplier, *bonus)),
                other => anyhow::bail!("Invalid time limit for {}: {:?}", name, other),
            };

            let config = LanguageConfig {
                source_file: raw.source_file,
                compile_command: raw.compile_command.map(|cmd| into_command(&cmd)),
                run_command: into_command(&raw.run_command),
                time_limit,
            };
            if config.run_command.is_empty() {
                anyhow::bail!("Empty run command for {}", name);
            }

            registry.aliases.insert(name.to_lowercase(), language);
            for alias in raw.aliases {
                registry.aliases.insert(alias.to_lowercase(), language);
            }
            registry.configs.insert(language, config);
        }

        Ok(registry)
    }

    pub fn get(&self, language: &Language) -> Option<&LanguageConfig> {
        self.configs.get(language)
    }

    /// Resolve a name or alias to a configured language
    pub fn resolve(&self, name: &str) -> Result<Language, EngineError> {
        let key = name.trim().to_lowercase();
        if let Some(language) = self.aliases.get(&key) {
            return Ok(*language);
        }
        let language: Language = name.parse()?;
        if self.configs.contains_key(&language) {
            Ok(language)
        } else {
            Err(EngineError::UnsupportedLanguage(name.to_string()))
        }
    }

    /// Get all configured language names
    pub fn supported_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().map(|l| l.to_string()).collect();
        names.sort();
        names
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[c]
source_file = "main.c"
compile_command = "gcc -o main main.c"
run_command = "./main"
time_limit = [1, 0]

[python]
source_file = "main.py"
run_command = "python3 main.py"
time_limit = [3, 2000]
aliases = ["py", "python3"]
"#
        )
        .unwrap();
        file
    }

    #[test]
    fn test_load_languages() {
        let config_file = create_test_config();
        let registry = LanguageRegistry::load(config_file.path()).unwrap();

        let python = registry.get(&Language::Python).unwrap();
        assert_eq!(python.run_command, vec!["python3", "main.py"]);
        assert!(python.compile_command.is_none());
        assert_eq!(python.calculate_time_limit(1000), 5000);

        let c = registry.get(&Language::C).unwrap();
        assert_eq!(c.compile_command.as_ref().unwrap()[0], "gcc");
        assert_eq!(registry.supported_languages(), vec!["c", "python"]);
    }

    #[test]
    fn test_resolve_aliases() {
        let config_file = create_test_config();
        let registry = LanguageRegistry::load(config_file.path()).unwrap();

        assert_eq!(registry.resolve("PY").unwrap(), Language::Python);
        assert_eq!(registry.resolve("c").unwrap(), Language::C);
        // Known language, but not configured
        assert!(registry.resolve("java").is_err());
        assert!(matches!(
            registry.resolve("cobol"),
            Err(EngineError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_shipped_languages_file() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("files/languages.toml");
        let registry = LanguageRegistry::load(path).unwrap();

        assert_eq!(registry.supported_languages().len(), Language::ALL.len());
        assert_eq!(registry.resolve("node").unwrap(), Language::JavaScript);
        let java = registry.get(&Language::Java).unwrap();
        assert_eq!(java.calculate_time_limit(1000), 3000);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("JavaScript".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert!("brainfuck".parse::<Language>().is_err());
    }
}
