use crate::assembler::OutputStyle;
use crate::content::{ContentPattern, ScanOptions};
use crate::error::ConfigError;
use crate::plugin::{DeclarativePlugin, UtilityContributor};
use crate::scanner::LexerOptions;
use crate::theme::{ThemeCategory, ThemeOverrides, ThemeValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DarkMode {
    #[default]
    Media,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThemeConfig {
    pub extend: ThemeOverrides,
    pub replace: ThemeOverrides,
}

#[derive(Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub content: Vec<ContentPattern>,
    pub theme: ThemeConfig,
    pub plugins: Vec<Arc<dyn UtilityContributor>>,
    pub separator: char,
    pub dark_mode: DarkMode,
    pub output: OutputStyle,
    pub scan: ScanOptions,
    pub lexer: LexerOptions,
    pub jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            content: Vec::new(),
            theme: ThemeConfig::default(),
            plugins: Vec::new(),
            separator: ':',
            dark_mode: DarkMode::default(),
            output: OutputStyle::default(),
            scan: ScanOptions::default(),
            lexer: LexerOptions::default(),
            jobs: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_dir", &self.base_dir)
            .field("content", &self.content)
            .field("theme", &self.theme)
            .field(
                "plugins",
                &self
                    .plugins
                    .iter()
                    .map(|plugin| plugin.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("separator", &self.separator)
            .field("dark_mode", &self.dark_mode)
            .field("output", &self.output)
            .field("scan", &self.scan)
            .field("lexer", &self.lexer)
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl Config {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, pattern: impl Into<ContentPattern>) -> Self {
        self.content.push(pattern.into());
        self
    }

    pub fn with_extend(
        mut self,
        category: &str,
        key: &str,
        value: impl Into<ThemeValue>,
    ) -> Self {
        self.theme
            .extend
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_replace(mut self, category: &str, values: ThemeCategory) -> Self {
        self.theme.replace.insert(category.to_string(), values);
        self
    }

    pub fn with_plugin(mut self, plugin: impl UtilityContributor + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_dark_mode(mut self, dark_mode: DarkMode) -> Self {
        self.dark_mode = dark_mode;
        self
    }

    pub fn with_output(mut self, output: OutputStyle) -> Self {
        self.output = output;
        self
    }

    pub fn with_scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_lexer(mut self, lexer: LexerOptions) -> Self {
        self.lexer = lexer;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    content: Vec<String>,
    #[serde(default)]
    separator: Option<char>,
    #[serde(default)]
    dark_mode: Option<DarkMode>,
    #[serde(default)]
    output: Option<OutputStyle>,
    #[serde(default)]
    theme: RawTheme,
    #[serde(default)]
    plugins: Vec<DeclarativePlugin>,
    #[serde(default)]
    scan: ScanOptions,
    #[serde(default)]
    lexer: LexerOptions,
    #[serde(default)]
    jobs: Option<usize>,
}

/// `[theme]` categories replace the defaults; `[theme.extend]` merges into them.
#[derive(Debug, Default, Deserialize)]
struct RawTheme {
    #[serde(default)]
    extend: BTreeMap<String, RawNode>,
    #[serde(flatten)]
    replace: BTreeMap<String, RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNode {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Table(BTreeMap<String, RawNode>),
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    parse(&text, path, base_dir)
}

pub fn parse(text: &str, path: &Path, base_dir: PathBuf) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    for plugin in &raw.plugins {
        plugin.validate()?;
    }

    let mut config = Config::new(base_dir);
    config.content = raw
        .content
        .iter()
        .map(|pattern| ContentPattern::new(pattern))
        .collect();
    config.theme = ThemeConfig {
        extend: flatten_overrides(raw.theme.extend)?,
        replace: flatten_overrides(raw.theme.replace)?,
    };
    config.plugins = raw
        .plugins
        .into_iter()
        .map(|plugin| Arc::new(plugin) as Arc<dyn UtilityContributor>)
        .collect();
    if let Some(separator) = raw.separator {
        config.separator = separator;
    }
    config.dark_mode = raw.dark_mode.unwrap_or_default();
    config.output = raw.output.unwrap_or_default();
    config.scan = raw.scan;
    config.lexer = raw.lexer;
    config.jobs = raw.jobs;
    Ok(config)
}

fn flatten_overrides(raw: BTreeMap<String, RawNode>) -> Result<ThemeOverrides, ConfigError> {
    let mut overrides = ThemeOverrides::new();
    for (name, node) in raw {
        let RawNode::Table(entries) = node else {
            return Err(ConfigError::InvalidTheme(format!(
                "category '{}' must be a table",
                name
            )));
        };
        let mut category = ThemeCategory::new();
        flatten_into(&name, "", entries, &mut category)?;
        overrides.insert(name, category);
    }
    Ok(overrides)
}

fn flatten_into(
    category: &str,
    prefix: &str,
    entries: BTreeMap<String, RawNode>,
    out: &mut ThemeCategory,
) -> Result<(), ConfigError> {
    for (key, node) in entries {
        if key.trim().is_empty() {
            return Err(ConfigError::InvalidTheme(format!(
                "category '{}' has an empty key",
                category
            )));
        }
        let full_key = match (prefix.is_empty(), key.as_str()) {
            (true, _) => key.clone(),
            (false, "DEFAULT") => prefix.to_string(),
            (false, _) => format!("{}-{}", prefix, key),
        };
        let value = match node {
            RawNode::Text(value) => ThemeValue::Plain(value),
            RawNode::Integer(value) => ThemeValue::Plain(value.to_string()),
            RawNode::Float(value) => ThemeValue::Plain(value.to_string()),
            RawNode::List(values) => ThemeValue::List(values),
            RawNode::Table(nested) => {
                flatten_into(category, &full_key, nested, out)?;
                continue;
            }
            RawNode::Bool(value) => {
                return Err(ConfigError::InvalidTheme(format!(
                    "'{}.{}' must be a string, number, list or table, found {}",
                    category, full_key, value
                )));
            }
        };
        out.insert(full_key, value);
    }
    Ok(())
}
