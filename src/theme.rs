mod defaults;

use std::collections::BTreeMap;
use std::fmt;

pub use defaults::default_theme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeValue {
    Plain(String),
    List(Vec<String>),
}

impl ThemeValue {
    pub fn primary(&self) -> &str {
        match self {
            ThemeValue::Plain(value) => value,
            ThemeValue::List(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        match self {
            ThemeValue::Plain(value) if idx == 0 => Some(value),
            ThemeValue::Plain(_) => None,
            ThemeValue::List(values) => values.get(idx).map(String::as_str),
        }
    }

    pub fn to_css(&self) -> String {
        match self {
            ThemeValue::Plain(value) => value.clone(),
            ThemeValue::List(values) => values.join(", "),
        }
    }
}

impl fmt::Display for ThemeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl From<&str> for ThemeValue {
    fn from(value: &str) -> Self {
        ThemeValue::Plain(value.to_string())
    }
}

impl From<String> for ThemeValue {
    fn from(value: String) -> Self {
        ThemeValue::Plain(value)
    }
}

pub type ThemeCategory = BTreeMap<String, ThemeValue>;

pub type ThemeOverrides = BTreeMap<String, ThemeCategory>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Theme {
    categories: BTreeMap<String, ThemeCategory>,
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `replace` and then `extend` on top of `defaults`.
    ///
    /// A category in `replace` swaps out the default category wholesale. A
    /// category in `extend` adds or overrides individual keys and keeps the
    /// rest. `defaults` is left untouched.
    pub fn build(defaults: &Theme, extend: &ThemeOverrides, replace: &ThemeOverrides) -> Theme {
        let mut categories = defaults.categories.clone();

        for (name, category) in replace {
            categories.insert(name.clone(), category.clone());
        }

        for (name, category) in extend {
            let target = categories.entry(name.clone()).or_default();
            for (key, value) in category {
                target.insert(key.clone(), value.clone());
            }
        }

        Theme { categories }
    }

    pub fn lookup(&self, category: &str, key: &str) -> Option<&ThemeValue> {
        self.categories.get(category)?.get(key)
    }

    pub fn category(&self, name: &str) -> Option<&ThemeCategory> {
        self.categories.get(name)
    }

    pub fn set(&mut self, category: &str, key: &str, value: impl Into<ThemeValue>) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn screens(&self) -> Vec<(String, String)> {
        let mut screens = self
            .category("screens")
            .map(|category| {
                category
                    .iter()
                    .map(|(name, value)| (name.clone(), value.primary().to_string()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        sort_breakpoints_by_length(&mut screens);
        screens
    }
}

fn sort_breakpoints_by_length(breakpoints: &mut [(String, String)]) {
    breakpoints.sort_by(|a, b| {
        if let (Some((a_num, a_unit)), Some((b_num, b_unit))) =
            (parse_length_value(&a.1), parse_length_value(&b.1))
        {
            if a_unit == b_unit {
                return a_num
                    .partial_cmp(&b_num)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0));
            }
        }
        a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0))
    });
}

fn parse_length_value(raw: &str) -> Option<(f64, String)> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let number = raw[..split].parse::<f64>().ok()?;
    Some((number, raw[split..].to_string()))
}
