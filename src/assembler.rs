use crate::css::indent_css_block;
use crate::registry::{Declaration, Rule};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssOutput(String);

impl CssOutput {
    pub fn new(css: String) -> Self {
        Self(css)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for CssOutput {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for CssOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<String> for CssOutput {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<CssOutput> for String {
    fn from(value: CssOutput) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assembly {
    pub rules: Vec<Rule>,
    pub css: CssOutput,
}

pub fn assemble(rules: Vec<Rule>, style: OutputStyle) -> Assembly {
    let rules = order_rules(rules);
    let css = render(&rules, style);
    Assembly { rules, css }
}

/// Stable sort by layer then first-seen ordinal. Of rules sharing at-rules,
/// selector and declaration set, only the first survives.
pub fn order_rules(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by_key(|rule| (rule.layer, rule.ordinal));

    let mut seen = HashSet::new();
    rules.retain(|rule| seen.insert(dedup_key(rule)));
    rules
}

fn dedup_key(rule: &Rule) -> (Vec<String>, String, Vec<Declaration>) {
    let mut declarations = rule.declarations.clone();
    declarations.sort();
    declarations.dedup();
    (rule.at_rules.clone(), rule.selector.clone(), declarations)
}

pub fn render(rules: &[Rule], style: OutputStyle) -> CssOutput {
    if rules.is_empty() {
        return CssOutput::default();
    }
    let blocks = rules
        .iter()
        .map(|rule| match style {
            OutputStyle::Expanded => render_expanded(rule),
            OutputStyle::Compact => render_compact(rule),
        })
        .collect::<Vec<_>>();
    let mut css = blocks.join("\n");
    css.push('\n');
    CssOutput::new(css)
}

fn render_expanded(rule: &Rule) -> String {
    let body = rule
        .declarations
        .iter()
        .map(|declaration| {
            format!(
                "  {}: {}{};",
                declaration.property,
                declaration.value,
                if declaration.important {
                    " !important"
                } else {
                    ""
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let mut css = format!("{} {{\n{}\n}}", rule.selector, body);
    for prelude in rule.at_rules.iter().rev() {
        css = format!("{} {{\n{}\n}}", prelude, indent_css_block(&css, 2));
    }
    css
}

fn render_compact(rule: &Rule) -> String {
    let body = rule
        .declarations
        .iter()
        .map(|declaration| {
            format!(
                "{}:{}{}",
                declaration.property,
                declaration.value,
                if declaration.important {
                    "!important"
                } else {
                    ""
                }
            )
        })
        .collect::<Vec<_>>()
        .join(";");
    let mut css = format!("{}{{{}}}", rule.selector, body);
    for prelude in rule.at_rules.iter().rev() {
        css = format!("{}{{{}}}", prelude, css);
    }
    css
}
