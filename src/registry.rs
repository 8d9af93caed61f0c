use crate::theme::{Theme, ThemeValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Layer {
    Base,
    Components,
    #[default]
    Utilities,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            important: false,
        }
    }
}

/// What a generator hands back: declarations plus an optional selector
/// template (containing `&`) applied around the class selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedRule {
    pub declarations: Vec<Declaration>,
    pub selector: Option<String>,
}

impl GeneratedRule {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        Self {
            declarations,
            selector: None,
        }
    }

    pub fn declaration(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(vec![Declaration::new(property, value)])
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.declarations.push(Declaration::new(property, value));
        self
    }

    pub fn with_selector(mut self, template: impl Into<String>) -> Self {
        self.selector = Some(template.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtilityValue {
    Bare,
    Theme {
        category: String,
        key: String,
        value: ThemeValue,
    },
    Keyword(String),
    Arbitrary { value: String, hint: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    Named(String),
    Arbitrary(String),
}

impl Modifier {
    pub fn alpha(&self, theme: &Theme) -> Option<f64> {
        let raw = match self {
            Modifier::Named(key) => theme.lookup("opacity", key)?.primary().to_string(),
            Modifier::Arbitrary(value) => value.clone(),
        };
        let raw = raw.trim();
        let alpha = match raw.strip_suffix('%') {
            Some(percent) => percent.parse::<f64>().ok()? / 100.0,
            None => raw.parse::<f64>().ok()?,
        };
        (0.0..=1.0).contains(&alpha).then_some(alpha)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilityInput {
    pub prefix: String,
    pub value: UtilityValue,
    pub modifier: Option<Modifier>,
    pub negative: bool,
}

impl UtilityInput {
    pub fn new(prefix: impl Into<String>, value: UtilityValue) -> Self {
        Self {
            prefix: prefix.into(),
            value,
            modifier: None,
            negative: false,
        }
    }

    pub fn css_value(&self) -> Option<String> {
        let raw = match &self.value {
            UtilityValue::Bare => return None,
            UtilityValue::Theme { value, .. } => value.to_css(),
            UtilityValue::Keyword(key) => key.clone(),
            UtilityValue::Arbitrary { value, .. } => value.clone(),
        };
        Some(if self.negative { negate(&raw) } else { raw })
    }
}

pub(crate) fn negate(value: &str) -> String {
    let value = value.trim();
    if let Some(stripped) = value.strip_prefix('-') {
        return stripped.to_string();
    }
    if value == "0" {
        return value.to_string();
    }
    if value.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return format!("-{}", value);
    }
    format!("calc({} * -1)", value)
}

pub type Generator = Arc<dyn Fn(&UtilityInput, &Theme) -> Option<GeneratedRule> + Send + Sync>;

#[derive(Clone)]
pub struct UtilityDefinition {
    pub prefix: String,
    pub categories: Vec<String>,
    pub layer: Layer,
    pub negative: bool,
    pub modifiers: bool,
    is_static: bool,
    generator: Generator,
}

impl UtilityDefinition {
    pub fn new<F>(prefix: impl Into<String>, generator: F) -> Self
    where
        F: Fn(&UtilityInput, &Theme) -> Option<GeneratedRule> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            categories: Vec::new(),
            layer: Layer::Utilities,
            negative: false,
            modifiers: false,
            is_static: false,
            generator: Arc::new(generator),
        }
    }

    pub fn fixed(name: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        let rule = GeneratedRule::new(declarations);
        let mut definition = Self::new(name, move |input, _| {
            matches!(input.value, UtilityValue::Bare).then(|| rule.clone())
        });
        definition.is_static = true;
        definition
    }

    pub fn categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn negative(mut self, negative: bool) -> Self {
        self.negative = negative;
        self
    }

    pub fn modifiers(mut self, modifiers: bool) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn generate(&self, input: &UtilityInput, theme: &Theme) -> Option<GeneratedRule> {
        (self.generator)(input, theme)
    }
}

impl fmt::Debug for UtilityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UtilityDefinition")
            .field("prefix", &self.prefix)
            .field("categories", &self.categories)
            .field("layer", &self.layer)
            .field("negative", &self.negative)
            .field("modifiers", &self.modifiers)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Selector(String),
    PseudoElement(String),
    AtRule(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
    /// Enclosing at-rule preludes, outermost first.
    pub at_rules: Vec<String>,
    pub layer: Layer,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    UtilityOverridden {
        prefix: String,
        previous: String,
        replacement: String,
    },
    VariantOverridden {
        name: String,
        previous: String,
        replacement: String,
    },
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEvent::UtilityOverridden {
                prefix,
                previous,
                replacement,
            } => write!(
                f,
                "utility '{}' from '{}' overridden by '{}'",
                prefix, previous, replacement
            ),
            RegistryEvent::VariantOverridden {
                name,
                previous,
                replacement,
            } => write!(
                f,
                "variant '{}' from '{}' overridden by '{}'",
                name, previous, replacement
            ),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    origin: String,
}

#[derive(Debug, Clone, Default)]
pub struct UtilityRegistry {
    utilities: HashMap<String, Entry<UtilityDefinition>>,
    variants: HashMap<String, Entry<Variant>>,
    base: Vec<BaseRule>,
    events: Vec<RegistryEvent>,
    origin: String,
}

impl UtilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_origin(&mut self, origin: &str) {
        self.origin = origin.to_string();
    }

    /// Registers a utility. A definition with an existing prefix replaces the
    /// earlier one.
    pub fn register(&mut self, definition: UtilityDefinition) {
        let prefix = definition.prefix.clone();
        let entry = Entry {
            value: definition,
            origin: self.origin.clone(),
        };
        if let Some(previous) = self.utilities.insert(prefix.clone(), entry) {
            self.record(RegistryEvent::UtilityOverridden {
                prefix,
                previous: previous.origin,
                replacement: self.origin.clone(),
            });
        }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&UtilityDefinition> {
        self.utilities.get(prefix).map(|entry| &entry.value)
    }

    pub fn register_variant(&mut self, name: impl Into<String>, variant: Variant) {
        let name = name.into();
        let entry = Entry {
            value: variant,
            origin: self.origin.clone(),
        };
        if let Some(previous) = self.variants.insert(name.clone(), entry) {
            self.record(RegistryEvent::VariantOverridden {
                name,
                previous: previous.origin,
                replacement: self.origin.clone(),
            });
        }
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name).map(|entry| &entry.value)
    }

    pub fn add_base(&mut self, rule: BaseRule) {
        self.base.push(rule);
    }

    pub fn base_rules(&self) -> &[BaseRule] {
        &self.base
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn utility_count(&self) -> usize {
        self.utilities.len()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    fn record(&mut self, event: RegistryEvent) {
        debug!("{}", event);
        self.events.push(event);
    }
}
