use crate::error::{ConfigError, PluginError};
use crate::registry::{
    BaseRule, Declaration, GeneratedRule, Layer, UtilityDefinition, UtilityRegistry, UtilityValue,
    Variant, negate,
};
use crate::theme::Theme;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Something that registers utilities, variants or base rules.
///
/// Contributors run once per compiler, in order, before any token is
/// resolved. Returning an error aborts the build with a configuration error.
pub trait UtilityContributor: Send + Sync {
    fn name(&self) -> &str;

    fn contribute(&self, api: &mut PluginApi<'_>) -> Result<(), PluginError>;
}

pub struct PluginApi<'a> {
    registry: &'a mut UtilityRegistry,
    theme: &'a Theme,
}

impl<'a> PluginApi<'a> {
    pub fn theme(&self) -> &Theme {
        self.theme
    }

    pub fn add_utility(&mut self, definition: UtilityDefinition) {
        self.registry.register(definition);
    }

    pub fn add_static(&mut self, name: &str, declarations: &[(&str, &str)]) {
        self.registry
            .register(UtilityDefinition::fixed(name, declarations_from(declarations)));
    }

    pub fn add_component(&mut self, name: &str, declarations: &[(&str, &str)]) {
        self.registry.register(
            UtilityDefinition::fixed(name, declarations_from(declarations))
                .layer(Layer::Components),
        );
    }

    pub fn add_variant(&mut self, name: &str, variant: Variant) {
        self.registry.register_variant(name, variant);
    }

    pub fn add_base(&mut self, selector: &str, declarations: &[(&str, &str)]) {
        self.registry.add_base(BaseRule {
            selector: selector.to_string(),
            declarations: declarations_from(declarations),
        });
    }
}

fn declarations_from(pairs: &[(&str, &str)]) -> Vec<Declaration> {
    pairs
        .iter()
        .map(|(property, value)| Declaration::new(*property, *value))
        .collect()
}

/// Runs the built-in contributor and then every plugin, in order, against a
/// fresh registry.
pub fn build_registry(
    theme: &Theme,
    core: &dyn UtilityContributor,
    plugins: &[Arc<dyn UtilityContributor>],
) -> Result<UtilityRegistry, ConfigError> {
    let mut registry = UtilityRegistry::new();
    let mut contributors: Vec<&dyn UtilityContributor> = vec![core];
    contributors.extend(
        plugins
            .iter()
            .map(|plugin| plugin.as_ref() as &dyn UtilityContributor),
    );

    for contributor in contributors {
        registry.set_origin(contributor.name());
        let mut api = PluginApi {
            registry: &mut registry,
            theme,
        };
        contributor
            .contribute(&mut api)
            .map_err(|err| ConfigError::plugin(contributor.name(), err.to_string()))?;
        debug!(
            plugin = contributor.name(),
            utilities = registry.utility_count(),
            variants = registry.variant_count(),
            "plugin registered"
        );
    }

    Ok(registry)
}

pub struct FnPlugin<F> {
    name: String,
    register: F,
}

impl<F> UtilityContributor for FnPlugin<F>
where
    F: Fn(&mut PluginApi<'_>) -> Result<(), PluginError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn contribute(&self, api: &mut PluginApi<'_>) -> Result<(), PluginError> {
        (self.register)(api)
    }
}

impl<F> fmt::Debug for FnPlugin<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin").field("name", &self.name).finish()
    }
}

pub fn plugin_fn<F>(name: impl Into<String>, register: F) -> FnPlugin<F>
where
    F: Fn(&mut PluginApi<'_>) -> Result<(), PluginError> + Send + Sync,
{
    FnPlugin {
        name: name.into(),
        register,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativePlugin {
    pub name: String,
    #[serde(default)]
    pub utilities: Vec<DeclarativeUtility>,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
    #[serde(default)]
    pub base: Vec<DeclarativeBase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeUtility {
    pub prefix: String,
    pub properties: Vec<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub negative: bool,
    #[serde(default)]
    pub component: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeBase {
    pub selector: String,
    pub declarations: BTreeMap<String, String>,
}

impl DeclarativePlugin {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::plugin("<unnamed>", "plugin name is empty"));
        }
        for utility in &self.utilities {
            if utility.prefix.trim().is_empty() {
                return Err(ConfigError::plugin(&self.name, "utility prefix is empty"));
            }
            if utility.properties.is_empty() {
                return Err(ConfigError::plugin(
                    &self.name,
                    format!("utility '{}' has no properties", utility.prefix),
                ));
            }
        }
        for (name, template) in &self.variants {
            if parse_variant_template(template).is_none() {
                return Err(ConfigError::plugin(
                    &self.name,
                    format!(
                        "variant '{}' must contain '&' or start with '@': {}",
                        name, template
                    ),
                ));
            }
        }
        for base in &self.base {
            if base.selector.trim().is_empty() {
                return Err(ConfigError::plugin(&self.name, "base rule selector is empty"));
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_variant_template(template: &str) -> Option<Variant> {
    let template = template.trim();
    if template.starts_with('@') {
        return Some(Variant::AtRule(template.to_string()));
    }
    if template.contains('&') {
        return Some(Variant::Selector(template.to_string()));
    }
    None
}

impl UtilityContributor for DeclarativePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn contribute(&self, api: &mut PluginApi<'_>) -> Result<(), PluginError> {
        for utility in &self.utilities {
            api.add_utility(declarative_utility(utility.clone()));
        }
        for (name, template) in &self.variants {
            let variant = parse_variant_template(template)
                .ok_or_else(|| PluginError::new(format!("invalid variant '{}'", name)))?;
            api.add_variant(name, variant);
        }
        for base in &self.base {
            let declarations = base
                .declarations
                .iter()
                .map(|(property, value)| (property.as_str(), value.as_str()))
                .collect::<Vec<_>>();
            api.add_base(&base.selector, &declarations);
        }
        Ok(())
    }
}

fn declarative_utility(utility: DeclarativeUtility) -> UtilityDefinition {
    let layer = if utility.component {
        Layer::Components
    } else {
        Layer::Utilities
    };
    let prefix = utility.prefix.clone();
    let negative = utility.negative;
    let categories = utility.theme.clone().into_iter().collect::<Vec<_>>();

    let mut definition = UtilityDefinition::new(prefix, move |input, _| {
        let value = match &input.value {
            UtilityValue::Bare => utility.values.get("DEFAULT")?.clone(),
            UtilityValue::Keyword(key) => {
                let value = utility.values.get(key)?;
                if input.negative {
                    negate(value)
                } else {
                    value.clone()
                }
            }
            UtilityValue::Theme { .. } | UtilityValue::Arbitrary { .. } => input.css_value()?,
        };
        Some(GeneratedRule::new(
            utility
                .properties
                .iter()
                .map(|property| Declaration::new(property, value.clone()))
                .collect(),
        ))
    })
    .layer(layer)
    .negative(negative);
    definition.categories = categories;
    definition
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCore;

    impl UtilityContributor for NoopCore {
        fn name(&self) -> &str {
            "core"
        }

        fn contribute(&self, api: &mut PluginApi<'_>) -> Result<(), PluginError> {
            api.add_static("hidden", &[("display", "none")]);
            api.add_variant("hover", Variant::Selector("&:hover".to_string()));
            Ok(())
        }
    }

    fn parse_plugin(text: &str) -> DeclarativePlugin {
        toml::from_str(text).expect("plugin should parse")
    }

    #[test]
    fn plugins_run_after_core_and_override_it() {
        let plugin: Arc<dyn UtilityContributor> = Arc::new(plugin_fn("display", |api| {
            api.add_static("hidden", &[("visibility", "hidden")]);
            Ok(())
        }));
        let registry =
            build_registry(&Theme::new(), &NoopCore, &[plugin]).expect("registry should build");

        let definition = registry.resolve("hidden").expect("registered");
        let rule = definition
            .generate(
                &crate::registry::UtilityInput::new("hidden", UtilityValue::Bare),
                &Theme::new(),
            )
            .expect("static rule");
        assert_eq!(rule.declarations[0].property, "visibility");
        assert_eq!(registry.events().len(), 1);
    }

    #[test]
    fn plugin_error_is_a_config_error() {
        let plugin: Arc<dyn UtilityContributor> = Arc::new(plugin_fn("broken", |_| {
            Err(PluginError::new("missing theme key"))
        }));
        let err = build_registry(&Theme::new(), &NoopCore, &[plugin]).expect_err("should fail");
        match err {
            ConfigError::InvalidPlugin { plugin, reason } => {
                assert_eq!(plugin, "broken");
                assert_eq!(reason, "missing theme key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plugins_can_read_the_theme() {
        let mut theme = Theme::new();
        theme.set("colors", "brand", "#123456");
        let plugin: Arc<dyn UtilityContributor> = Arc::new(plugin_fn("brand", |api| {
            let brand = api
                .theme()
                .lookup("colors", "brand")
                .ok_or_else(|| PluginError::new("no brand color"))?
                .to_css();
            api.add_component("btn-brand", &[("background-color", brand.as_str())]);
            Ok(())
        }));
        let registry = build_registry(&theme, &NoopCore, &[plugin]).expect("registry");
        assert_eq!(
            registry.resolve("btn-brand").map(|d| d.layer),
            Some(Layer::Components)
        );
    }

    #[test]
    fn declarative_plugin_parses_and_registers() {
        let plugin = parse_plugin(
            r#"
name = "tabs"

[[utilities]]
prefix = "tab"
properties = ["tab-size", "-moz-tab-size"]
values = { "2" = "2", "4" = "4", DEFAULT = "4" }

[variants]
hocus = "&:hover, &:focus"
print = "@media print"

[[base]]
selector = "h1"
declarations = { "font-size" = "2rem" }
"#,
        );
        plugin.validate().expect("valid plugin");

        let plugins: Vec<Arc<dyn UtilityContributor>> = vec![Arc::new(plugin)];
        let registry = build_registry(&Theme::new(), &NoopCore, &plugins).expect("registry");

        let tab = registry.resolve("tab").expect("tab registered");
        let rule = tab
            .generate(
                &crate::registry::UtilityInput::new(
                    "tab",
                    UtilityValue::Keyword("2".to_string()),
                ),
                &Theme::new(),
            )
            .expect("keyword value");
        assert_eq!(
            rule.declarations,
            vec![
                Declaration::new("tab-size", "2"),
                Declaration::new("-moz-tab-size", "2")
            ]
        );
        assert_eq!(
            registry.variant("print"),
            Some(&Variant::AtRule("@media print".to_string()))
        );
        assert_eq!(registry.base_rules().len(), 1);
    }

    #[test]
    fn declarative_plugin_rejects_bad_shapes() {
        let no_properties = parse_plugin(
            r#"
name = "bad"
[[utilities]]
prefix = "x"
properties = []
"#,
        );
        assert!(matches!(
            no_properties.validate(),
            Err(ConfigError::InvalidPlugin { .. })
        ));

        let bad_variant = parse_plugin(
            r#"
name = "bad"
[variants]
weird = ":hover"
"#,
        );
        assert!(bad_variant.validate().is_err());

        let empty_prefix = parse_plugin(
            r#"
name = "bad"
[[utilities]]
prefix = ""
properties = ["color"]
"#,
        );
        assert!(empty_prefix.validate().is_err());
    }

    #[test]
    fn unknown_declarative_keys_are_rejected() {
        let parsed = toml::from_str::<DeclarativePlugin>("name = \"x\"\nbogus = 1\n");
        assert!(parsed.is_err());
    }
}
