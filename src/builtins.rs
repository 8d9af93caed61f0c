use crate::config::DarkMode;
use crate::css::{color_with_alpha, is_color_like_value};
use crate::error::PluginError;
use crate::plugin::{PluginApi, UtilityContributor};
use crate::registry::{
    Declaration, GeneratedRule, UtilityDefinition, UtilityInput, UtilityValue, Variant, negate,
};
use crate::theme::{Theme, ThemeValue};

const STATIC_UTILITIES: &[(&str, &str)] = &[
    ("block", "display:block"),
    ("inline-block", "display:inline-block"),
    ("inline", "display:inline"),
    ("inline-flex", "display:inline-flex"),
    ("grid", "display:grid"),
    ("inline-grid", "display:inline-grid"),
    ("table", "display:table"),
    ("contents", "display:contents"),
    ("hidden", "display:none"),
    ("static", "position:static"),
    ("fixed", "position:fixed"),
    ("absolute", "position:absolute"),
    ("relative", "position:relative"),
    ("sticky", "position:sticky"),
    ("visible", "visibility:visible"),
    ("invisible", "visibility:hidden"),
    ("flex-row", "flex-direction:row"),
    ("flex-row-reverse", "flex-direction:row-reverse"),
    ("flex-col", "flex-direction:column"),
    ("flex-col-reverse", "flex-direction:column-reverse"),
    ("flex-wrap", "flex-wrap:wrap"),
    ("flex-wrap-reverse", "flex-wrap:wrap-reverse"),
    ("flex-nowrap", "flex-wrap:nowrap"),
    ("items-start", "align-items:flex-start"),
    ("items-end", "align-items:flex-end"),
    ("items-center", "align-items:center"),
    ("items-baseline", "align-items:baseline"),
    ("items-stretch", "align-items:stretch"),
    ("justify-start", "justify-content:flex-start"),
    ("justify-end", "justify-content:flex-end"),
    ("justify-center", "justify-content:center"),
    ("justify-between", "justify-content:space-between"),
    ("justify-around", "justify-content:space-around"),
    ("justify-evenly", "justify-content:space-evenly"),
    ("self-auto", "align-self:auto"),
    ("self-start", "align-self:flex-start"),
    ("self-end", "align-self:flex-end"),
    ("self-center", "align-self:center"),
    ("self-stretch", "align-self:stretch"),
    ("text-left", "text-align:left"),
    ("text-center", "text-align:center"),
    ("text-right", "text-align:right"),
    ("text-justify", "text-align:justify"),
    ("text-start", "text-align:start"),
    ("text-end", "text-align:end"),
    ("italic", "font-style:italic"),
    ("not-italic", "font-style:normal"),
    ("underline", "text-decoration-line:underline"),
    ("overline", "text-decoration-line:overline"),
    ("line-through", "text-decoration-line:line-through"),
    ("no-underline", "text-decoration-line:none"),
    ("uppercase", "text-transform:uppercase"),
    ("lowercase", "text-transform:lowercase"),
    ("capitalize", "text-transform:capitalize"),
    ("normal-case", "text-transform:none"),
    (
        "truncate",
        "overflow:hidden;text-overflow:ellipsis;white-space:nowrap",
    ),
    ("whitespace-normal", "white-space:normal"),
    ("whitespace-nowrap", "white-space:nowrap"),
    ("whitespace-pre", "white-space:pre"),
    ("whitespace-pre-line", "white-space:pre-line"),
    ("whitespace-pre-wrap", "white-space:pre-wrap"),
    ("break-words", "overflow-wrap:break-word"),
    ("break-all", "word-break:break-all"),
    (
        "antialiased",
        "-webkit-font-smoothing:antialiased;-moz-osx-font-smoothing:grayscale",
    ),
    (
        "subpixel-antialiased",
        "-webkit-font-smoothing:auto;-moz-osx-font-smoothing:auto",
    ),
    ("tabular-nums", "font-variant-numeric:tabular-nums"),
    ("list-none", "list-style-type:none"),
    ("list-disc", "list-style-type:disc"),
    ("list-decimal", "list-style-type:decimal"),
    ("overflow-auto", "overflow:auto"),
    ("overflow-hidden", "overflow:hidden"),
    ("overflow-clip", "overflow:clip"),
    ("overflow-visible", "overflow:visible"),
    ("overflow-scroll", "overflow:scroll"),
    ("overflow-x-auto", "overflow-x:auto"),
    ("overflow-x-hidden", "overflow-x:hidden"),
    ("overflow-x-scroll", "overflow-x:scroll"),
    ("overflow-y-auto", "overflow-y:auto"),
    ("overflow-y-hidden", "overflow-y:hidden"),
    ("overflow-y-scroll", "overflow-y:scroll"),
    ("box-border", "box-sizing:border-box"),
    ("box-content", "box-sizing:content-box"),
    ("object-contain", "object-fit:contain"),
    ("object-cover", "object-fit:cover"),
    ("object-fill", "object-fit:fill"),
    ("object-none", "object-fit:none"),
    ("pointer-events-none", "pointer-events:none"),
    ("pointer-events-auto", "pointer-events:auto"),
    ("select-none", "user-select:none"),
    ("select-text", "user-select:text"),
    ("select-all", "user-select:all"),
    ("select-auto", "user-select:auto"),
    ("resize", "resize:both"),
    ("resize-none", "resize:none"),
    ("border-solid", "border-style:solid"),
    ("border-dashed", "border-style:dashed"),
    ("border-dotted", "border-style:dotted"),
    ("border-none", "border-style:none"),
    (
        "outline-none",
        "outline:2px solid transparent;outline-offset:2px",
    ),
    (
        "sr-only",
        "position:absolute;width:1px;height:1px;padding:0;margin:-1px;overflow:hidden;clip:rect(0, 0, 0, 0);white-space:nowrap;border-width:0",
    ),
    (
        "not-sr-only",
        "position:static;width:auto;height:auto;padding:0;margin:0;overflow:visible;clip:auto;white-space:normal",
    ),
];

/// Prefixes whose value is written straight into one or more properties.
/// Columns: prefix, theme categories, properties, accepts negative values.
const PROPERTY_UTILITIES: &[(&str, &[&str], &[&str], bool)] = &[
    ("p", &["spacing"], &["padding"], false),
    ("px", &["spacing"], &["padding-left", "padding-right"], false),
    ("py", &["spacing"], &["padding-top", "padding-bottom"], false),
    ("pt", &["spacing"], &["padding-top"], false),
    ("pr", &["spacing"], &["padding-right"], false),
    ("pb", &["spacing"], &["padding-bottom"], false),
    ("pl", &["spacing"], &["padding-left"], false),
    ("gap", &["spacing"], &["gap"], false),
    ("gap-x", &["spacing"], &["column-gap"], false),
    ("gap-y", &["spacing"], &["row-gap"], false),
    ("inset", &["inset", "spacing"], &["inset"], true),
    ("inset-x", &["inset", "spacing"], &["left", "right"], true),
    ("inset-y", &["inset", "spacing"], &["top", "bottom"], true),
    ("top", &["inset", "spacing"], &["top"], true),
    ("right", &["inset", "spacing"], &["right"], true),
    ("bottom", &["inset", "spacing"], &["bottom"], true),
    ("left", &["inset", "spacing"], &["left"], true),
    ("w", &["width", "spacing"], &["width"], false),
    ("min-w", &["width", "spacing"], &["min-width"], false),
    ("max-w", &["maxWidth"], &["max-width"], false),
    ("h", &["height", "spacing"], &["height"], false),
    ("min-h", &["height", "spacing"], &["min-height"], false),
    ("max-h", &["height", "spacing"], &["max-height"], false),
    ("basis", &["width", "spacing"], &["flex-basis"], false),
    ("z", &["zIndex"], &["z-index"], true),
    ("opacity", &["opacity"], &["opacity"], false),
    ("leading", &["lineHeight"], &["line-height"], false),
    ("tracking", &["letterSpacing"], &["letter-spacing"], true),
    ("rounded", &["borderRadius"], &["border-radius"], false),
    (
        "rounded-t",
        &["borderRadius"],
        &["border-top-left-radius", "border-top-right-radius"],
        false,
    ),
    (
        "rounded-r",
        &["borderRadius"],
        &["border-top-right-radius", "border-bottom-right-radius"],
        false,
    ),
    (
        "rounded-b",
        &["borderRadius"],
        &["border-bottom-right-radius", "border-bottom-left-radius"],
        false,
    ),
    (
        "rounded-l",
        &["borderRadius"],
        &["border-top-left-radius", "border-bottom-left-radius"],
        false,
    ),
    ("rounded-tl", &["borderRadius"], &["border-top-left-radius"], false),
    ("rounded-tr", &["borderRadius"], &["border-top-right-radius"], false),
    ("rounded-br", &["borderRadius"], &["border-bottom-right-radius"], false),
    ("rounded-bl", &["borderRadius"], &["border-bottom-left-radius"], false),
    ("shadow", &["boxShadow"], &["box-shadow"], false),
    ("grid-cols", &["gridTemplateColumns"], &["grid-template-columns"], false),
    ("duration", &["transitionDuration"], &["transition-duration"], false),
    ("delay", &["transitionDuration"], &["transition-delay"], false),
    ("ease", &["transitionTimingFunction"], &["transition-timing-function"], false),
    ("cursor", &["cursor"], &["cursor"], false),
];

const MARGIN_UTILITIES: &[(&str, &[&str])] = &[
    ("m", &["margin"]),
    ("mx", &["margin-left", "margin-right"]),
    ("my", &["margin-top", "margin-bottom"]),
    ("mt", &["margin-top"]),
    ("mr", &["margin-right"]),
    ("mb", &["margin-bottom"]),
    ("ml", &["margin-left"]),
];

const SPACE_UTILITIES: &[(&str, &[&str])] = &[
    ("space-x", &["margin-left"]),
    ("space-y", &["margin-top"]),
];

const BORDER_UTILITIES: &[(&str, &[&str], &[&str])] = &[
    ("border", &["border-width"], &["border-color"]),
    (
        "border-x",
        &["border-left-width", "border-right-width"],
        &["border-left-color", "border-right-color"],
    ),
    (
        "border-y",
        &["border-top-width", "border-bottom-width"],
        &["border-top-color", "border-bottom-color"],
    ),
    ("border-t", &["border-top-width"], &["border-top-color"]),
    ("border-r", &["border-right-width"], &["border-right-color"]),
    ("border-b", &["border-bottom-width"], &["border-bottom-color"]),
    ("border-l", &["border-left-width"], &["border-left-color"]),
];

const PSEUDO_CLASS_VARIANTS: &[(&str, &str)] = &[
    ("hover", "&:hover"),
    ("focus", "&:focus"),
    ("focus-visible", "&:focus-visible"),
    ("focus-within", "&:focus-within"),
    ("active", "&:active"),
    ("visited", "&:visited"),
    ("target", "&:target"),
    ("first", "&:first-child"),
    ("last", "&:last-child"),
    ("only", "&:only-child"),
    ("odd", "&:nth-child(odd)"),
    ("even", "&:nth-child(even)"),
    ("first-of-type", "&:first-of-type"),
    ("last-of-type", "&:last-of-type"),
    ("empty", "&:empty"),
    ("disabled", "&:disabled"),
    ("enabled", "&:enabled"),
    ("checked", "&:checked"),
    ("indeterminate", "&:indeterminate"),
    ("required", "&:required"),
    ("invalid", "&:invalid"),
    ("valid", "&:valid"),
    ("read-only", "&:read-only"),
    ("placeholder-shown", "&:placeholder-shown"),
    ("autofill", "&:autofill"),
    ("open", "&[open]"),
    ("placeholder", "&::placeholder"),
    ("selection", "&::selection"),
    ("marker", "&::marker"),
    ("file", "&::file-selector-button"),
    ("first-letter", "&::first-letter"),
    ("first-line", "&::first-line"),
    ("rtl", "[dir=\"rtl\"] &"),
    ("ltr", "[dir=\"ltr\"] &"),
];

const PSEUDO_ELEMENT_VARIANTS: &[(&str, &str)] = &[("before", "&::before"), ("after", "&::after")];

const AT_RULE_VARIANTS: &[(&str, &str)] = &[
    ("motion-safe", "@media (prefers-reduced-motion: no-preference)"),
    ("motion-reduce", "@media (prefers-reduced-motion: reduce)"),
    ("contrast-more", "@media (prefers-contrast: more)"),
    ("contrast-less", "@media (prefers-contrast: less)"),
    ("portrait", "@media (orientation: portrait)"),
    ("landscape", "@media (orientation: landscape)"),
    ("print", "@media print"),
];

const ARIA_STATES: &[&str] = &[
    "busy", "checked", "disabled", "expanded", "hidden", "pressed", "readonly", "required",
    "selected",
];

const TRANSITION_COLORS: &str =
    "color, background-color, border-color, text-decoration-color, fill, stroke";
const TRANSITION_DEFAULT: &str = "color, background-color, border-color, text-decoration-color, fill, stroke, opacity, box-shadow, transform, filter, backdrop-filter";

#[derive(Debug, Clone, Copy, Default)]
pub struct CoreUtilities {
    dark_mode: DarkMode,
}

impl CoreUtilities {
    pub fn new(dark_mode: DarkMode) -> Self {
        Self { dark_mode }
    }
}

impl UtilityContributor for CoreUtilities {
    fn name(&self) -> &str {
        "core"
    }

    fn contribute(&self, api: &mut PluginApi<'_>) -> Result<(), PluginError> {
        register_static_utilities(api);
        register_property_utilities(api);
        register_color_utilities(api);
        register_layout_utilities(api);
        register_transition_utilities(api);
        register_variants(api, self.dark_mode);
        Ok(())
    }
}

fn register_static_utilities(api: &mut PluginApi<'_>) {
    for (name, declarations) in STATIC_UTILITIES {
        api.add_utility(UtilityDefinition::fixed(
            *name,
            parse_declarations(declarations),
        ));
    }
}

fn register_property_utilities(api: &mut PluginApi<'_>) {
    for (prefix, categories, properties, negative) in PROPERTY_UTILITIES {
        api.add_utility(
            UtilityDefinition::new(*prefix, property_generator(properties, &[]))
                .categories(categories)
                .negative(*negative),
        );
    }
    for (prefix, properties) in MARGIN_UTILITIES {
        api.add_utility(
            UtilityDefinition::new(*prefix, property_generator(properties, &["auto"]))
                .categories(&["spacing"])
                .negative(true),
        );
    }
    for (prefix, properties) in SPACE_UTILITIES {
        let generator = property_generator(properties, &[]);
        api.add_utility(
            UtilityDefinition::new(*prefix, move |input, theme| {
                Some(generator(input, theme)?.with_selector("& > :not([hidden]) ~ :not([hidden])"))
            })
            .categories(&["spacing"])
            .negative(true),
        );
    }
}

fn register_color_utilities(api: &mut PluginApi<'_>) {
    api.add_utility(
        UtilityDefinition::new("text", |input, theme| match &input.value {
            UtilityValue::Theme {
                category, value, ..
            } if category == "fontSize" => {
                if input.modifier.is_some() {
                    return None;
                }
                font_size(value)
            }
            UtilityValue::Theme { .. } => color_rule(&["color"], input, theme),
            UtilityValue::Arbitrary { value, hint } => {
                if is_color_value(value, hint.as_deref()) {
                    color_rule(&["color"], input, theme)
                } else if input.modifier.is_none() {
                    Some(GeneratedRule::declaration("font-size", value.clone()))
                } else {
                    None
                }
            }
            _ => None,
        })
        .categories(&["fontSize", "colors"])
        .modifiers(true),
    );

    api.add_utility(
        UtilityDefinition::new("bg", |input, theme| match &input.value {
            UtilityValue::Theme { .. } => color_rule(&["background-color"], input, theme),
            UtilityValue::Arbitrary { value, hint } => {
                let hint = hint.as_deref();
                if is_color_value(value, hint) {
                    return color_rule(&["background-color"], input, theme);
                }
                if input.modifier.is_some() {
                    return None;
                }
                let property = match hint {
                    Some("length") | Some("size") => "background-size",
                    Some("position") => "background-position",
                    Some("url") | Some("image") => "background-image",
                    _ if value.starts_with("url(") || value.contains("gradient(") => {
                        "background-image"
                    }
                    _ => return None,
                };
                Some(GeneratedRule::declaration(property, value.clone()))
            }
            _ => None,
        })
        .categories(&["colors"])
        .modifiers(true),
    );

    for (prefix, property) in [("fill", "fill"), ("stroke", "stroke")] {
        api.add_utility(
            UtilityDefinition::new(prefix, move |input, theme| match &input.value {
                UtilityValue::Theme { .. } | UtilityValue::Arbitrary { .. } => {
                    color_rule(&[property], input, theme)
                }
                _ => None,
            })
            .categories(&["colors"])
            .modifiers(true),
        );
    }

    for (prefix, width_properties, color_properties) in BORDER_UTILITIES {
        api.add_utility(
            UtilityDefinition::new(*prefix, move |input, theme| match &input.value {
                UtilityValue::Theme {
                    category, value, ..
                } if category == "borderWidth" => {
                    if input.modifier.is_some() {
                        return None;
                    }
                    Some(each_property(width_properties, &value.to_css()))
                }
                UtilityValue::Theme { .. } => color_rule(color_properties, input, theme),
                UtilityValue::Arbitrary { value, hint } => {
                    if is_color_value(value, hint.as_deref()) {
                        color_rule(color_properties, input, theme)
                    } else if input.modifier.is_none() {
                        Some(each_property(width_properties, value))
                    } else {
                        None
                    }
                }
                _ => None,
            })
            .categories(&["borderWidth", "colors"])
            .modifiers(true),
        );
    }
}

fn register_layout_utilities(api: &mut PluginApi<'_>) {
    api.add_utility(
        UtilityDefinition::new("flex", |input, _| match &input.value {
            UtilityValue::Bare => Some(GeneratedRule::declaration("display", "flex")),
            UtilityValue::Theme { .. } | UtilityValue::Arbitrary { .. } => {
                Some(GeneratedRule::declaration("flex", input.css_value()?))
            }
            UtilityValue::Keyword(_) => None,
        })
        .categories(&["flex"]),
    );

    for (prefix, property) in [("grow", "flex-grow"), ("shrink", "flex-shrink")] {
        api.add_utility(UtilityDefinition::new(prefix, move |input, _| {
            let value = match &input.value {
                UtilityValue::Bare => "1".to_string(),
                UtilityValue::Keyword(key) if key == "0" => "0".to_string(),
                UtilityValue::Arbitrary { value, .. } => value.clone(),
                _ => return None,
            };
            Some(GeneratedRule::declaration(property, value))
        }));
    }

    api.add_utility(
        UtilityDefinition::new("font", |input, _| match &input.value {
            UtilityValue::Theme {
                category, value, ..
            } if category == "fontWeight" => {
                Some(GeneratedRule::declaration("font-weight", value.to_css()))
            }
            UtilityValue::Theme { value, .. } => {
                Some(GeneratedRule::declaration("font-family", value.to_css()))
            }
            UtilityValue::Arbitrary { value, hint } => {
                let is_weight = match hint.as_deref() {
                    Some("number") => true,
                    Some(_) => false,
                    None => value.parse::<u16>().is_ok(),
                };
                let property = if is_weight { "font-weight" } else { "font-family" };
                Some(GeneratedRule::declaration(property, value.clone()))
            }
            _ => None,
        })
        .categories(&["fontWeight", "fontFamily"]),
    );

    api.add_utility(
        UtilityDefinition::new("order", |input, _| {
            let value = match &input.value {
                UtilityValue::Keyword(key) => match key.as_str() {
                    "first" => "-9999".to_string(),
                    "last" => "9999".to_string(),
                    "none" => "0".to_string(),
                    _ => integer_keyword(key)?.to_string(),
                },
                UtilityValue::Arbitrary { value, .. } => value.clone(),
                _ => return None,
            };
            let value = if input.negative {
                negate(&value)
            } else {
                value
            };
            Some(GeneratedRule::declaration("order", value))
        })
        .negative(true),
    );

    api.add_utility(UtilityDefinition::new("col-span", |input, _| {
        let value = match &input.value {
            UtilityValue::Keyword(key) if key == "full" => "1 / -1".to_string(),
            UtilityValue::Keyword(key) => {
                let span = integer_keyword(key)?;
                format!("span {} / span {}", span, span)
            }
            UtilityValue::Arbitrary { value, .. } => value.clone(),
            _ => return None,
        };
        Some(GeneratedRule::declaration("grid-column", value))
    }));

    api.add_utility(UtilityDefinition::new("line-clamp", |input, _| {
        match &input.value {
            UtilityValue::Keyword(key) if key == "none" => Some(
                GeneratedRule::declaration("overflow", "visible")
                    .with("display", "block")
                    .with("-webkit-box-orient", "horizontal")
                    .with("-webkit-line-clamp", "none"),
            ),
            UtilityValue::Keyword(key) => {
                let lines = integer_keyword(key)?;
                Some(
                    GeneratedRule::declaration("overflow", "hidden")
                        .with("display", "-webkit-box")
                        .with("-webkit-box-orient", "vertical")
                        .with("-webkit-line-clamp", lines.to_string()),
                )
            }
            _ => None,
        }
    }));

    api.add_utility(UtilityDefinition::new("aspect", |input, _| {
        let value = match &input.value {
            UtilityValue::Keyword(key) => match key.as_str() {
                "auto" => "auto",
                "square" => "1 / 1",
                "video" => "16 / 9",
                _ => return None,
            }
            .to_string(),
            UtilityValue::Arbitrary { value, .. } => value.clone(),
            _ => return None,
        };
        Some(GeneratedRule::declaration("aspect-ratio", value))
    }));
}

fn register_transition_utilities(api: &mut PluginApi<'_>) {
    api.add_utility(UtilityDefinition::new("transition", |input, theme| {
        let properties = match &input.value {
            UtilityValue::Bare => TRANSITION_DEFAULT,
            UtilityValue::Keyword(key) => match key.as_str() {
                "none" => return Some(GeneratedRule::declaration("transition-property", "none")),
                "all" => "all",
                "colors" => TRANSITION_COLORS,
                "opacity" => "opacity",
                "shadow" => "box-shadow",
                "transform" => "transform",
                _ => return None,
            },
            UtilityValue::Arbitrary { value, .. } => value.as_str(),
            UtilityValue::Theme { .. } => return None,
        };
        let timing = theme
            .lookup("transitionTimingFunction", "DEFAULT")
            .map(ThemeValue::to_css)
            .unwrap_or_else(|| "ease".to_string());
        let duration = theme
            .lookup("transitionDuration", "DEFAULT")
            .map(ThemeValue::to_css)
            .unwrap_or_else(|| "150ms".to_string());
        Some(
            GeneratedRule::declaration("transition-property", properties)
                .with("transition-timing-function", timing)
                .with("transition-duration", duration),
        )
    }));
}

fn register_variants(api: &mut PluginApi<'_>, dark_mode: DarkMode) {
    for (name, template) in PSEUDO_CLASS_VARIANTS {
        api.add_variant(name, Variant::Selector(template.to_string()));
    }
    for (name, template) in PSEUDO_ELEMENT_VARIANTS {
        api.add_variant(name, Variant::PseudoElement(template.to_string()));
    }
    for (name, prelude) in AT_RULE_VARIANTS {
        api.add_variant(name, Variant::AtRule(prelude.to_string()));
    }
    for state in ARIA_STATES {
        api.add_variant(
            &format!("aria-{}", state),
            Variant::Selector(format!("&[aria-{}=\"true\"]", state)),
        );
    }

    let screens = api.theme().screens();
    for (name, width) in screens {
        api.add_variant(
            &name,
            Variant::AtRule(format!("@media (min-width: {})", width)),
        );
    }

    let dark = match dark_mode {
        DarkMode::Media => Variant::AtRule("@media (prefers-color-scheme: dark)".to_string()),
        DarkMode::Class => Variant::Selector(".dark &".to_string()),
    };
    api.add_variant("dark", dark);
}

fn property_generator(
    properties: &'static [&'static str],
    keywords: &'static [&'static str],
) -> impl Fn(&UtilityInput, &Theme) -> Option<GeneratedRule> + Send + Sync + 'static {
    move |input, _| {
        match &input.value {
            UtilityValue::Theme { .. } | UtilityValue::Arbitrary { .. } => {}
            UtilityValue::Keyword(key) if keywords.contains(&key.as_str()) => {}
            _ => return None,
        }
        Some(each_property(properties, &input.css_value()?))
    }
}

fn each_property(properties: &[&str], value: &str) -> GeneratedRule {
    GeneratedRule::new(
        properties
            .iter()
            .map(|property| Declaration::new(*property, value))
            .collect(),
    )
}

fn color_rule(properties: &[&str], input: &UtilityInput, theme: &Theme) -> Option<GeneratedRule> {
    let color = input.css_value()?;
    let color = match &input.modifier {
        Some(modifier) => color_with_alpha(&color, modifier.alpha(theme)?),
        None => color,
    };
    Some(each_property(properties, &color))
}

fn font_size(value: &ThemeValue) -> Option<GeneratedRule> {
    let rule = GeneratedRule::declaration("font-size", value.primary());
    Some(match value.get(1) {
        Some(line_height) => rule.with("line-height", line_height),
        None => rule,
    })
}

fn is_color_value(value: &str, hint: Option<&str>) -> bool {
    match hint {
        Some(hint) => hint == "color",
        None => is_color_like_value(value),
    }
}

fn integer_keyword(key: &str) -> Option<u32> {
    key.parse::<u32>().ok().filter(|value| *value > 0)
}

fn parse_declarations(raw: &str) -> Vec<Declaration> {
    raw.split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            Some(Declaration::new(property.trim(), value.trim()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::build_registry;
    use crate::registry::{Modifier, UtilityRegistry};
    use crate::theme::default_theme;

    fn registry(theme: &Theme) -> UtilityRegistry {
        build_registry(theme, &CoreUtilities::default(), &[]).expect("core registry")
    }

    fn theme_input(prefix: &str, theme: &Theme, category: &str, key: &str) -> UtilityInput {
        UtilityInput::new(
            prefix,
            UtilityValue::Theme {
                category: category.to_string(),
                key: key.to_string(),
                value: theme.lookup(category, key).expect("theme key").clone(),
            },
        )
    }

    fn declarations(rule: &GeneratedRule) -> Vec<(&str, &str)> {
        rule.declarations
            .iter()
            .map(|d| (d.property.as_str(), d.value.as_str()))
            .collect()
    }

    #[test]
    fn static_table_parses_multi_declaration_entries() {
        let parsed = parse_declarations("overflow:hidden;text-overflow:ellipsis;white-space:nowrap");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1], Declaration::new("text-overflow", "ellipsis"));

        let parsed = parse_declarations("clip:rect(0, 0, 0, 0)");
        assert_eq!(parsed, vec![Declaration::new("clip", "rect(0, 0, 0, 0)")]);
    }

    #[test]
    fn text_prefix_dispatches_on_category() {
        let theme = default_theme();
        let registry = registry(&theme);
        let text = registry.resolve("text").expect("text registered");

        let color = text
            .generate(&theme_input("text", &theme, "colors", "red-500"), &theme)
            .expect("color rule");
        assert_eq!(declarations(&color), vec![("color", "#ef4444")]);

        let size = text
            .generate(&theme_input("text", &theme, "fontSize", "sm"), &theme)
            .expect("size rule");
        assert_eq!(
            declarations(&size),
            vec![("font-size", "0.875rem"), ("line-height", "1.25rem")]
        );
    }

    #[test]
    fn color_modifier_applies_alpha() {
        let theme = default_theme();
        let registry = registry(&theme);
        let mut input = theme_input("bg", &theme, "colors", "blue-500");
        input.modifier = Some(Modifier::Named("50".to_string()));

        let rule = registry
            .resolve("bg")
            .and_then(|bg| bg.generate(&input, &theme))
            .expect("bg rule");
        assert_eq!(
            declarations(&rule),
            vec![("background-color", "rgb(59 130 246 / 0.5)")]
        );

        input.modifier = Some(Modifier::Named("33".to_string()));
        assert!(registry.resolve("bg").and_then(|bg| bg.generate(&input, &theme)).is_none());
    }

    #[test]
    fn arbitrary_values_use_type_hints() {
        let theme = default_theme();
        let registry = registry(&theme);
        let text = registry.resolve("text").expect("text");

        let hinted = UtilityInput::new(
            "text",
            UtilityValue::Arbitrary {
                value: "var(--accent)".to_string(),
                hint: Some("color".to_string()),
            },
        );
        let rule = text.generate(&hinted, &theme).expect("hinted color");
        assert_eq!(declarations(&rule), vec![("color", "var(--accent)")]);

        let size = UtilityInput::new(
            "text",
            UtilityValue::Arbitrary {
                value: "22px".to_string(),
                hint: None,
            },
        );
        let rule = text.generate(&size, &theme).expect("font size");
        assert_eq!(declarations(&rule), vec![("font-size", "22px")]);
    }

    #[test]
    fn flex_is_both_display_and_flex_shorthand() {
        let theme = default_theme();
        let registry = registry(&theme);
        let flex = registry.resolve("flex").expect("flex");

        let bare = flex
            .generate(&UtilityInput::new("flex", UtilityValue::Bare), &theme)
            .expect("bare flex");
        assert_eq!(declarations(&bare), vec![("display", "flex")]);

        let one = flex
            .generate(&theme_input("flex", &theme, "flex", "1"), &theme)
            .expect("flex-1");
        assert_eq!(declarations(&one), vec![("flex", "1 1 0%")]);
    }

    #[test]
    fn margins_accept_auto_but_padding_does_not() {
        let theme = default_theme();
        let registry = registry(&theme);
        let auto = UtilityInput::new("mx", UtilityValue::Keyword("auto".to_string()));
        let rule = registry
            .resolve("mx")
            .and_then(|mx| mx.generate(&auto, &theme))
            .expect("mx-auto");
        assert_eq!(
            declarations(&rule),
            vec![("margin-left", "auto"), ("margin-right", "auto")]
        );

        let auto = UtilityInput::new("p", UtilityValue::Keyword("auto".to_string()));
        assert!(registry.resolve("p").and_then(|p| p.generate(&auto, &theme)).is_none());
    }

    #[test]
    fn space_utilities_carry_a_child_selector() {
        let theme = default_theme();
        let registry = registry(&theme);
        let rule = registry
            .resolve("space-x")
            .and_then(|space| space.generate(&theme_input("space-x", &theme, "spacing", "4"), &theme))
            .expect("space-x-4");
        assert_eq!(
            rule.selector.as_deref(),
            Some("& > :not([hidden]) ~ :not([hidden])")
        );
        assert_eq!(declarations(&rule), vec![("margin-left", "1rem")]);
    }

    #[test]
    fn screens_and_dark_mode_become_variants() {
        let theme = default_theme();
        let registry = registry(&theme);
        assert_eq!(
            registry.variant("md"),
            Some(&Variant::AtRule("@media (min-width: 768px)".to_string()))
        );
        assert_eq!(
            registry.variant("dark"),
            Some(&Variant::AtRule(
                "@media (prefers-color-scheme: dark)".to_string()
            ))
        );

        let class_registry =
            build_registry(&theme, &CoreUtilities::new(DarkMode::Class), &[]).expect("registry");
        assert_eq!(
            class_registry.variant("dark"),
            Some(&Variant::Selector(".dark &".to_string()))
        );
    }

    #[test]
    fn core_registration_has_no_overrides() {
        let theme = default_theme();
        assert!(registry(&theme).events().is_empty());
    }
}
