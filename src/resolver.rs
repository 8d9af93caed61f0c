use crate::css::{apply_selector_template, escape_selector, normalize_arbitrary_value};
use crate::registry::{
    Declaration, GeneratedRule, Layer, Modifier, Rule, UtilityDefinition, UtilityInput,
    UtilityRegistry, UtilityValue, Variant,
};
use crate::theme::Theme;
use tracing::trace;

const ARBITRARY_HINTS: &[&str] = &[
    "color",
    "length",
    "percentage",
    "number",
    "integer",
    "url",
    "image",
    "position",
    "size",
    "family-name",
    "absolute-size",
    "line-width",
    "shadow",
    "any",
];

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    theme: &'a Theme,
    registry: &'a UtilityRegistry,
    separator: char,
}

impl<'a> Resolver<'a> {
    pub fn new(theme: &'a Theme, registry: &'a UtilityRegistry, separator: char) -> Self {
        Self {
            theme,
            registry,
            separator,
        }
    }

    pub fn resolve(&self, token: &str, ordinal: usize) -> Option<Rule> {
        let rule = self.resolve_inner(token, ordinal);
        if rule.is_none() {
            trace!(token, "token did not resolve");
        }
        rule
    }

    fn resolve_inner(&self, token: &str, ordinal: usize) -> Option<Rule> {
        if !is_well_formed(token) {
            return None;
        }
        let mut segments = split_top_level(token, self.separator);
        let base = segments.pop()?;
        if base.is_empty() || segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }

        let (base, important) = strip_important(base);
        let (base, negative) = match base.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (base, false),
        };
        if base.is_empty() {
            return None;
        }

        let (generated, layer) = if is_bracketed(base) {
            if negative {
                return None;
            }
            (arbitrary_property(&base[1..base.len() - 1])?, Layer::Utilities)
        } else {
            self.resolve_utility(base, negative)?
        };
        if generated.declarations.is_empty() {
            return None;
        }

        let variants = segments
            .iter()
            .map(|name| self.variant(name))
            .collect::<Option<Vec<_>>>()?;

        let mut selector = format!(".{}", escape_selector(token));
        let mut at_rules = Vec::new();
        let mut needs_content = false;
        for variant in variants {
            match variant {
                Variant::Selector(template) => {
                    selector = apply_selector_template(&template, &selector);
                }
                Variant::PseudoElement(template) => {
                    selector = apply_selector_template(&template, &selector);
                    needs_content = true;
                }
                Variant::AtRule(prelude) => at_rules.push(prelude),
            }
        }
        if let Some(template) = &generated.selector {
            selector = apply_selector_template(template, &selector);
        }
        // Later variants wrap earlier ones.
        at_rules.reverse();

        let mut declarations = generated.declarations;
        if needs_content
            && !declarations
                .iter()
                .any(|declaration| declaration.property == "content")
        {
            declarations.push(Declaration::new("content", "var(--tw-content)"));
        }
        if important {
            for declaration in &mut declarations {
                declaration.important = true;
            }
        }

        Some(Rule {
            selector,
            declarations,
            at_rules,
            layer,
            ordinal,
        })
    }

    fn resolve_utility(&self, base: &str, negative: bool) -> Option<(GeneratedRule, Layer)> {
        for (prefix, value) in prefix_candidates(base) {
            let Some(definition) = self.registry.resolve(prefix) else {
                continue;
            };
            if negative && !definition.negative {
                continue;
            }
            let Some(input) = self.utility_input(definition, value, negative) else {
                continue;
            };
            if let Some(generated) = definition.generate(&input, self.theme) {
                return Some((generated, definition.layer));
            }
        }
        None
    }

    fn utility_input(
        &self,
        definition: &UtilityDefinition,
        raw: &str,
        negative: bool,
    ) -> Option<UtilityInput> {
        let mut input = UtilityInput::new(definition.prefix.clone(), UtilityValue::Bare);
        input.negative = negative;

        if definition.is_static() {
            return raw.is_empty().then_some(input);
        }
        if raw.is_empty() {
            if let Some(value) = self.theme_value(definition, "DEFAULT") {
                input.value = value;
            }
            return Some(input);
        }

        if let Some(value) = self.parse_value(definition, raw) {
            input.value = value;
            return Some(input);
        }
        if !definition.modifiers {
            return None;
        }

        let (key, modifier) = split_modifier(raw)?;
        input.value = self.parse_value(definition, key)?;
        input.modifier = Some(match modifier.strip_prefix('[') {
            Some(inner) => Modifier::Arbitrary(normalize_arbitrary_value(
                inner.strip_suffix(']')?,
            )),
            None => Modifier::Named(modifier.to_string()),
        });
        Some(input)
    }

    fn parse_value(&self, definition: &UtilityDefinition, raw: &str) -> Option<UtilityValue> {
        if is_bracketed(raw) {
            return arbitrary_value(&raw[1..raw.len() - 1]);
        }
        if raw.contains(['[', ']']) {
            return None;
        }
        if let Some(value) = self.theme_value(definition, raw) {
            return Some(value);
        }
        if raw.contains('/') && definition.modifiers {
            return None;
        }
        Some(UtilityValue::Keyword(raw.to_string()))
    }

    fn theme_value(&self, definition: &UtilityDefinition, key: &str) -> Option<UtilityValue> {
        definition.categories.iter().find_map(|category| {
            let value = self.theme.lookup(category, key)?;
            Some(UtilityValue::Theme {
                category: category.clone(),
                key: key.to_string(),
                value: value.clone(),
            })
        })
    }

    /// Looks up a registered variant, falling back to the derived forms
    /// (`group-*`, `peer-*`, `data-[…]`, arbitrary selectors and breakpoints).
    fn variant(&self, name: &str) -> Option<Variant> {
        if let Some(variant) = self.registry.variant(name) {
            return Some(variant.clone());
        }

        if is_bracketed(name) {
            let inner = normalize_arbitrary_value(&name[1..name.len() - 1]);
            if inner.starts_with('@') {
                return Some(Variant::AtRule(inner));
            }
            return inner.contains('&').then_some(Variant::Selector(inner));
        }

        if let Some(rest) = name.strip_prefix("group-") {
            let pseudo = self.relative_selector(rest)?;
            return Some(Variant::Selector(format!(".group{} &", pseudo)));
        }
        if let Some(rest) = name.strip_prefix("peer-") {
            let pseudo = self.relative_selector(rest)?;
            return Some(Variant::Selector(format!(".peer{} ~ &", pseudo)));
        }

        if let Some(inner) = bracket_suffix(name, "data-") {
            return Some(Variant::Selector(format!(
                "&[data-{}]",
                normalize_arbitrary_value(inner)
            )));
        }
        if let Some(inner) = bracket_suffix(name, "aria-") {
            return Some(Variant::Selector(format!(
                "&[aria-{}]",
                normalize_arbitrary_value(inner)
            )));
        }
        if let Some(inner) = bracket_suffix(name, "supports-") {
            let condition = normalize_arbitrary_value(inner);
            let condition = if condition.contains(':') {
                condition
            } else {
                format!("{}: var(--tw)", condition)
            };
            return Some(Variant::AtRule(format!("@supports ({})", condition)));
        }
        if let Some(inner) = bracket_suffix(name, "min-") {
            return Some(Variant::AtRule(format!(
                "@media (min-width: {})",
                normalize_arbitrary_value(inner)
            )));
        }
        if let Some(inner) = bracket_suffix(name, "max-") {
            return Some(Variant::AtRule(format!(
                "@media not all and (min-width: {})",
                normalize_arbitrary_value(inner)
            )));
        }
        if let Some(screen) = name.strip_prefix("max-") {
            let width = self.theme.lookup("screens", screen)?;
            return Some(Variant::AtRule(format!(
                "@media not all and (min-width: {})",
                width.primary()
            )));
        }
        None
    }

    fn relative_selector(&self, name: &str) -> Option<String> {
        if name.starts_with("group-") || name.starts_with("peer-") {
            return None;
        }
        let Variant::Selector(template) = self.variant(name)? else {
            return None;
        };
        let rest = template.strip_prefix('&')?;
        (!rest.contains('&') && !rest.contains(',') && !rest.contains("::"))
            .then(|| rest.to_string())
    }
}

fn arbitrary_property(inner: &str) -> Option<GeneratedRule> {
    let (property, value) = inner.split_once(':')?;
    let valid_property = !property.is_empty()
        && property
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && property.starts_with(|c: char| c.is_ascii_lowercase() || c == '-');
    if !valid_property {
        return None;
    }
    let value = normalize_arbitrary_value(value);
    if value.trim().is_empty() {
        return None;
    }
    Some(GeneratedRule::declaration(property, value))
}

fn arbitrary_value(inner: &str) -> Option<UtilityValue> {
    let (hint, value) = match inner.split_once(':') {
        Some((hint, value)) if ARBITRARY_HINTS.contains(&hint) => {
            (Some(hint.to_string()), value)
        }
        _ => (None, inner),
    };
    let value = normalize_arbitrary_value(value);
    if value.trim().is_empty() {
        return None;
    }
    Some(UtilityValue::Arbitrary { value, hint })
}

fn prefix_candidates(base: &str) -> Vec<(&str, &str)> {
    let mut candidates = vec![(base, "")];
    let mut depth = 0usize;
    let mut dashes = Vec::new();
    for (idx, byte) in base.bytes().enumerate() {
        match byte {
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth = depth.saturating_sub(1),
            b'-' if depth == 0 && idx > 0 => dashes.push(idx),
            _ => {}
        }
    }
    for idx in dashes.into_iter().rev() {
        candidates.push((&base[..idx], &base[idx + 1..]));
    }
    candidates
}

fn split_modifier(raw: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut split = None;
    for (idx, byte) in raw.bytes().enumerate() {
        match byte {
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth = depth.saturating_sub(1),
            b'/' if depth == 0 => split = Some(idx),
            _ => {}
        }
    }
    let idx = split?;
    let (key, modifier) = (&raw[..idx], &raw[idx + 1..]);
    (!key.is_empty() && !modifier.is_empty()).then_some((key, modifier))
}

fn strip_important(base: &str) -> (&str, bool) {
    if let Some(rest) = base.strip_prefix('!') {
        return (rest, true);
    }
    if let Some(rest) = base.strip_suffix('!') {
        return (rest, true);
    }
    (base, false)
}

fn is_bracketed(raw: &str) -> bool {
    raw.len() >= 2 && raw.starts_with('[') && raw.ends_with(']')
}

fn bracket_suffix<'n>(name: &'n str, prefix: &str) -> Option<&'n str> {
    let rest = name.strip_prefix(prefix)?;
    is_bracketed(rest).then(|| &rest[1..rest.len() - 1])
}

fn is_well_formed(token: &str) -> bool {
    let mut brackets = 0usize;
    let mut parens = 0usize;
    let mut bytes = token.bytes();
    while let Some(byte) = bytes.next() {
        match byte {
            b'\\' if brackets > 0 => {
                bytes.next();
            }
            b'\\' => return false,
            b'[' => brackets += 1,
            b']' => {
                if brackets == 0 {
                    return false;
                }
                brackets -= 1;
            }
            b'(' => parens += 1,
            b')' => {
                if parens == 0 {
                    return false;
                }
                parens -= 1;
            }
            _ => {}
        }
    }
    brackets == 0 && parens == 0
}

fn split_top_level(token: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut escaped = false;
    for (idx, ch) in token.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if ch == separator && depth == 0 => {
                parts.push(&token[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&token[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::CoreUtilities;
    use crate::config::DarkMode;
    use crate::plugin::build_registry;
    use crate::theme::default_theme;

    struct Fixture {
        theme: Theme,
        registry: UtilityRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_dark_mode(DarkMode::Media)
        }

        fn with_dark_mode(dark_mode: DarkMode) -> Self {
            let theme = default_theme();
            let registry = build_registry(&theme, &CoreUtilities::new(dark_mode), &[])
                .expect("core registry");
            Self { theme, registry }
        }

        fn resolve(&self, token: &str) -> Option<Rule> {
            Resolver::new(&self.theme, &self.registry, ':').resolve(token, 0)
        }

        fn css(&self, token: &str) -> Option<(String, Vec<String>, Vec<String>)> {
            let rule = self.resolve(token)?;
            let declarations = rule
                .declarations
                .iter()
                .map(|d| {
                    format!(
                        "{}:{}{}",
                        d.property,
                        d.value,
                        if d.important { "!important" } else { "" }
                    )
                })
                .collect();
            Some((rule.selector, declarations, rule.at_rules))
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn resolves_theme_color() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("text-red-500"),
            Some((".text-red-500".to_string(), strings(&["color:#ef4444"]), vec![]))
        );
    }

    #[test]
    fn hover_variant_wraps_selector() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("hover:font-bold"),
            Some((
                ".hover\\:font-bold:hover".to_string(),
                strings(&["font-weight:700"]),
                vec![]
            ))
        );
    }

    #[test]
    fn arbitrary_value_bypasses_theme() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("p-[13px]"),
            Some((".p-\\[13px\\]".to_string(), strings(&["padding:13px"]), vec![]))
        );
        assert_eq!(
            fx.css("grid-cols-[1fr_2fr]").map(|(_, d, _)| d),
            Some(strings(&["grid-template-columns:1fr 2fr"]))
        );
    }

    #[test]
    fn responsive_variant_becomes_media_query() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("md:flex"),
            Some((
                ".md\\:flex".to_string(),
                strings(&["display:flex"]),
                strings(&["@media (min-width: 768px)"])
            ))
        );
    }

    #[test]
    fn variant_order_does_not_change_structure() {
        let fx = Fixture::new();
        let a = fx.resolve("md:hover:p-4").expect("md:hover");
        let b = fx.resolve("hover:md:p-4").expect("hover:md");
        assert_eq!(a.at_rules, b.at_rules);
        assert_eq!(a.declarations, b.declarations);
        assert!(a.selector.ends_with(":hover"));
        assert!(b.selector.ends_with(":hover"));
    }

    #[test]
    fn opacity_modifier_on_colors() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("bg-blue-500/50").map(|(s, d, _)| (s, d)),
            Some((
                ".bg-blue-500\\/50".to_string(),
                strings(&["background-color:rgb(59 130 246 / 0.5)"])
            ))
        );
        assert_eq!(
            fx.css("text-red-500/[0.3]").map(|(_, d, _)| d),
            Some(strings(&["color:rgb(239 68 68 / 0.3)"]))
        );
        assert!(fx.resolve("bg-blue-500/33").is_none());
    }

    #[test]
    fn fractions_resolve_before_modifiers() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("w-1/2").map(|(_, d, _)| d),
            Some(strings(&["width:50%"]))
        );
    }

    #[test]
    fn static_utilities_win_over_shorter_prefixes() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("text-center").map(|(_, d, _)| d),
            Some(strings(&["text-align:center"]))
        );
        assert_eq!(
            fx.css("flex-row").map(|(_, d, _)| d),
            Some(strings(&["flex-direction:row"]))
        );
        assert_eq!(
            fx.css("flex-1").map(|(_, d, _)| d),
            Some(strings(&["flex:1 1 0%"]))
        );
    }

    #[test]
    fn bare_prefix_uses_default_key() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("rounded").map(|(_, d, _)| d),
            Some(strings(&["border-radius:0.25rem"]))
        );
        assert_eq!(
            fx.css("border").map(|(_, d, _)| d),
            Some(strings(&["border-width:1px"]))
        );
    }

    #[test]
    fn negative_values() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("-mt-4").map(|(s, d, _)| (s, d)),
            Some((".-mt-4".to_string(), strings(&["margin-top:-1rem"])))
        );
        assert_eq!(
            fx.css("-inset-x-[var(--gap)]").map(|(_, d, _)| d),
            Some(strings(&["left:calc(var(--gap) * -1)", "right:calc(var(--gap) * -1)"]))
        );
        assert!(fx.resolve("-p-4").is_none());
    }

    #[test]
    fn important_marker_in_either_position() {
        let fx = Fixture::new();
        for token in ["!p-4", "p-4!"] {
            let rule = fx.resolve(token).expect(token);
            assert!(rule.declarations.iter().all(|d| d.important), "{token}");
        }
        let rule = fx.resolve("md:!p-4").expect("md:!p-4");
        assert_eq!(rule.selector, ".md\\:\\!p-4");
    }

    #[test]
    fn arbitrary_property() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("[mask-type:luminance]").map(|(_, d, _)| d),
            Some(strings(&["mask-type:luminance"]))
        );
        assert_eq!(
            fx.css("hover:[--brand:theme_red]").map(|(s, d, _)| (s, d)),
            Some((
                ".hover\\:\\[--brand\\:theme_red\\]:hover".to_string(),
                strings(&["--brand:theme red"])
            ))
        );
        assert!(fx.resolve("[Color:red]").is_none());
    }

    #[test]
    fn type_hint_routes_ambiguous_values() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("text-[color:var(--ink)]").map(|(_, d, _)| d),
            Some(strings(&["color:var(--ink)"]))
        );
        assert_eq!(
            fx.css("text-[length:var(--size)]").map(|(_, d, _)| d),
            Some(strings(&["font-size:var(--size)"]))
        );
    }

    #[test]
    fn pseudo_elements_get_content() {
        let fx = Fixture::new();
        let (selector, declarations, _) = fx.css("before:block").expect("before:block");
        assert_eq!(selector, ".before\\:block::before");
        assert_eq!(
            declarations,
            strings(&["display:block", "content:var(--tw-content)"])
        );
        let (_, declarations, _) = fx.css("placeholder:italic").expect("placeholder");
        assert_eq!(declarations, strings(&["font-style:italic"]));
    }

    #[test]
    fn group_and_peer_variants() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("group-hover:underline").map(|(s, _, _)| s),
            Some(".group:hover .group-hover\\:underline".to_string())
        );
        assert_eq!(
            fx.css("peer-checked:hidden").map(|(s, _, _)| s),
            Some(".peer:checked ~ .peer-checked\\:hidden".to_string())
        );
        assert_eq!(
            fx.css("group-aria-expanded:block").map(|(s, _, _)| s),
            Some(".group[aria-expanded=\"true\"] .group-aria-expanded\\:block".to_string())
        );
        assert!(fx.resolve("group-before:block").is_none());
    }

    #[test]
    fn attribute_and_arbitrary_variants() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("data-[state=open]:block").map(|(s, _, _)| s),
            Some(".data-\\[state\\=open\\]\\:block[data-state=open]".to_string())
        );
        assert_eq!(
            fx.css("[&>*]:p-4").map(|(s, _, _)| s),
            Some(".\\[\\&\\>\\*\\]\\:p-4>*".to_string())
        );
        assert_eq!(
            fx.css("[@media_print]:hidden").map(|(_, _, a)| a),
            Some(strings(&["@media print"]))
        );
        assert!(fx.resolve("[.foo]:p-4").is_none());
    }

    #[test]
    fn breakpoint_variants() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("max-md:hidden").map(|(_, _, a)| a),
            Some(strings(&["@media not all and (min-width: 768px)"]))
        );
        assert_eq!(
            fx.css("min-[900px]:flex").map(|(_, _, a)| a),
            Some(strings(&["@media (min-width: 900px)"]))
        );
        assert_eq!(
            fx.css("md:dark:flex").map(|(_, _, a)| a),
            Some(strings(&[
                "@media (prefers-color-scheme: dark)",
                "@media (min-width: 768px)"
            ]))
        );
    }

    #[test]
    fn class_dark_mode_is_a_selector() {
        let fx = Fixture::with_dark_mode(DarkMode::Class);
        assert_eq!(
            fx.css("dark:text-white").map(|(s, _, a)| (s, a)),
            Some((".dark .dark\\:text-white".to_string(), vec![]))
        );
    }

    #[test]
    fn utility_selector_template_applies_last() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("hover:space-x-4").map(|(s, _, _)| s),
            Some(".hover\\:space-x-4:hover > :not([hidden]) ~ :not([hidden])".to_string())
        );
    }

    #[test]
    fn unknown_and_malformed_tokens_are_absent() {
        let fx = Fixture::new();
        for token in [
            "nope",
            "text-nope-500",
            "foo:p-4",
            "p-[13px",
            "p-13px]",
            "md\\:flex",
            "hover:",
            ":p-4",
            "hover::p-4",
            "p-",
            "-",
            "!",
            "p-[]",
            "text-sm/50",
        ] {
            assert!(fx.resolve(token).is_none(), "{token} should not resolve");
        }
    }

    #[test]
    fn custom_separator() {
        let fx = Fixture::new();
        let resolver = Resolver::new(&fx.theme, &fx.registry, '|');
        let rule = resolver.resolve("hover|p-4", 3).expect("custom separator");
        assert_eq!(rule.selector, ".hover\\|p-4:hover");
        assert_eq!(rule.ordinal, 3);
        assert!(resolver.resolve("hover:p-4", 0).is_none());
    }

    #[test]
    fn escapes_leading_digit_in_selector() {
        let fx = Fixture::new();
        assert_eq!(
            fx.css("2xl:flex").map(|(s, _, _)| s),
            Some(".\\32 xl\\:flex".to_string())
        );
    }

    #[test]
    fn prefix_candidates_skip_bracket_dashes() {
        assert_eq!(
            prefix_candidates("bg-[var(--x-y)]"),
            vec![("bg-[var(--x-y)]", ""), ("bg", "[var(--x-y)]")]
        );
        assert_eq!(
            prefix_candidates("border-t-2"),
            vec![("border-t-2", ""), ("border-t", "2"), ("border", "t-2")]
        );
    }

    #[test]
    fn split_top_level_ignores_nested_separators() {
        assert_eq!(
            split_top_level("[&:hover]:bg-[color:red]", ':'),
            vec!["[&:hover]", "bg-[color:red]"]
        );
    }
}
