pub fn escape_selector(class: &str) -> String {
    let mut escaped = String::with_capacity(class.len() * 2);

    for (idx, ch) in class.chars().enumerate() {
        if idx == 0 && ch.is_ascii_digit() {
            escaped.push_str(&format!("\\3{} ", ch));
            continue;
        }
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '/' => escaped.push_str("\\/"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            '(' => escaped.push_str("\\("),
            ')' => escaped.push_str("\\)"),
            '&' => escaped.push_str("\\&"),
            '>' => escaped.push_str("\\>"),
            '<' => escaped.push_str("\\<"),
            '~' => escaped.push_str("\\~"),
            '+' => escaped.push_str("\\+"),
            ',' => escaped.push_str("\\,"),
            '%' => escaped.push_str("\\%"),
            '=' => escaped.push_str("\\="),
            '!' => escaped.push_str("\\!"),
            '*' => escaped.push_str("\\*"),
            '@' => escaped.push_str("\\@"),
            '#' => escaped.push_str("\\#"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '.' => escaped.push_str("\\."),
            ';' => escaped.push_str("\\;"),
            '$' => escaped.push_str("\\$"),
            '?' => escaped.push_str("\\?"),
            '^' => escaped.push_str("\\^"),
            '|' => escaped.push_str("\\|"),
            ' ' => escaped.push_str("\\ "),
            _ => escaped.push(ch),
        }
    }

    escaped
}

/// Turns the body of an arbitrary `[...]` value into CSS text.
///
/// Underscores become spaces unless escaped (`\_`), except inside `url(...)`
/// where they are kept verbatim. Operators inside `calc()` get the spacing
/// CSS requires.
pub fn normalize_arbitrary_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    let mut url_depth: Option<usize> = None;
    let mut paren_depth = 0usize;

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                if let Some((_, next)) = chars.next() {
                    out.push(next);
                }
            }
            '(' => {
                if url_depth.is_none() && raw[..idx].ends_with("url") {
                    url_depth = Some(paren_depth);
                }
                paren_depth += 1;
                out.push(ch);
            }
            ')' => {
                paren_depth = paren_depth.saturating_sub(1);
                if url_depth == Some(paren_depth) {
                    url_depth = None;
                }
                out.push(ch);
            }
            '_' if url_depth.is_none() => out.push(' '),
            _ => out.push(ch),
        }
    }

    if out.contains("calc(") {
        return normalize_calc_expression_spacing(&out);
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CalcRun {
    None,
    Number { unit_len: usize },
    Ident,
}

fn normalize_calc_expression_spacing(value: &str) -> String {
    let chars = value.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(value.len() + 8);
    let mut prev_non_ws: Option<char> = None;
    let mut run = CalcRun::None;

    for (idx, ch) in chars.iter().copied().enumerate() {
        let next = chars.get(idx + 1).copied();
        match run {
            CalcRun::Ident if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' => {
                out.push(ch);
                prev_non_ws = Some(ch);
                continue;
            }
            CalcRun::Number { unit_len } if ch.is_ascii_alphabetic() || ch == '%' => {
                run = CalcRun::Number {
                    unit_len: unit_len + 1,
                };
                out.push(ch);
                prev_non_ws = Some(ch);
                continue;
            }
            CalcRun::Number { unit_len: 0 } if ch.is_ascii_digit() || ch == '.' => {
                out.push(ch);
                prev_non_ws = Some(ch);
                continue;
            }
            // Exponent sign, as in `1e-3`.
            CalcRun::Number { unit_len: 1 }
                if matches!(ch, '-' | '+')
                    && out.ends_with(['e', 'E'])
                    && next.is_some_and(|c| c.is_ascii_digit()) =>
            {
                out.push(ch);
                prev_non_ws = Some(ch);
                continue;
            }
            _ => run = CalcRun::None,
        }

        let binary_position =
            prev_non_ws.is_some_and(|c| c.is_ascii_alphanumeric() || c == ')' || c == '%');
        if ch.is_ascii_digit() || (ch == '.' && next.is_some_and(|c| c.is_ascii_digit())) {
            run = CalcRun::Number { unit_len: 0 };
            out.push(ch);
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            run = CalcRun::Ident;
            out.push(ch);
        } else if ch == '-'
            && !binary_position
            && next.is_some_and(|c| c == '-' || c.is_ascii_alphabetic())
        {
            // `--custom-prop` or `-webkit-*`.
            run = CalcRun::Ident;
            out.push(ch);
        } else if matches!(ch, '+' | '-' | '*' | '/') && binary_position {
            while out.ends_with(' ') {
                out.pop();
            }
            out.push(' ');
            out.push(ch);
            out.push(' ');
        } else {
            out.push(ch);
        }
        if !ch.is_whitespace() {
            prev_non_ws = Some(ch);
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_color_like_value(raw: &str) -> bool {
    let value = raw.trim();
    if value.starts_with('#') {
        return value.len() > 1 && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    }
    let lower = value.to_ascii_lowercase();
    [
        "rgb(", "rgba(", "hsl(", "hsla(", "hwb(", "lab(", "lch(", "oklab(", "oklch(",
        "color(", "color-mix(",
    ]
    .iter()
    .any(|prefix| lower.starts_with(prefix))
        || matches!(
            lower.as_str(),
            "transparent" | "currentcolor" | "inherit" | "black" | "white"
        )
}

pub fn color_with_alpha(color: &str, alpha: f64) -> String {
    if let Some((r, g, b)) = parse_hex_color(color) {
        return format!("rgb({} {} {} / {})", r, g, b, format_number(alpha));
    }
    format!(
        "color-mix(in srgb, {} {}%, transparent)",
        color,
        format_number(alpha * 100.0)
    )
}

fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().strip_prefix('#')?;
    let channel = |raw: &str| u8::from_str_radix(raw, 16).ok();
    match hex.len() {
        3 => {
            let mut digits = hex.chars().map(|c| c.to_string().repeat(2));
            Some((
                channel(&digits.next()?)?,
                channel(&digits.next()?)?,
                channel(&digits.next()?)?,
            ))
        }
        6 => Some((
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

pub(crate) fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    let text = format!("{}", rounded);
    if text == "-0" { "0".to_string() } else { text }
}

pub(crate) fn indent_css_block(css: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);
    css.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", padding, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn split_selector_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut escaped = false;

    for (idx, ch) in selector.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(selector[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(selector[start..].trim());
    parts
}

pub(crate) fn apply_selector_template(template: &str, selector: &str) -> String {
    let mut out = Vec::new();
    for part in split_selector_list(selector) {
        for template_part in split_selector_list(template) {
            out.push(template_part.replace('&', part));
        }
    }
    out.join(", ")
}
