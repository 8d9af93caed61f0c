use super::{Theme, ThemeValue};

const SHADES: [&str; 11] = [
    "50", "100", "200", "300", "400", "500", "600", "700", "800", "900", "950",
];

const PALETTE: [(&str, [&str; 11]); 11] = [
    (
        "slate",
        [
            "#f8fafc", "#f1f5f9", "#e2e8f0", "#cbd5e1", "#94a3b8", "#64748b", "#475569",
            "#334155", "#1e293b", "#0f172a", "#020617",
        ],
    ),
    (
        "gray",
        [
            "#f9fafb", "#f3f4f6", "#e5e7eb", "#d1d5db", "#9ca3af", "#6b7280", "#4b5563",
            "#374151", "#1f2937", "#111827", "#030712",
        ],
    ),
    (
        "red",
        [
            "#fef2f2", "#fee2e2", "#fecaca", "#fca5a5", "#f87171", "#ef4444", "#dc2626",
            "#b91c1c", "#991b1b", "#7f1d1d", "#450a0a",
        ],
    ),
    (
        "orange",
        [
            "#fff7ed", "#ffedd5", "#fed7aa", "#fdba74", "#fb923c", "#f97316", "#ea580c",
            "#c2410c", "#9a3412", "#7c2d12", "#431407",
        ],
    ),
    (
        "yellow",
        [
            "#fefce8", "#fef9c3", "#fef08a", "#fde047", "#facc15", "#eab308", "#ca8a04",
            "#a16207", "#854d0e", "#713f12", "#422006",
        ],
    ),
    (
        "green",
        [
            "#f0fdf4", "#dcfce7", "#bbf7d0", "#86efac", "#4ade80", "#22c55e", "#16a34a",
            "#15803d", "#166534", "#14532d", "#052e16",
        ],
    ),
    (
        "teal",
        [
            "#f0fdfa", "#ccfbf1", "#99f6e4", "#5eead4", "#2dd4bf", "#14b8a6", "#0d9488",
            "#0f766e", "#115e59", "#134e4a", "#042f2e",
        ],
    ),
    (
        "blue",
        [
            "#eff6ff", "#dbeafe", "#bfdbfe", "#93c5fd", "#60a5fa", "#3b82f6", "#2563eb",
            "#1d4ed8", "#1e40af", "#1e3a8a", "#172554",
        ],
    ),
    (
        "indigo",
        [
            "#eef2ff", "#e0e7ff", "#c7d2fe", "#a5b4fc", "#818cf8", "#6366f1", "#4f46e5",
            "#4338ca", "#3730a3", "#312e81", "#1e1b4b",
        ],
    ),
    (
        "purple",
        [
            "#faf5ff", "#f3e8ff", "#e9d5ff", "#d8b4fe", "#c084fc", "#a855f7", "#9333ea",
            "#7e22ce", "#6b21a8", "#581c87", "#3b0764",
        ],
    ),
    (
        "pink",
        [
            "#fdf2f8", "#fce7f3", "#fbcfe8", "#f9a8d4", "#f472b6", "#ec4899", "#db2777",
            "#be185d", "#9d174d", "#831843", "#500724",
        ],
    ),
];

const SPACING: [(&str, &str); 35] = [
    ("px", "1px"),
    ("0", "0px"),
    ("0.5", "0.125rem"),
    ("1", "0.25rem"),
    ("1.5", "0.375rem"),
    ("2", "0.5rem"),
    ("2.5", "0.625rem"),
    ("3", "0.75rem"),
    ("3.5", "0.875rem"),
    ("4", "1rem"),
    ("5", "1.25rem"),
    ("6", "1.5rem"),
    ("7", "1.75rem"),
    ("8", "2rem"),
    ("9", "2.25rem"),
    ("10", "2.5rem"),
    ("11", "2.75rem"),
    ("12", "3rem"),
    ("14", "3.5rem"),
    ("16", "4rem"),
    ("20", "5rem"),
    ("24", "6rem"),
    ("28", "7rem"),
    ("32", "8rem"),
    ("36", "9rem"),
    ("40", "10rem"),
    ("44", "11rem"),
    ("48", "12rem"),
    ("52", "13rem"),
    ("56", "14rem"),
    ("60", "15rem"),
    ("64", "16rem"),
    ("72", "18rem"),
    ("80", "20rem"),
    ("96", "24rem"),
];

const FRACTIONS: [(&str, &str); 15] = [
    ("1/2", "50%"),
    ("1/3", "33.333333%"),
    ("2/3", "66.666667%"),
    ("1/4", "25%"),
    ("2/4", "50%"),
    ("3/4", "75%"),
    ("1/5", "20%"),
    ("2/5", "40%"),
    ("3/5", "60%"),
    ("4/5", "80%"),
    ("1/6", "16.666667%"),
    ("2/6", "33.333333%"),
    ("3/6", "50%"),
    ("4/6", "66.666667%"),
    ("5/6", "83.333333%"),
];

const FONT_SIZES: [(&str, &str, &str); 13] = [
    ("xs", "0.75rem", "1rem"),
    ("sm", "0.875rem", "1.25rem"),
    ("base", "1rem", "1.5rem"),
    ("lg", "1.125rem", "1.75rem"),
    ("xl", "1.25rem", "1.75rem"),
    ("2xl", "1.5rem", "2rem"),
    ("3xl", "1.875rem", "2.25rem"),
    ("4xl", "2.25rem", "2.5rem"),
    ("5xl", "3rem", "1"),
    ("6xl", "3.75rem", "1"),
    ("7xl", "4.5rem", "1"),
    ("8xl", "6rem", "1"),
    ("9xl", "8rem", "1"),
];

const BOX_SHADOWS: [(&str, &str); 8] = [
    ("sm", "0 1px 2px 0 rgb(0 0 0 / 0.05)"),
    (
        "DEFAULT",
        "0 1px 3px 0 rgb(0 0 0 / 0.1), 0 1px 2px -1px rgb(0 0 0 / 0.1)",
    ),
    (
        "md",
        "0 4px 6px -1px rgb(0 0 0 / 0.1), 0 2px 4px -2px rgb(0 0 0 / 0.1)",
    ),
    (
        "lg",
        "0 10px 15px -3px rgb(0 0 0 / 0.1), 0 4px 6px -4px rgb(0 0 0 / 0.1)",
    ),
    (
        "xl",
        "0 20px 25px -5px rgb(0 0 0 / 0.1), 0 8px 10px -6px rgb(0 0 0 / 0.1)",
    ),
    ("2xl", "0 25px 50px -12px rgb(0 0 0 / 0.25)"),
    ("inner", "inset 0 2px 4px 0 rgb(0 0 0 / 0.05)"),
    ("none", "none"),
];

pub fn default_theme() -> Theme {
    let mut theme = Theme::new();

    for (name, value) in [
        ("inherit", "inherit"),
        ("current", "currentColor"),
        ("transparent", "transparent"),
        ("black", "#000"),
        ("white", "#fff"),
    ] {
        theme.set("colors", name, value);
    }
    for (family, values) in PALETTE {
        for (shade, value) in SHADES.iter().zip(values) {
            theme.set("colors", &format!("{}-{}", family, shade), value);
        }
    }

    set_all(&mut theme, "spacing", &SPACING);

    set_all(&mut theme, "width", &FRACTIONS);
    set_all(
        &mut theme,
        "width",
        &[
            ("auto", "auto"),
            ("full", "100%"),
            ("screen", "100vw"),
            ("min", "min-content"),
            ("max", "max-content"),
            ("fit", "fit-content"),
        ],
    );
    set_all(&mut theme, "height", &FRACTIONS);
    set_all(
        &mut theme,
        "height",
        &[
            ("auto", "auto"),
            ("full", "100%"),
            ("screen", "100vh"),
            ("min", "min-content"),
            ("max", "max-content"),
            ("fit", "fit-content"),
        ],
    );
    set_all(
        &mut theme,
        "maxWidth",
        &[
            ("none", "none"),
            ("xs", "20rem"),
            ("sm", "24rem"),
            ("md", "28rem"),
            ("lg", "32rem"),
            ("xl", "36rem"),
            ("2xl", "42rem"),
            ("3xl", "48rem"),
            ("4xl", "56rem"),
            ("5xl", "64rem"),
            ("6xl", "72rem"),
            ("7xl", "80rem"),
            ("full", "100%"),
            ("prose", "65ch"),
        ],
    );
    set_all(
        &mut theme,
        "inset",
        &[("auto", "auto"), ("full", "100%"), ("1/2", "50%")],
    );

    for (name, size, line_height) in FONT_SIZES {
        theme.set(
            "fontSize",
            name,
            ThemeValue::List(vec![size.to_string(), line_height.to_string()]),
        );
    }
    set_all(
        &mut theme,
        "fontWeight",
        &[
            ("thin", "100"),
            ("extralight", "200"),
            ("light", "300"),
            ("normal", "400"),
            ("medium", "500"),
            ("semibold", "600"),
            ("bold", "700"),
            ("extrabold", "800"),
            ("black", "900"),
        ],
    );
    for (name, stack) in [
        ("sans", &["ui-sans-serif", "system-ui", "sans-serif"][..]),
        (
            "serif",
            &["ui-serif", "Georgia", "Cambria", "\"Times New Roman\"", "Times", "serif"][..],
        ),
        (
            "mono",
            &["ui-monospace", "SFMono-Regular", "Menlo", "Monaco", "Consolas", "monospace"][..],
        ),
    ] {
        theme.set(
            "fontFamily",
            name,
            ThemeValue::List(stack.iter().map(|font| font.to_string()).collect()),
        );
    }
    set_all(
        &mut theme,
        "lineHeight",
        &[
            ("none", "1"),
            ("tight", "1.25"),
            ("snug", "1.375"),
            ("normal", "1.5"),
            ("relaxed", "1.625"),
            ("loose", "2"),
            ("3", "0.75rem"),
            ("4", "1rem"),
            ("5", "1.25rem"),
            ("6", "1.5rem"),
            ("7", "1.75rem"),
            ("8", "2rem"),
            ("9", "2.25rem"),
            ("10", "2.5rem"),
        ],
    );
    set_all(
        &mut theme,
        "letterSpacing",
        &[
            ("tighter", "-0.05em"),
            ("tight", "-0.025em"),
            ("normal", "0em"),
            ("wide", "0.025em"),
            ("wider", "0.05em"),
            ("widest", "0.1em"),
        ],
    );

    set_all(
        &mut theme,
        "borderRadius",
        &[
            ("none", "0px"),
            ("sm", "0.125rem"),
            ("DEFAULT", "0.25rem"),
            ("md", "0.375rem"),
            ("lg", "0.5rem"),
            ("xl", "0.75rem"),
            ("2xl", "1rem"),
            ("3xl", "1.5rem"),
            ("full", "9999px"),
        ],
    );
    set_all(
        &mut theme,
        "borderWidth",
        &[
            ("DEFAULT", "1px"),
            ("0", "0px"),
            ("2", "2px"),
            ("4", "4px"),
            ("8", "8px"),
        ],
    );
    set_all(&mut theme, "boxShadow", &BOX_SHADOWS);

    for step in (0..=100).step_by(5) {
        let value = crate::css::format_number(step as f64 / 100.0);
        theme.set("opacity", &step.to_string(), value);
    }
    set_all(
        &mut theme,
        "zIndex",
        &[
            ("0", "0"),
            ("10", "10"),
            ("20", "20"),
            ("30", "30"),
            ("40", "40"),
            ("50", "50"),
            ("auto", "auto"),
        ],
    );

    set_all(
        &mut theme,
        "screens",
        &[
            ("sm", "640px"),
            ("md", "768px"),
            ("lg", "1024px"),
            ("xl", "1280px"),
            ("2xl", "1536px"),
        ],
    );

    set_all(
        &mut theme,
        "flex",
        &[
            ("1", "1 1 0%"),
            ("auto", "1 1 auto"),
            ("initial", "0 1 auto"),
            ("none", "none"),
        ],
    );
    for columns in 1..=12 {
        theme.set(
            "gridTemplateColumns",
            &columns.to_string(),
            format!("repeat({}, minmax(0, 1fr))", columns),
        );
    }
    theme.set("gridTemplateColumns", "none", "none");

    set_all(
        &mut theme,
        "transitionDuration",
        &[
            ("DEFAULT", "150ms"),
            ("0", "0s"),
            ("75", "75ms"),
            ("100", "100ms"),
            ("150", "150ms"),
            ("200", "200ms"),
            ("300", "300ms"),
            ("500", "500ms"),
            ("700", "700ms"),
            ("1000", "1000ms"),
        ],
    );
    set_all(
        &mut theme,
        "transitionTimingFunction",
        &[
            ("DEFAULT", "cubic-bezier(0.4, 0, 0.2, 1)"),
            ("linear", "linear"),
            ("in", "cubic-bezier(0.4, 0, 1, 1)"),
            ("out", "cubic-bezier(0, 0, 0.2, 1)"),
            ("in-out", "cubic-bezier(0.4, 0, 0.2, 1)"),
        ],
    );
    set_all(
        &mut theme,
        "cursor",
        &[
            ("auto", "auto"),
            ("default", "default"),
            ("pointer", "pointer"),
            ("wait", "wait"),
            ("text", "text"),
            ("move", "move"),
            ("help", "help"),
            ("not-allowed", "not-allowed"),
            ("none", "none"),
            ("grab", "grab"),
        ],
    );

    theme
}

fn set_all(theme: &mut Theme, category: &str, entries: &[(&str, &str)]) {
    for (key, value) in entries {
        theme.set(category, key, *value);
    }
}
