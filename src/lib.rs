pub mod assembler;
pub mod builtins;
pub mod config;
pub mod content;
pub mod css;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod theme;

pub use assembler::{CssOutput, OutputStyle};
pub use config::{Config, DarkMode, ThemeConfig};
pub use content::{ContentPattern, ScanOptions};
pub use error::{ConfigError, Diagnostic, PluginError};
pub use plugin::{DeclarativePlugin, PluginApi, UtilityContributor, plugin_fn};
pub use registry::{
    Declaration, GeneratedRule, Layer, Rule, UtilityDefinition, UtilityInput, UtilityValue,
    Variant,
};
pub use scanner::{SourceFile, Token};
pub use theme::{Theme, ThemeValue};

use crate::builtins::CoreUtilities;
use crate::content::ContentResolver;
use crate::registry::UtilityRegistry;
use crate::resolver::Resolver;
use crate::scanner::{LexerAlphabet, read_sources, scan_sources};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileStats {
    pub files_scanned: usize,
    pub tokens_seen: usize,
    pub rules_emitted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledOutput {
    pub css: CssOutput,
    pub rules: Vec<Rule>,
    pub stats: CompileStats,
    pub diagnostics: Vec<Diagnostic>,
}

/// Owns the merged theme and the populated registry for one configuration.
///
/// Construction runs every plugin; after that the compiler is read-only and
/// can be shared across threads or reused for repeated compiles.
pub struct Compiler {
    content: ContentResolver,
    theme: Theme,
    registry: UtilityRegistry,
    alphabet: LexerAlphabet,
    separator: char,
    output: OutputStyle,
    pool: Option<rayon::ThreadPool>,
}

impl Compiler {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let alphabet = LexerAlphabet::with_options(config.separator, &config.lexer)?;
        let content = ContentResolver::new(&config.base_dir, &config.content, config.scan.clone())?;
        let theme = Theme::build(
            &theme::default_theme(),
            &config.theme.extend,
            &config.theme.replace,
        );
        let registry = plugin::build_registry(
            &theme,
            &CoreUtilities::new(config.dark_mode),
            &config.plugins,
        )?;
        let pool = config
            .jobs
            .map(|jobs| rayon::ThreadPoolBuilder::new().num_threads(jobs).build())
            .transpose()?;

        debug!(
            utilities = registry.utility_count(),
            variants = registry.variant_count(),
            overrides = registry.events().len(),
            "registry ready"
        );

        Ok(Self {
            content,
            theme,
            registry,
            alphabet,
            separator: config.separator,
            output: config.output,
            pool,
        })
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn registry(&self) -> &UtilityRegistry {
        &self.registry
    }

    pub fn compile(&self) -> CompiledOutput {
        let started = Instant::now();
        let resolution = self.content.resolve();
        debug!(files = resolution.files.len(), "content resolved");

        let (sources, read_diagnostics) = self.install(|| read_sources(&resolution.files));
        let mut output = self.compile_sources(&sources);

        let mut diagnostics = resolution.diagnostics;
        diagnostics.extend(read_diagnostics);
        diagnostics.append(&mut output.diagnostics);
        output.diagnostics = diagnostics;

        info!(
            files = output.stats.files_scanned,
            tokens = output.stats.tokens_seen,
            rules = output.stats.rules_emitted,
            warnings = output.diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compiled"
        );
        output
    }

    pub fn compile_sources(&self, sources: &[SourceFile]) -> CompiledOutput {
        let tokens = self.install(|| scan_sources(sources, &self.alphabet));
        debug!(tokens = tokens.len(), "tokens scanned");

        let resolver = Resolver::new(&self.theme, &self.registry, self.separator);
        let mut rules = self.install(|| {
            tokens
                .par_iter()
                .filter_map(|token| resolver.resolve(&token.raw, token.ordinal))
                .collect::<Vec<_>>()
        });
        rules.extend(self.base_rules());

        let assembly = assembler::assemble(rules, self.output);
        CompiledOutput {
            stats: CompileStats {
                files_scanned: sources.len(),
                tokens_seen: tokens.len(),
                rules_emitted: assembly.rules.len(),
            },
            css: assembly.css,
            rules: assembly.rules,
            diagnostics: Vec::new(),
        }
    }

    fn base_rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.registry
            .base_rules()
            .iter()
            .enumerate()
            .map(|(ordinal, rule)| Rule {
                selector: rule.selector.clone(),
                declarations: rule.declarations.clone(),
                at_rules: Vec::new(),
                layer: Layer::Base,
                ordinal,
            })
    }

    fn install<T, F>(&self, op: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

pub fn compile(config: &Config) -> Result<CompiledOutput, ConfigError> {
    Ok(Compiler::new(config)?.compile())
}
