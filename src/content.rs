use crate::error::{ConfigError, Diagnostic};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPattern {
    glob: String,
    negated: bool,
}

impl ContentPattern {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        let (negated, rest) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let mut glob = rest;
        while let Some(stripped) = glob.strip_prefix("./") {
            glob = stripped;
        }
        Self {
            glob: glob.to_string(),
            negated,
        }
    }

    pub fn glob(&self) -> &str {
        &self.glob
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    fn literal_root(&self) -> PathBuf {
        let mut root = PathBuf::new();
        for segment in self.glob.split('/') {
            if has_glob_meta(segment) {
                break;
            }
            root.push(segment);
        }
        root
    }
}

impl From<&str> for ContentPattern {
    fn from(value: &str) -> Self {
        ContentPattern::new(value)
    }
}

impl From<String> for ContentPattern {
    fn from(value: String) -> Self {
        ContentPattern::new(&value)
    }
}

fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanOptions {
    pub respect_gitignore: bool,
    pub follow_links: bool,
    pub include_node_modules: bool,
    pub include_binary_files: bool,
    pub include_lock_files: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            respect_gitignore: false,
            follow_links: true,
            include_node_modules: false,
            include_binary_files: false,
            include_lock_files: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ContentResolver {
    base_dir: PathBuf,
    roots: Vec<PathBuf>,
    include: GlobSet,
    exclude: GlobSet,
    options: ScanOptions,
}

impl ContentResolver {
    pub fn new(
        base_dir: &Path,
        patterns: &[ContentPattern],
        options: ScanOptions,
    ) -> Result<Self, ConfigError> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut roots = Vec::new();

        for pattern in patterns {
            if pattern.glob.is_empty() {
                continue;
            }
            let expanded = expand_directory_pattern(base_dir, pattern);
            let glob = GlobBuilder::new(expanded.glob())
                .literal_separator(true)
                .build()
                .map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.glob.clone(),
                    source,
                })?;
            if pattern.negated {
                exclude.add(glob);
            } else {
                include.add(glob);
                roots.push(expanded.literal_root());
            }
        }

        let include = include.build().map_err(|source| ConfigError::InvalidPattern {
            pattern: "<content>".to_string(),
            source,
        })?;
        let exclude = exclude.build().map_err(|source| ConfigError::InvalidPattern {
            pattern: "<content>".to_string(),
            source,
        })?;

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            roots: collapse_roots(roots),
            include,
            exclude,
            options,
        })
    }

    /// Walks the filesystem and returns every matching file, ordered by path.
    ///
    /// Each directory is entered at most once per call (by canonical path), so
    /// symlink cycles terminate. Walk errors are reported as diagnostics.
    pub fn resolve(&self) -> Resolution {
        let visited = Arc::new(Mutex::new(HashSet::<PathBuf>::new()));
        let mut matched = BTreeMap::<PathBuf, PathBuf>::new();
        let mut seen_files = HashSet::<PathBuf>::new();
        let mut diagnostics = Vec::new();

        for root in &self.roots {
            let start = self.base_dir.join(root);
            if !start.exists() {
                debug!(root = %start.display(), "content root does not exist");
                continue;
            }
            if start.is_dir() && !mark_visited(&visited, &start) {
                continue;
            }

            let mut builder = WalkBuilder::new(&start);
            builder
                .hidden(false)
                .ignore(false)
                .parents(self.options.respect_gitignore)
                .git_ignore(self.options.respect_gitignore)
                .git_global(self.options.respect_gitignore)
                .git_exclude(self.options.respect_gitignore)
                .follow_links(self.options.follow_links);
            let filter_visited = Arc::clone(&visited);
            builder.filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                match entry.file_type() {
                    Some(file_type) if file_type.is_dir() => {
                        mark_visited(&filter_visited, entry.path())
                    }
                    _ => true,
                }
            });

            for entry in builder.build() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) if is_symlink_loop(&err) => {
                        debug!("{}", err);
                        continue;
                    }
                    Err(err) => {
                        let diagnostic = walk_diagnostic(&err);
                        warn!("{}", diagnostic);
                        diagnostics.push(diagnostic);
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                let path = entry.path();
                if !self.matches(path) || self.should_skip_file(path) {
                    continue;
                }
                let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
                let absolute = absolute_path(path);
                if matched.contains_key(&absolute) {
                    continue;
                }
                matched.insert(absolute, canonical);
            }
        }

        // Sorted by path; the first path reaching a canonical file wins.
        let mut files = Vec::with_capacity(matched.len());
        for (path, canonical) in matched {
            if seen_files.insert(canonical) {
                files.push(path);
            }
        }

        debug!(files = files.len(), "resolved content patterns");
        Resolution { files, diagnostics }
    }

    fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        let included = self.include.is_match(relative) || self.include.is_match(path);
        if !included {
            return false;
        }
        !(self.exclude.is_match(relative) || self.exclude.is_match(path))
    }

    fn should_skip_file(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        if !self.options.include_node_modules
            && relative
                .components()
                .any(|component| component.as_os_str() == "node_modules")
        {
            return true;
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        if !self.options.include_lock_files && is_common_lock_file(file_name) {
            return true;
        }

        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(|value| value.to_ascii_lowercase());
        if let Some(ext) = ext.as_deref() {
            if !self.options.include_binary_files && is_binary_extension(ext) {
                return true;
            }
        }

        false
    }
}

fn mark_visited(visited: &Mutex<HashSet<PathBuf>>, dir: &Path) -> bool {
    let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let mut guard = visited
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.insert(canonical)
}

// ignore reports cycles before the visited filter sees them.
fn is_symlink_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_symlink_loop(err),
        _ => false,
    }
}

fn walk_diagnostic(err: &ignore::Error) -> Diagnostic {
    match err {
        ignore::Error::WithPath { path, err } => Diagnostic::UnreadableDirectory {
            path: path.clone(),
            message: err.to_string(),
        },
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_diagnostic(err)
        }
        other => Diagnostic::Walk(other.to_string()),
    }
}

fn expand_directory_pattern(base_dir: &Path, pattern: &ContentPattern) -> ContentPattern {
    if has_glob_meta(&pattern.glob) {
        return pattern.clone();
    }
    let candidate = base_dir.join(&pattern.glob);
    if candidate.is_dir() {
        let trimmed = pattern.glob.trim_end_matches('/');
        return ContentPattern {
            glob: format!("{}/**/*", trimmed),
            negated: pattern.negated,
        };
    }
    pattern.clone()
}

fn collapse_roots(mut roots: Vec<PathBuf>) -> Vec<PathBuf> {
    roots.sort();
    roots.dedup();
    let mut out: Vec<PathBuf> = Vec::new();
    for root in roots {
        if out.iter().any(|kept| root.starts_with(kept)) {
            continue;
        }
        out.push(root);
    }
    out
}

fn absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "webp"
            | "ico"
            | "bmp"
            | "tiff"
            | "avif"
            | "mp4"
            | "mov"
            | "avi"
            | "mkv"
            | "webm"
            | "mp3"
            | "wav"
            | "ogg"
            | "flac"
            | "zip"
            | "gz"
            | "tgz"
            | "rar"
            | "7z"
            | "pdf"
            | "woff"
            | "woff2"
            | "ttf"
            | "otf"
            | "eot"
    )
}

fn is_common_lock_file(file_name: &str) -> bool {
    matches!(
        file_name,
        "package-lock.json"
            | "pnpm-lock.yaml"
            | "yarn.lock"
            | "bun.lockb"
            | "bun.lock"
            | "npm-shrinkwrap.json"
            | "Cargo.lock"
            | "composer.lock"
            | "Gemfile.lock"
            | "poetry.lock"
            | "Pipfile.lock"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(base: &Path, relative: &str, content: &str) {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write fixture");
    }

    fn names(base: &Path, files: &[PathBuf]) -> Vec<String> {
        let base = absolute_path(&base.canonicalize().expect("canonical base"));
        files
            .iter()
            .map(|path| {
                let canonical = path.canonicalize().expect("canonical file");
                canonical
                    .strip_prefix(&base)
                    .unwrap_or(&canonical)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn resolve(base: &Path, patterns: &[&str]) -> Resolution {
        let patterns = patterns
            .iter()
            .map(|raw| ContentPattern::new(raw))
            .collect::<Vec<_>>();
        ContentResolver::new(base, &patterns, ScanOptions::default())
            .expect("valid patterns")
            .resolve()
    }

    #[test]
    fn parses_negation_and_dot_prefix() {
        let pattern = ContentPattern::new("./src/**/*.rs");
        assert_eq!(pattern.glob(), "src/**/*.rs");
        assert!(!pattern.is_negated());

        let negated = ContentPattern::new("!./src/generated/**");
        assert_eq!(negated.glob(), "src/generated/**");
        assert!(negated.is_negated());
    }

    #[test]
    fn literal_root_stops_at_first_glob_segment() {
        assert_eq!(
            ContentPattern::new("./src/**/*.rs").literal_root(),
            PathBuf::from("src")
        );
        assert_eq!(
            ContentPattern::new("./index.html").literal_root(),
            PathBuf::from("index.html")
        );
        assert_eq!(ContentPattern::new("**/*.html").literal_root(), PathBuf::new());
        assert_eq!(
            ContentPattern::new("assets/css/*.css").literal_root(),
            PathBuf::from("assets/css")
        );
    }

    #[test]
    fn resolves_recursive_brace_and_literal_patterns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "src/main.rs", "");
        write(base, "src/ui/view.html", "");
        write(base, "src/ui/app.css", "");
        write(base, "src/ui/notes.txt", "");
        write(base, "assets/page.html", "");
        write(base, "index.html", "");
        write(base, "other.html", "");

        let resolution = resolve(
            base,
            &[
                "./src/**/*.{rs,html,css}",
                "./assets/**/*.{html,css}",
                "./index.html",
            ],
        );

        assert_eq!(
            names(base, &resolution.files),
            vec![
                "assets/page.html",
                "index.html",
                "src/main.rs",
                "src/ui/app.css",
                "src/ui/view.html",
            ]
        );
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "src/top.html", "");
        write(base, "src/nested/deep.html", "");

        let resolution = resolve(base, &["src/*.html"]);
        assert_eq!(names(base, &resolution.files), vec!["src/top.html"]);
    }

    #[test]
    fn overlapping_patterns_are_deduplicated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "src/a.html", "");

        let resolution = resolve(base, &["src/**/*.html", "./src/a.html", "src/*"]);
        assert_eq!(names(base, &resolution.files), vec!["src/a.html"]);
    }

    #[test]
    fn zero_matches_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolution = resolve(dir.path(), &["missing/**/*.html"]);
        assert!(resolution.files.is_empty());
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn exclusion_patterns_remove_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "src/keep.html", "");
        write(base, "src/generated/skip.html", "");

        let resolution = resolve(base, &["src/**/*.html", "!src/generated/**"]);
        assert_eq!(names(base, &resolution.files), vec!["src/keep.html"]);
    }

    #[test]
    fn plain_directory_pattern_covers_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "templates/a.html", "");
        write(base, "templates/deep/b.html", "");

        let resolution = resolve(base, &["./templates"]);
        assert_eq!(
            names(base, &resolution.files),
            vec!["templates/a.html", "templates/deep/b.html"]
        );
    }

    #[test]
    fn default_filters_skip_node_modules_binaries_and_lock_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "src/index.html", "");
        write(base, "src/logo.png", "");
        write(base, "src/package-lock.json", "");
        write(base, "src/node_modules/lib/index.html", "");

        let resolution = resolve(base, &["src/**/*"]);
        assert_eq!(names(base, &resolution.files), vec!["src/index.html"]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "b/one.html", "");
        write(base, "a/two.html", "");
        write(base, "c.html", "");

        let first = resolve(base, &["**/*.html"]);
        let second = resolve(base, &["**/*.html"]);
        assert_eq!(first, second);
        assert_eq!(
            names(base, &first.files),
            vec!["a/two.html", "b/one.html", "c.html"]
        );
    }

    #[test]
    fn invalid_glob_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = ContentResolver::new(
            dir.path(),
            &[ContentPattern::new("src/{a,b")],
            ScanOptions::default(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycles_terminate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path();
        write(base, "src/a.html", "");
        std::os::unix::fs::symlink(base.join("src"), base.join("src/loop"))
            .expect("create symlink");

        let resolution = resolve(base, &["src/**/*.html"]);
        assert_eq!(names(base, &resolution.files), vec!["src/a.html"]);
        assert!(resolution.diagnostics.is_empty(), "{:?}", resolution.diagnostics);
    }

    #[test]
    fn unreadable_directory_becomes_a_diagnostic() {
        let err = ignore::Error::WithDepth {
            depth: 2,
            err: Box::new(ignore::Error::WithPath {
                path: PathBuf::from("src/private"),
                err: Box::new(ignore::Error::Io(std::io::Error::from(
                    std::io::ErrorKind::PermissionDenied,
                ))),
            }),
        };
        assert!(!is_symlink_loop(&err));
        match walk_diagnostic(&err) {
            Diagnostic::UnreadableDirectory { path, message } => {
                assert_eq!(path, PathBuf::from("src/private"));
                assert!(message.contains("permission denied"), "{}", message);
            }
            other => panic!("unexpected diagnostic: {:?}", other),
        }
    }

    #[test]
    fn loop_errors_are_recognised_through_wrappers() {
        let err = ignore::Error::WithPath {
            path: PathBuf::from("src/loop"),
            err: Box::new(ignore::Error::Loop {
                ancestor: PathBuf::from("src"),
                child: PathBuf::from("src/loop"),
            }),
        };
        assert!(is_symlink_loop(&err));
        assert!(matches!(
            walk_diagnostic(&ignore::Error::Io(std::io::Error::other("boom"))),
            Diagnostic::Walk(_)
        ));
    }
}
