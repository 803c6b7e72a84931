// src/watch/resolver.rs

//! Import graph discovery for edge function entrypoints.
//!
//! Sources are parsed with tree-sitter and only module specifiers are
//! extracted; nothing is type-checked or executed. Each absolute path is
//! visited at most once, so import cycles terminate without special handling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use tree_sitter::{Language, Parser, Query, QueryCursor, StreamingIterator};
use tracing::{debug, warn};

use crate::errors::EdgeWatchError;
use crate::fs::FileSystem;
use crate::watch::path_utils::{is_within, normalize};

/// Import map manifests, in lookup precedence.
pub const IMPORT_MAP_FILES: &[&str] = &["deno.json", "deno.jsonc", "import_map.json"];

/// Specifier schemes that point at remote or built-in modules.
const NETWORK_SCHEMES: &[&str] = &["http:", "https:", "npm:", "jsr:", "node:", "data:", "blob:"];

/// Matches every module specifier a file pulls in: static imports
/// (including `import type` and side-effect imports), re-exports with a
/// source, and `import("...")` calls with a string literal.
const SPECIFIER_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @specifier))
    (export_statement
      source: (string (string_fragment) @specifier))
    (call_expression
      function: (import)
      arguments: (arguments (string (string_fragment) @specifier)))
"#;

static TS_SPECIFIER_QUERY: OnceLock<Query> = OnceLock::new();
static TSX_SPECIFIER_QUERY: OnceLock<Query> = OnceLock::new();

/// Grammar used to parse a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    TypeScript,
    /// TypeScript or JavaScript with JSX.
    Tsx,
}

impl Syntax {
    /// `.tsx` and `.jsx` need the JSX-aware grammar; everything else parses
    /// as TypeScript.
    pub fn for_path(path: &Path) -> Syntax {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx" | "jsx") => Syntax::Tsx,
            _ => Syntax::TypeScript,
        }
    }

    fn language(self) -> Language {
        match self {
            Syntax::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Syntax::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn specifier_query(self) -> &'static Query {
        let cell = match self {
            Syntax::TypeScript => &TS_SPECIFIER_QUERY,
            Syntax::Tsx => &TSX_SPECIFIER_QUERY,
        };
        cell.get_or_init(|| Query::new(&self.language(), SPECIFIER_QUERY).expect("invalid specifier query"))
    }
}

/// Extract module specifiers from TypeScript source, in order of
/// appearance. Duplicates are kept.
pub fn scan_imports(source: &str) -> Vec<String> {
    scan_imports_as(Syntax::TypeScript, source)
}

/// Extract module specifiers using the given grammar.
///
/// Comments and string contents never yield specifiers. Files with syntax
/// errors still report the imports the parser could recover.
pub fn scan_imports_as(syntax: Syntax, source: &str) -> Vec<String> {
    let language = syntax.language();
    let mut parser = Parser::new();
    if let Err(err) = parser.set_language(&language) {
        warn!(?syntax, error = %err, "failed to load grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source, None) else {
        warn!(?syntax, "parser gave up on source");
        return Vec::new();
    };

    let query = syntax.specifier_query();
    let bytes = source.as_bytes();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), bytes);

    let mut found: Vec<(usize, String)> = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if let Ok(text) = capture.node.utf8_text(bytes) {
                found.push((capture.node.start_byte(), text.to_string()));
            }
        }
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, s)| s).collect()
}

/// Turn a specifier (or an import map value) into a local path.
///
/// Relative specifiers are anchored at `base`. Remote, built-in and bare
/// specifiers yield `None`.
pub fn to_local_path(specifier: &str, base: &Path) -> Option<PathBuf> {
    if let Some(rest) = specifier.strip_prefix("file://") {
        return Some(normalize(Path::new(rest)));
    }
    if NETWORK_SCHEMES.iter().any(|s| specifier.starts_with(s)) {
        return None;
    }
    if specifier.starts_with('/') {
        return Some(normalize(Path::new(specifier)));
    }
    if specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../") {
        return Some(normalize(&base.join(specifier)));
    }
    None
}

/// A parsed import map.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    /// Directory that relative values are resolved against.
    base: PathBuf,
    exact: BTreeMap<String, String>,
    /// Prefix mappings (keys ending in `/`), longest first.
    prefixes: Vec<(String, String)>,
    /// Manifest files that contributed to this map.
    sources: Vec<PathBuf>,
}

impl ImportMap {
    /// Load an import map from `path`.
    ///
    /// `.jsonc` files may contain comments and trailing commas; everything
    /// else must be strict JSON. A `deno.json` without `imports` may point at
    /// a separate map through `importMap`, which is followed once.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<ImportMap, EdgeWatchError> {
        Self::load_inner(fs, path, true)
    }

    fn load_inner(fs: &dyn FileSystem, path: &Path, follow: bool) -> Result<ImportMap, EdgeWatchError> {
        let text = fs
            .read_to_string(path)
            .map_err(|e| EdgeWatchError::resolver(path, format!("{e:#}")))?;

        let lenient = path.extension().is_some_and(|e| e == "jsonc");
        let parsed = if lenient {
            serde_json::from_str::<Value>(&strip_jsonc(&text))
        } else {
            serde_json::from_str::<Value>(&text)
        };
        let value = parsed.map_err(|e| EdgeWatchError::resolver(path, format!("malformed import map: {e}")))?;
        let obj = value
            .as_object()
            .ok_or_else(|| EdgeWatchError::resolver(path, "malformed import map: expected a JSON object"))?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

        if let Some(imports) = obj.get("imports") {
            let mut map = Self::from_imports(base, imports)
                .map_err(|msg| EdgeWatchError::resolver(path, msg))?;
            map.sources.push(path.to_path_buf());
            return Ok(map);
        }

        if follow {
            if let Some(Value::String(other)) = obj.get("importMap") {
                let nested_path = to_local_path(other, &base)
                    .unwrap_or_else(|| normalize(&base.join(other)));
                let mut nested = Self::load_inner(fs, &nested_path, false)?;
                nested.sources.insert(0, path.to_path_buf());
                return Ok(nested);
            }
        }

        Ok(ImportMap {
            base,
            sources: vec![path.to_path_buf()],
            ..ImportMap::default()
        })
    }

    fn from_imports(base: PathBuf, imports: &Value) -> Result<ImportMap, String> {
        let entries = imports
            .as_object()
            .ok_or_else(|| "malformed import map: \"imports\" must be an object".to_string())?;

        let mut exact = BTreeMap::new();
        let mut prefixes = Vec::new();
        for (key, value) in entries {
            let target = value
                .as_str()
                .ok_or_else(|| format!("malformed import map: value of {key:?} must be a string"))?;
            if key.ends_with('/') {
                prefixes.push((key.clone(), target.to_string()));
            } else {
                exact.insert(key.clone(), target.to_string());
            }
        }
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(ImportMap {
            base,
            exact,
            prefixes,
            sources: Vec::new(),
        })
    }

    /// Rewrite `specifier` through the map, if any entry applies.
    pub fn rewrite(&self, specifier: &str) -> Option<String> {
        if let Some(target) = self.exact.get(specifier) {
            return Some(target.clone());
        }
        self.prefixes.iter().find_map(|(prefix, target)| {
            specifier
                .strip_prefix(prefix.as_str())
                .map(|rest| format!("{target}{rest}"))
        })
    }

    /// Directory that mapped relative values are anchored at.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

/// Strip `//` and `/* */` comments and trailing commas from JSON text.
pub fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    remove_trailing_commas(&out)
}

fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&n) = chars.get(i + 1) {
                    out.push(n);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

/// Search for an import map next to `start_dir`, then in each parent up to
/// and including `root`.
///
/// When `start_dir` lies outside `root`, only `start_dir` itself is searched.
pub fn find_import_map(fs: &dyn FileSystem, start_dir: &Path, root: &Path) -> Option<PathBuf> {
    for dir in start_dir.ancestors() {
        if let Some(found) = IMPORT_MAP_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| fs.is_file(candidate))
        {
            return Some(found);
        }
        if dir == root || !is_within(dir, root) {
            break;
        }
    }
    None
}

/// A `source → imported` edge of the import graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub source: PathBuf,
    pub imported: PathBuf,
}

/// Files reached from an entrypoint, stored as an index-based graph.
#[derive(Debug, Default)]
pub struct ImportGraph {
    graph: DiGraph<PathBuf, ()>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl ImportGraph {
    /// Insert `path`, returning its node and whether it was new.
    fn visit(&mut self, path: PathBuf) -> (NodeIndex, bool) {
        if let Some(&idx) = self.index.get(&path) {
            return (idx, false);
        }
        let idx = self.graph.add_node(path.clone());
        self.index.insert(path, idx);
        (idx, true)
    }

    fn link(&mut self, from: NodeIndex, to: NodeIndex) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn files(&self) -> BTreeSet<PathBuf> {
        self.graph.node_weights().cloned().collect()
    }

    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| DependencyEdge {
                source: self.graph[e.source()].clone(),
                imported: self.graph[e.target()].clone(),
            })
            .collect();
        edges.sort();
        edges
    }
}

/// Result of walking one entrypoint.
#[derive(Debug, Default)]
pub struct Resolution {
    pub graph: ImportGraph,
    /// Import map manifests consulted for this entrypoint.
    pub manifests: Vec<PathBuf>,
    /// Non-fatal problems met along the way.
    pub errors: Vec<EdgeWatchError>,
}

impl Resolution {
    /// Every local file the entrypoint depends on, manifests included.
    pub fn files(&self) -> BTreeSet<PathBuf> {
        let mut files = self.graph.files();
        files.extend(self.manifests.iter().cloned());
        files
    }
}

/// Walks import graphs over a [`FileSystem`].
#[derive(Debug)]
pub struct ImportResolver<'a> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
}

impl<'a> ImportResolver<'a> {
    /// `root` bounds the upward search for implicit import maps.
    pub fn new(fs: &'a dyn FileSystem, root: &'a Path) -> Self {
        Self { fs, root }
    }

    /// Collect every local file reachable from `entrypoint`.
    ///
    /// With `import_map` unset, the nearest manifest (see
    /// [`find_import_map`]) is used. Missing files, unreadable sources and
    /// malformed manifests are logged and skipped.
    pub fn walk(&self, entrypoint: &Path, import_map: Option<&Path>) -> Resolution {
        let mut resolution = Resolution::default();
        let entrypoint = normalize(entrypoint);

        let map_path = match import_map {
            Some(p) => Some(p.to_path_buf()),
            None => entrypoint
                .parent()
                .and_then(|dir| find_import_map(self.fs, dir, self.root)),
        };

        let map = match map_path {
            Some(path) => match ImportMap::load(self.fs, &path) {
                Ok(map) => {
                    debug!(path = ?path, entries = map.exact.len() + map.prefixes.len(), "loaded import map");
                    resolution.manifests.extend(map.sources().iter().cloned());
                    Some(map)
                }
                Err(err) => {
                    warn!(error = %err, "ignoring import map");
                    if self.fs.is_file(&path) {
                        resolution.manifests.push(path);
                    }
                    resolution.errors.push(err);
                    None
                }
            },
            None => None,
        };

        if !self.fs.is_file(&entrypoint) {
            warn!(entrypoint = ?entrypoint, "entrypoint not found");
            resolution
                .errors
                .push(EdgeWatchError::resolver(&entrypoint, "entrypoint not found"));
            return resolution;
        }

        let (root_idx, _) = resolution.graph.visit(entrypoint.clone());
        let mut stack = vec![(root_idx, entrypoint)];

        while let Some((idx, file)) = stack.pop() {
            let source = match self.fs.read_to_string(&file) {
                Ok(s) => s,
                Err(err) => {
                    warn!(file = ?file, error = %err, "failed to read source; skipping");
                    resolution
                        .errors
                        .push(EdgeWatchError::resolver(&file, format!("{err:#}")));
                    continue;
                }
            };

            let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            for specifier in scan_imports_as(Syntax::for_path(&file), &source) {
                let Some(target) = self.resolve_specifier(&specifier, &dir, map.as_ref()) else {
                    debug!(file = ?file, %specifier, "not a local import");
                    continue;
                };
                if !self.fs.is_file(&target) {
                    warn!(file = ?file, %specifier, target = ?target, "import not found; skipping");
                    continue;
                }
                let (child, is_new) = resolution.graph.visit(target.clone());
                resolution.graph.link(idx, child);
                if is_new {
                    stack.push((child, target));
                }
            }
        }

        resolution
    }

    fn resolve_specifier(&self, specifier: &str, dir: &Path, map: Option<&ImportMap>) -> Option<PathBuf> {
        if let Some(map) = map {
            if let Some(mapped) = map.rewrite(specifier) {
                return to_local_path(&mapped, map.base());
            }
        }
        to_local_path(specifier, dir)
    }
}
