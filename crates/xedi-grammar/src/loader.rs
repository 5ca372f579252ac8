//! Grammar loader with inheritance support

use crate::inheritance::{InheritanceGraph, apply_inheritance_chain};
use crate::model::{Direction, Grammar, GroupRule, LoopRule, SegmentRule};
use crate::registry::GrammarCache;
use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, trace};

static SEGMENT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]{1,2}$").expect("segment tag pattern compiles"));

/// Whether `tag` has the shape of an X12 segment tag
#[must_use]
pub fn is_segment_tag(tag: &str) -> bool {
    SEGMENT_TAG.is_match(tag)
}

/// Grammars compiled into the crate, keyed by name
const BUILTIN_GRAMMARS: &[(&str, &str)] = &[
    ("baseline", include_str!("../grammars/baseline.yaml")),
    ("x12-003070", include_str!("../grammars/x12-003070.yaml")),
    (
        "x12-003070-request",
        include_str!("../grammars/x12-003070-request.yaml"),
    ),
    (
        "x12-003070-response",
        include_str!("../grammars/x12-003070-response.yaml"),
    ),
    ("x12-004010", include_str!("../grammars/x12-004010.yaml")),
    (
        "x12-004010-request",
        include_str!("../grammars/x12-004010-request.yaml"),
    ),
    (
        "x12-004010-response",
        include_str!("../grammars/x12-004010-response.yaml"),
    ),
];

/// Names of the built-in grammars
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_GRAMMARS.iter().map(|(name, _)| *name)
}

/// Serializable grammar format for loading from files
#[derive(Debug, Deserialize)]
struct GrammarFile {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    direction: Option<Direction>,
    #[serde(default)]
    transaction_sets: Vec<String>,
    #[serde(default)]
    strict_segments: Option<bool>,
    #[serde(default)]
    check_control_numbers: Option<bool>,
    #[serde(default)]
    segments: Vec<SegmentFile>,
    #[serde(default)]
    loops: Vec<LoopFile>,
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    tag: String,
    #[serde(default)]
    min_elements: usize,
    #[serde(default)]
    max_elements: Option<usize>,
    #[serde(default)]
    groups: Vec<GroupFile>,
}

#[derive(Debug, Deserialize)]
struct GroupFile {
    start: usize,
    arity: usize,
    #[serde(default)]
    max_repeats: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LoopFile {
    id: String,
    #[serde(default)]
    trigger: Option<String>,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    loops: Vec<LoopFile>,
}

/// Loads grammars from the built-in set and from search paths, resolving
/// `parent` chains and caching the merged result.
pub struct GrammarLoader {
    cache: Arc<GrammarCache>,
    search_paths: Vec<PathBuf>,
}

impl GrammarLoader {
    /// Create a loader searching `search_paths` before the built-ins
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            cache: Arc::new(GrammarCache::new()),
            search_paths,
        }
    }

    /// Create a loader sharing an existing cache
    pub fn with_cache(cache: Arc<GrammarCache>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            cache,
            search_paths,
        }
    }

    /// Add a search path for grammar files
    pub fn add_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    /// The cache of resolved grammars
    pub fn cache(&self) -> &GrammarCache {
        &self.cache
    }

    /// Load a grammar by name with its parent chain merged in
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if neither the search paths nor the
    /// built-ins define `name`, [`Error::Inheritance`] for a missing parent
    /// or a cycle, and format errors from the grammar files themselves.
    pub fn load(&self, name: &str) -> Result<Arc<Grammar>> {
        if let Some(cached) = self.cache.get(name) {
            trace!(grammar = name, "grammar cache hit");
            return Ok(cached);
        }

        debug!(grammar = name, "loading grammar");
        let leaf = self.load_unresolved(name)?;
        let chain = self.resolve_inheritance_chain(leaf)?;
        let merged = apply_inheritance_chain(&chain)
            .ok_or_else(|| Error::inheritance(format!("empty inheritance chain for {name}")))?;

        info!(
            grammar = name,
            chain = ?merged.inheritance_chain,
            segments = merged.segments.len(),
            loops = merged.loops.len(),
            "resolved grammar"
        );

        let merged = Arc::new(merged);
        self.cache.insert(name, Arc::clone(&merged));
        Ok(merged)
    }

    /// Load a single grammar without resolving its parent
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no source defines `name`.
    pub fn load_unresolved(&self, name: &str) -> Result<Grammar> {
        if let Some(path) = self.find_file(name) {
            trace!(grammar = name, path = %path.display(), "found grammar file");
            return Self::load_from_file(&path);
        }
        if let Some((_, text)) = BUILTIN_GRAMMARS.iter().find(|(n, _)| *n == name) {
            trace!(grammar = name, "using built-in grammar");
            return Self::load_from_yaml(text);
        }
        Err(Error::not_found(name, &self.search_paths))
    }

    /// Load a grammar from a specific file path
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not hold a valid grammar.
    pub fn load_from_file(path: &Path) -> Result<Grammar> {
        let content = std::fs::read_to_string(path)?;
        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::load_from_yaml(&content)
        } else {
            Self::load_from_json(&content)
        }
    }

    /// Load a grammar from YAML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] for malformed YAML and
    /// [`Error::Validation`] for rules that make no sense.
    pub fn load_from_yaml(yaml: &str) -> Result<Grammar> {
        let file: GrammarFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::invalid_format(format!("YAML parse error: {e}")))?;
        convert_grammar_file(file)
    }

    /// Load a grammar from JSON text
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] for malformed JSON and
    /// [`Error::Validation`] for rules that make no sense.
    pub fn load_from_json(json: &str) -> Result<Grammar> {
        let file: GrammarFile = serde_json::from_str(json)
            .map_err(|e| Error::invalid_format(format!("JSON parse error: {e}")))?;
        convert_grammar_file(file)
    }

    fn find_file(&self, name: &str) -> Option<PathBuf> {
        let candidates = [
            format!("{name}.yaml"),
            format!("{name}.yml"),
            format!("{name}.json"),
        ];
        self.search_paths
            .iter()
            .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
            .find(|path| path.is_file())
    }

    /// Walk `parent` links up from `leaf`; returns base first
    fn resolve_inheritance_chain(&self, leaf: Grammar) -> Result<Vec<Grammar>> {
        let mut graph = InheritanceGraph::new();
        let mut chain = vec![leaf];

        while let Some(parent_name) = chain.last().and_then(|g| g.parent.clone()) {
            let child_name = chain.last().map(|g| g.name.clone()).unwrap_or_default();
            if graph.would_create_cycle(&child_name, &parent_name) {
                return Err(Error::inheritance(format!(
                    "circular dependency: {child_name} -> {parent_name}"
                )));
            }
            graph.add_edge(&child_name, &parent_name);

            let parent = match self.load_unresolved(&parent_name) {
                Ok(grammar) => grammar,
                Err(Error::NotFound { .. }) => {
                    return Err(Error::inheritance(format!(
                        "parent grammar not found: {parent_name} (referenced by {child_name})"
                    )));
                }
                Err(e) => return Err(e),
            };
            chain.push(parent);
        }

        chain.reverse();
        trace!(
            chain = ?chain.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            "resolved inheritance chain"
        );
        Ok(chain)
    }
}

impl Default for GrammarLoader {
    /// A loader with no search paths, so only built-ins resolve
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn convert_grammar_file(file: GrammarFile) -> Result<Grammar> {
    let segments = file
        .segments
        .into_iter()
        .map(convert_segment)
        .collect::<Result<Vec<_>>>()?;
    let loops = file
        .loops
        .into_iter()
        .map(convert_loop)
        .collect::<Result<Vec<_>>>()?;

    let mut grammar = Grammar::new(file.name, file.version)
        .with_segments(segments)
        .with_loops(loops);
    grammar.parent = file.parent;
    grammar.direction = file.direction;
    grammar.transaction_sets = file.transaction_sets;
    grammar.strict_segments = file.strict_segments;
    grammar.check_control_numbers = file.check_control_numbers;
    Ok(grammar)
}

fn convert_segment(file: SegmentFile) -> Result<SegmentRule> {
    check_tag(&file.tag)?;
    if let Some(max) = file.max_elements {
        if max < file.min_elements {
            return Err(Error::validation(format!(
                "segment {}: max_elements {max} is below min_elements {}",
                file.tag, file.min_elements
            )));
        }
    }

    let groups = file
        .groups
        .into_iter()
        .map(|g| {
            let arity = xedi_ir::GroupArity::from_size(g.arity).ok_or_else(|| {
                Error::validation(format!(
                    "segment {}: group arity must be 2 or 3, got {}",
                    file.tag, g.arity
                ))
            })?;
            if g.start == 0 {
                return Err(Error::validation(format!(
                    "segment {}: group ordinals start at 1",
                    file.tag
                )));
            }
            let mut rule = GroupRule::new(g.start, arity);
            rule.max_repeats = g.max_repeats;
            Ok(rule)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SegmentRule {
        tag: file.tag,
        min_elements: file.min_elements,
        max_elements: file.max_elements,
        groups,
    })
}

fn convert_loop(file: LoopFile) -> Result<LoopRule> {
    let trigger = file.trigger.unwrap_or_else(|| file.id.clone());
    check_tag(&trigger)?;
    for member in &file.members {
        check_tag(member)?;
    }
    let loops = file
        .loops
        .into_iter()
        .map(convert_loop)
        .collect::<Result<Vec<_>>>()?;
    Ok(LoopRule {
        id: file.id,
        trigger,
        members: file.members,
        loops,
    })
}

fn check_tag(tag: &str) -> Result<()> {
    if is_segment_tag(tag) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid segment tag '{tag}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xedi_ir::GroupArity;

    #[test]
    fn test_load_from_yaml() {
        let yaml = r"
name: TEST
version: '004010'
segments:
  - tag: PO1
    min_elements: 1
    groups:
      - start: 6
        arity: 2
loops:
  - id: N1
    members: [N2, N3, N4]
";
        let grammar = GrammarLoader::load_from_yaml(yaml).unwrap();
        assert_eq!(grammar.name, "TEST");
        assert_eq!(grammar.version, "004010");
        let po1 = grammar.segment("PO1").unwrap();
        assert_eq!(po1.groups[0].arity, GroupArity::Pair);
        assert_eq!(grammar.loops[0].trigger, "N1");
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"name": "TEST", "parent": "baseline", "segments": [{"tag": "BEG", "min_elements": 4}]}"#;
        let grammar = GrammarLoader::load_from_json(json).unwrap();
        assert_eq!(grammar.parent.as_deref(), Some("baseline"));
        assert_eq!(grammar.segment("BEG").unwrap().min_elements, 4);
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let result = GrammarLoader::load_from_yaml("name: TEST\nsegments: [");
        assert!(matches!(result, Err(Error::InvalidFormat { .. })));
    }

    #[test]
    fn test_rejects_bad_arity() {
        let yaml = "name: T\nsegments:\n  - tag: PO1\n    groups:\n      - start: 6\n        arity: 4\n";
        assert!(matches!(
            GrammarLoader::load_from_yaml(yaml),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_tag() {
        let yaml = "name: T\nsegments:\n  - tag: po1\n";
        assert!(matches!(
            GrammarLoader::load_from_yaml(yaml),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let yaml = "name: T\nsegments:\n  - tag: BEG\n    min_elements: 5\n    max_elements: 2\n";
        assert!(GrammarLoader::load_from_yaml(yaml).is_err());
    }

    #[test]
    fn test_builtins_parse() {
        for name in builtin_names() {
            let grammar = GrammarLoader::default().load_unresolved(name).unwrap();
            assert_eq!(grammar.name, name);
        }
    }

    #[test]
    fn test_load_resolves_chain() {
        let loader = GrammarLoader::default();
        let grammar = loader.load("x12-004010-request").unwrap();
        assert_eq!(
            grammar.inheritance_chain,
            vec!["baseline", "x12-003070", "x12-004010", "x12-004010-request"]
        );
        assert_eq!(grammar.direction, Some(Direction::Request));
        assert!(grammar.accepts_transaction_set("850"));
        assert!(loader.cache().contains("x12-004010-request"));
    }

    #[test]
    fn test_load_not_found() {
        let loader = GrammarLoader::default();
        assert!(matches!(loader.load("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_segment_tag_shape() {
        assert!(is_segment_tag("ST"));
        assert!(is_segment_tag("PO1"));
        assert!(!is_segment_tag("S"));
        assert!(!is_segment_tag("1ST"));
        assert!(!is_segment_tag("ABCD"));
    }
}
