// Domain rules: which folder a bookmark from a given host belongs in.
//
// A pattern is either an exact hostname (`news.example.com`) or a
// leading-dot wildcard (`.example.com`) that matches the domain itself and
// every subdomain below it. Lookups prefer an exact rule, then the longest
// wildcard suffix.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::FolderId;
use crate::storage;

/// Mapping from pattern to folder, ordered by pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: BTreeMap<String, FolderId>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a rule. Returns the folder previously bound to the pattern.
    pub fn insert(&mut self, pattern: &str, folder: FolderId) -> Result<Option<FolderId>> {
        let pattern = normalize_pattern(pattern)?;
        Ok(self.rules.insert(pattern, folder))
    }

    pub fn get(&self, pattern: &str) -> Option<FolderId> {
        self.rules.get(pattern).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Folder suggested for `domain`, if any rule applies.
    ///
    /// An exact rule wins outright. Otherwise the domain's suffixes are tried
    /// as wildcards from most to least specific: for `blog.example.com` that
    /// is `.blog.example.com`, `.example.com`, then `.com`.
    pub fn suggest(&self, domain: &str) -> Option<FolderId> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return None;
        }
        if let Some(folder) = self.rules.get(&domain) {
            return Some(*folder);
        }

        let mut rest = domain.as_str();
        loop {
            if let Some(folder) = self.rules.get(&format!(".{rest}")) {
                return Some(*folder);
            }
            match rest.find('.') {
                Some(dot) => rest = &rest[dot + 1..],
                None => return None,
            }
        }
    }
}

/// Patterns a user may bind `domain` to, most specific first: the exact
/// host, then each wildcard suffix that still has at least two labels
/// (or the host itself when it has only one).
pub fn candidate_patterns(domain: &str) -> Vec<String> {
    let domain = normalize_domain(domain);
    if domain.is_empty() {
        return Vec::new();
    }

    let mut out = vec![domain.clone(), format!(".{domain}")];
    let mut rest = domain.as_str();
    while let Some(dot) = rest.find('.') {
        rest = &rest[dot + 1..];
        if rest.contains('.') {
            out.push(format!(".{rest}"));
        }
    }
    out
}

/// Lowercases and trims a pattern, rejecting ones that can never match a
/// hostname.
pub fn normalize_pattern(raw: &str) -> Result<String> {
    let pattern = raw.trim().to_ascii_lowercase();
    let body = pattern.strip_prefix('.').unwrap_or(&pattern);
    let invalid = body.is_empty()
        || body.starts_with('.')
        || body.ends_with('.')
        || body.contains("..")
        || body.chars().any(|c| c.is_whitespace() || c == '/' || c == ':');
    if invalid {
        return Err(Error::InvalidRule(raw.to_string()));
    }
    Ok(pattern)
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Rule set backed by `rules.json`. Every change is written through
/// immediately.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    rules: RuleSet,
}

impl RuleStore {
    /// A store with no rules that will write to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rules: RuleSet::new(),
        }
    }

    /// Loads the rule file. A missing file is an empty rule set; a file
    /// that does not parse is `Error::CorruptRuleFile`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let Some(bytes) = storage::read_optional(&path)? else {
            debug!("no rule file at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        };

        let raw: BTreeMap<String, FolderId> =
            serde_json::from_slice(&bytes).map_err(|e| Error::CorruptRuleFile {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut rules = RuleSet::new();
        for (pattern, folder) in raw {
            if let Err(e) = rules.insert(&pattern, folder) {
                warn!("ignoring rule in {}: {e}", path.display());
            }
        }
        debug!("loaded {} rules from {}", rules.len(), path.display());
        Ok(Self { path, rules })
    }

    /// Like [`RuleStore::load`], but a corrupt file is moved aside to
    /// `rules.json.corrupt` and the run continues with no rules.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match Self::load(path.clone()) {
            Err(err @ Error::CorruptRuleFile { .. }) => {
                let backup = corrupt_backup_path(&path);
                match fs::rename(&path, &backup) {
                    Ok(()) => warn!(
                        "{err}; moved it to {} and starting with no rules",
                        backup.display()
                    ),
                    Err(e) => warn!(
                        "{err}; could not move it to {} ({e}), starting with no rules",
                        backup.display()
                    ),
                }
                Ok(Self::empty(path))
            }
            other => other,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn suggest(&self, domain: &str) -> Option<FolderId> {
        self.rules.suggest(domain)
    }

    /// Binds `pattern` to `folder` and persists. Returns the normalized
    /// pattern that was stored.
    pub fn save(&mut self, pattern: &str, folder: FolderId) -> Result<String> {
        let pattern = normalize_pattern(pattern)?;
        self.rules.insert(&pattern, folder)?;
        self.persist()?;
        debug!("saved rule {pattern} -> {folder}");
        Ok(pattern)
    }

    /// Records that bookmarks from `domain` were filed into `folder`.
    ///
    /// Always writes the exact-domain rule, replacing any earlier one.
    /// Wildcards are only ever created through [`RuleStore::save`].
    /// Returns whether the rule set changed.
    pub fn learn(&mut self, domain: &str, folder: FolderId) -> Result<bool> {
        let domain = normalize_domain(domain);
        let previous = self.rules.insert(&domain, folder)?;
        if previous == Some(folder) {
            return Ok(false);
        }
        self.persist()?;
        debug!("learned rule {domain} -> {folder}");
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        storage::write_json_private(&self.path, &self.rules)
    }
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}
