//! Processing rules and the rule document.
//!
//! A [`ProcessingRule`] pairs a set of [`Condition`]s with a [`RuleAction`].
//! Rules live in a [`RuleSet`], kept sorted ascending by priority; equal
//! priorities keep insertion order.
//!
//! # Rule Document Format
//!
//! Rules are stored as a JSON array:
//!
//! ```json
//! [
//!   {
//!     "id": "large_video_isolation",
//!     "name": "Large video isolation",
//!     "description": "Move videos of 100 MB or more to their own folder",
//!     "condition": { "media_type": "video", "min_size_mb": 100 },
//!     "action": { "operation": "move", "target_dir": "large_videos" },
//!     "enabled": true,
//!     "priority": 1
//!   }
//! ]
//! ```
//!
//! Condition keys are all optional: `media_type`, `extensions`,
//! `min_size_mb`, `max_size_mb`, `older_than_days`, `newer_than_days`.
//! Destination templates may use `{extension}`, `{media_type}`, `{year}`
//! and `{month}`.

use crate::error::{DatafluxError, Result};
use crate::media_category::MediaCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Bytes per megabyte for size conditions (binary).
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What happens to a matched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Move,
    Copy,
    Link,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Move => "move",
            OperationKind::Copy => "copy",
            OperationKind::Link => "link",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate over a file.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Classification equals this category.
    MediaType(MediaCategory),
    /// Dotted, lower-cased extension is one of these.
    Extensions(Vec<String>),
    /// Size in MB is at least this.
    MinSizeMb(f64),
    /// Size in MB is at most this.
    MaxSizeMb(f64),
    /// Last modified at least this many whole days ago.
    OlderThanDays(i64),
    /// Last modified at most this many whole days ago.
    NewerThanDays(i64),
}

/// Facts about one file that conditions are checked against.
///
/// `age_days` is `None` when the modification time could not be read.
pub struct FileFacts<'a> {
    pub media_type: MediaCategory,
    pub extension: &'a str,
    pub size: u64,
    pub age_days: Option<i64>,
}

impl Condition {
    /// Evaluates this condition. Age conditions fail closed when the age is unknown.
    pub fn matches(&self, facts: &FileFacts<'_>) -> bool {
        let size_mb = facts.size as f64 / BYTES_PER_MB;
        match self {
            Condition::MediaType(category) => facts.media_type == *category,
            Condition::Extensions(allowed) => allowed.iter().any(|ext| ext == facts.extension),
            Condition::MinSizeMb(min) => size_mb >= *min,
            Condition::MaxSizeMb(max) => size_mb <= *max,
            Condition::OlderThanDays(days) => facts.age_days.is_some_and(|age| age >= *days),
            Condition::NewerThanDays(days) => facts.age_days.is_some_and(|age| age <= *days),
        }
    }
}

/// The document shape of a rule condition: one optional key per predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_than_days: Option<i64>,
}

impl ConditionSpec {
    /// The present keys as conditions, ANDed by the caller.
    pub fn conditions(&self) -> Vec<Condition> {
        let mut conditions = Vec::new();
        if let Some(category) = self.media_type {
            conditions.push(Condition::MediaType(category));
        }
        if let Some(extensions) = &self.extensions {
            conditions.push(Condition::Extensions(
                extensions.iter().map(|e| e.to_lowercase()).collect(),
            ));
        }
        if let Some(min) = self.min_size_mb {
            conditions.push(Condition::MinSizeMb(min));
        }
        if let Some(max) = self.max_size_mb {
            conditions.push(Condition::MaxSizeMb(max));
        }
        if let Some(days) = self.older_than_days {
            conditions.push(Condition::OlderThanDays(days));
        }
        if let Some(days) = self.newer_than_days {
            conditions.push(Condition::NewerThanDays(days));
        }
        conditions
    }
}

/// Operation plus destination template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleAction {
    pub operation: OperationKind,
    /// Relative directory under the base target, may contain placeholders.
    pub target_dir: String,
}

/// A rule as stored in the rule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub condition: ConditionSpec,
    pub action: RuleAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

impl ProcessingRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        condition: ConditionSpec,
        action: RuleAction,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            condition,
            action,
            enabled: true,
            priority,
        }
    }

    /// True when every present condition holds.
    pub fn matches(&self, facts: &FileFacts<'_>) -> bool {
        self.condition.conditions().iter().all(|c| c.matches(facts))
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DatafluxError::Validation(
                "rule id must not be empty".to_string(),
            ));
        }
        if self.action.target_dir.trim().is_empty() {
            return Err(DatafluxError::Validation(format!(
                "rule '{}' has an empty target_dir",
                self.id
            )));
        }
        Ok(())
    }
}

/// Ordered collection of rules, sorted ascending by priority.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<ProcessingRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RuleSet {
    /// An empty rule set.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The five built-in rules.
    pub fn with_defaults() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Builds a set from arbitrary rules, validating and sorting them.
    pub fn from_rules(rules: Vec<ProcessingRule>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(DatafluxError::Validation(format!(
                    "duplicate rule id '{}'",
                    rule.id
                )));
            }
        }

        let mut set = Self { rules };
        set.sort();
        Ok(set)
    }

    /// Adds a rule and re-sorts by priority. Ties keep insertion order.
    pub fn add(&mut self, rule: ProcessingRule) -> Result<()> {
        rule.validate()?;
        if self.get(&rule.id).is_some() {
            return Err(DatafluxError::Validation(format!(
                "duplicate rule id '{}'",
                rule.id
            )));
        }
        self.rules.push(rule);
        self.sort();
        Ok(())
    }

    /// Removes the rule with `id`. Returns whether one was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.rules.iter().position(|r| r.id == id) {
            Some(index) => {
                self.rules.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ProcessingRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessingRule> {
        self.rules.iter()
    }

    /// Enabled rules in priority order.
    pub fn enabled(&self) -> impl Iterator<Item = &ProcessingRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn sort(&mut self) {
        // Vec::sort_by_key is stable
        self.rules.sort_by_key(|r| r.priority);
    }

    /// Serializes the rules as a pretty JSON document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.rules)
            .map_err(|e| DatafluxError::Validation(format!("cannot serialize rules: {}", e)))
    }

    /// Parses and validates a JSON rule document.
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Vec<ProcessingRule> =
            serde_json::from_str(json).map_err(|e| DatafluxError::Validation(e.to_string()))?;
        Self::from_rules(rules)
    }

    /// Writes the rules to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| DatafluxError::RuleDocument {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads rules from `path`, replacing any defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| DatafluxError::RuleDocument {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Like [`RuleSet::load`], but a missing document yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::with_defaults())
        }
    }
}

fn default_rules() -> Vec<ProcessingRule> {
    vec![
        ProcessingRule::new(
            "large_video_isolation",
            "Large video isolation",
            "Move videos of 100 MB or more to their own folder",
            ConditionSpec {
                media_type: Some(MediaCategory::Video),
                min_size_mb: Some(100.0),
                ..Default::default()
            },
            RuleAction {
                operation: OperationKind::Move,
                target_dir: "large_videos".to_string(),
            },
            1,
        ),
        ProcessingRule::new(
            "raw_audio_separation",
            "Raw audio separation",
            "Copy uncompressed WAV/AIFF audio aside",
            ConditionSpec {
                extensions: Some(vec![
                    ".wav".to_string(),
                    ".aiff".to_string(),
                    ".aif".to_string(),
                ]),
                ..Default::default()
            },
            RuleAction {
                operation: OperationKind::Copy,
                target_dir: "raw_audio".to_string(),
            },
            2,
        ),
        ProcessingRule::new(
            "small_image_collection",
            "Small image collection",
            "Collect images under 5 MB",
            ConditionSpec {
                media_type: Some(MediaCategory::Image),
                max_size_mb: Some(5.0),
                ..Default::default()
            },
            RuleAction {
                operation: OperationKind::Copy,
                target_dir: "small_images".to_string(),
            },
            3,
        ),
        ProcessingRule::new(
            "document_organization",
            "Document organization",
            "Sort documents into one folder per extension",
            ConditionSpec {
                media_type: Some(MediaCategory::Document),
                ..Default::default()
            },
            RuleAction {
                operation: OperationKind::Move,
                target_dir: "documents/{extension}".to_string(),
            },
            4,
        ),
        ProcessingRule::new(
            "old_file_archiving",
            "Stale file archiving",
            "Archive files untouched for a year, by year",
            ConditionSpec {
                older_than_days: Some(365),
                ..Default::default()
            },
            RuleAction {
                operation: OperationKind::Move,
                target_dir: "archive/{year}".to_string(),
            },
            5,
        ),
    ]
}
