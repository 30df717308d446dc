use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How much an issue costs the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn penalty(self) -> f64 {
        match self {
            Severity::High => 2.0,
            Severity::Medium => 1.0,
            Severity::Low => 0.5,
        }
    }

    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" | "major" => Severity::High,
            "low" | "minor" | "info" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

/// One problem found in a draft, in the single shape `apply_fixes` consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub pattern: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub suggested_fix: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        pattern: impl Into<String>,
        original: impl Into<String>,
        suggested_fix: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            pattern: pattern.into(),
            original: original.into(),
            suggested_fix: suggested_fix.into(),
        }
    }

    /// One-line rendering used in fix prompts.
    pub fn describe(&self) -> String {
        let mut line = format!("[{:?}] {}", self.severity, self.pattern);
        if !self.original.is_empty() {
            line.push_str(&format!(": \"{}\"", self.original));
        }
        if !self.suggested_fix.is_empty() {
            line.push_str(&format!(" -> {}", self.suggested_fix));
        }
        line
    }
}

/// Normalize a free-text or structured issue into an [`Issue`].
///
/// Accepts a bare string (`"Remove the stock opener"`) or an object with any
/// of `severity`, `pattern`/`type`/`issue`, `original`/`text`/`quote`,
/// `suggested_fix`/`fix`/`suggestion`. Anything else yields `None`.
pub fn normalize_issue(value: &Value) -> Option<Issue> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(Issue::new(Severity::Medium, "freeform", "", s))
            }
        }
        Value::Object(map) => {
            let field = |keys: &[&str]| {
                keys.iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string()
            };
            let pattern = field(&["pattern", "type", "issue", "category"]);
            let original = field(&["original", "text", "quote", "passage"]);
            let suggested_fix = field(&["suggested_fix", "fix", "suggestion"]);
            if pattern.is_empty() && original.is_empty() && suggested_fix.is_empty() {
                return None;
            }
            let severity = Severity::parse(&field(&["severity", "level"]));
            Some(Issue {
                severity,
                pattern: if pattern.is_empty() {
                    "freeform".to_string()
                } else {
                    pattern
                },
                original,
                suggested_fix,
            })
        }
        _ => None,
    }
}

/// Normalize a JSON array of issues, dropping entries that carry nothing.
pub fn normalize_issues(value: &Value) -> Vec<Issue> {
    match value {
        Value::Array(items) => items.iter().filter_map(normalize_issue).collect(),
        other => normalize_issue(other).into_iter().collect(),
    }
}

/// The five rubric axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Hook,
    Specificity,
    Voice,
    Structure,
    PlatformFit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisScore {
    pub axis: Axis,
    /// Weighted score, 0 to 5.
    pub score: f64,
}

/// Result of the external detector as seen by the decision rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorVerdict {
    Scored {
        percentage: f64,
        flagged_passages: Vec<String>,
    },
    Unavailable {
        reason: String,
    },
    NotConfigured,
}

impl DetectorVerdict {
    pub fn percentage(&self) -> Option<f64> {
        match self {
            DetectorVerdict::Scored { percentage, .. } => Some(*percentage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pass,
    Revise,
}

/// Merged output of the scorer and the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub axes: Vec<AxisScore>,
    /// Total out of 25, after penalties.
    pub total: u32,
    pub penalty: f64,
    pub issues: Vec<Issue>,
    pub detector: DetectorVerdict,
    pub decision: Decision,
}
