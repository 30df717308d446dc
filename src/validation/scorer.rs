use regex::Regex;

use super::report::{Axis, AxisScore, Issue, Severity};
use crate::agent::{Platform, PlatformProfile, UnitKind};
use crate::config::{AxisWeights, ValidationConfig};

const STOCK_PHRASES: &[&str] = &[
    "game-changer",
    "game changer",
    "fast-paced world",
    "unlock your",
    "leverage",
    "delve",
    "let that sink in",
    "buckle up",
    "here's the thing",
    "at the end of the day",
    "synergy",
    "thought leader",
    "in conclusion",
];

const MAX_AXIS: f64 = 5.0;
const MAX_TOTAL: f64 = 25.0;

/// Output of one deterministic scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub axes: Vec<AxisScore>,
    pub total: u32,
    pub penalty: f64,
    pub issues: Vec<Issue>,
}

/// Five-axis rubric scorer. Pure and deterministic: the same text and
/// platform always produce the same scorecard.
#[derive(Debug, Clone)]
pub struct RuleScorer {
    weights: AxisWeights,
    penalty_min: f64,
    penalty_max: f64,
    hedging: Regex,
    hashtag: Regex,
    number: Regex,
    proper_noun: Regex,
}

impl RuleScorer {
    pub fn new(config: &ValidationConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            weights: config.weights.clone(),
            penalty_min: config.penalty_min,
            penalty_max: config.penalty_max.max(config.penalty_min),
            hedging: Regex::new(
                r"(?i)^\s*(in today[’']s|in a world|have you ever|it[’']s no secret|let[’']s face it|i think|i believe)",
            )?,
            hashtag: Regex::new(r"#[\p{L}\p{N}_]+")?,
            number: Regex::new(r"\d+")?,
            proper_noun: Regex::new(r"[a-z,;:] ([A-Z][a-z]+)")?,
        })
    }

    pub fn score(&self, text: &str, platform: Platform) -> Scorecard {
        let profile = platform.profile();
        let text = text.trim();
        let lower = text.to_lowercase();
        let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let mut issues = Vec::new();

        let stock: Vec<&str> = STOCK_PHRASES
            .iter()
            .copied()
            .filter(|p| lower.contains(p))
            .collect();
        for phrase in &stock {
            issues.push(Issue::new(
                Severity::Medium,
                "stock_phrase",
                *phrase,
                "Replace with a concrete claim",
            ));
        }

        let hedged = self.hedging.is_match(first_line);
        if hedged {
            issues.push(Issue::new(
                Severity::High,
                "hedging_opener",
                snippet(first_line, 60),
                "Open with the claim or the number",
            ));
        }

        let exclaims = text.contains("!!") || text.matches('!').count() > 3;
        if exclaims {
            issues.push(Issue::new(
                Severity::Low,
                "excessive_exclamation",
                format!("{} exclamation marks", text.matches('!').count()),
                "Keep at most one exclamation mark",
            ));
        }

        let dashes = text.matches('—').count();
        if dashes > 2 {
            issues.push(Issue::new(
                Severity::Low,
                "em_dash_overuse",
                format!("{dashes} em dashes"),
                "Use commas or full stops instead",
            ));
        }

        let hashtags = self.hashtag.find_iter(text).count();
        let stuffed = hashtags > profile.max_hashtags;
        if stuffed {
            issues.push(Issue::new(
                Severity::Medium,
                "hashtag_stuffing",
                format!("{hashtags} hashtags"),
                format!("Keep at most {}", profile.max_hashtags),
            ));
        }

        let units = profile.split_units(text);
        let mut over_units = 0;
        for unit in &units {
            if unit.chars().count() > profile.unit_char_limit {
                over_units += 1;
                issues.push(Issue::new(
                    Severity::High,
                    "over_length_unit",
                    snippet(unit, 40),
                    format!("Cut to {} characters", profile.unit_char_limit),
                ));
            }
        }

        let over_total =
            profile.unit == UnitKind::Thread && text.chars().count() > profile.total_char_limit;
        if over_total {
            issues.push(Issue::new(
                Severity::High,
                "over_length_total",
                format!("{} characters", text.chars().count()),
                format!("Cut to {} characters", profile.total_char_limit),
            ));
        }

        let hook = self.hook(first_line, hedged);
        let specificity = self.specificity(text);
        let voice = MAX_AXIS
            - stock.len() as f64
            - if hedged { 1.0 } else { 0.0 }
            - if exclaims { 0.5 } else { 0.0 }
            - if dashes > 2 { 0.5 } else { 0.0 };
        let structure = structure(text, &profile);
        let platform_fit = MAX_AXIS
            - 2.0 * over_units.min(2) as f64
            - if over_total { 2.0 } else { 0.0 }
            - if stuffed { 1.0 } else { 0.0 }
            - if platform == Platform::Newsletter && !text.starts_with("Subject:") {
                1.0
            } else {
                0.0
            };

        let axes = vec![
            weighted(Axis::Hook, hook, self.weights.hook),
            weighted(Axis::Specificity, specificity, self.weights.specificity),
            weighted(Axis::Voice, voice, self.weights.voice),
            weighted(Axis::Structure, structure, self.weights.structure),
            weighted(Axis::PlatformFit, platform_fit, self.weights.platform_fit),
        ];

        let penalty = issues
            .iter()
            .map(|i| i.severity.penalty())
            .sum::<f64>()
            .clamp(self.penalty_min, self.penalty_max);
        let sum: f64 = axes.iter().map(|a| a.score).sum();
        let total = (sum - penalty).clamp(0.0, MAX_TOTAL).round() as u32;

        Scorecard {
            axes,
            total,
            penalty,
            issues,
        }
    }

    fn hook(&self, first_line: &str, hedged: bool) -> f64 {
        if first_line.trim().is_empty() {
            return 0.0;
        }
        let mut score = 3.0;
        if first_line.chars().count() <= 120 {
            score += 1.0;
        }
        if first_line.contains('?') || first_line.chars().any(|c| c.is_ascii_digit()) {
            score += 1.0;
        }
        if hedged {
            score -= 2.0;
        }
        score
    }

    fn specificity(&self, text: &str) -> f64 {
        let numbers = self.number.find_iter(text).count().min(2);
        let names = self.proper_noun.captures_iter(text).count().min(2);
        1.0 + numbers as f64 + names as f64
    }
}

fn structure(text: &str, profile: &PlatformProfile) -> f64 {
    let mut score = MAX_AXIS;
    if text.split("\n\n").any(|p| p.chars().count() > 600) {
        score -= 2.0;
    }
    if profile.unit != UnitKind::Thread && !text.contains("\n\n") && text.chars().count() > 400 {
        score -= 1.0;
    }
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if !sentences.is_empty() {
        let words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
        if words as f64 / sentences.len() as f64 > 28.0 {
            score -= 1.0;
        }
    }
    score
}

fn weighted(axis: Axis, raw: f64, weight: f64) -> AxisScore {
    AxisScore {
        axis,
        score: (raw.clamp(0.0, MAX_AXIS) * weight).clamp(0.0, MAX_AXIS),
    }
}

fn snippet(s: &str, max_chars: usize) -> String {
    s.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_POST: &str = "Last quarter we cut deploy time from 40 minutes to 6.\n\n\
        The fix was boring: we moved the Docker cache to a shared volume and stopped \
        rebuilding Rust dependencies on every push.\n\n\
        What is the slowest step in your pipeline?";

    const BAD_POST: &str = "In today's fast-paced world, AI is a game-changer!! Let that sink in. \
        #ai #ml #tech #future #growth #leadership";

    fn scorer() -> RuleScorer {
        RuleScorer::new(&ValidationConfig::default()).unwrap()
    }

    fn patterns(card: &Scorecard) -> Vec<&str> {
        card.issues.iter().map(|i| i.pattern.as_str()).collect()
    }

    #[test]
    fn clean_post_scores_full_marks() {
        let card = scorer().score(CLEAN_POST, Platform::LinkedIn);
        assert!(card.issues.is_empty(), "{:?}", card.issues);
        assert_eq!(card.penalty, 0.0);
        assert_eq!(card.total, 25);
        assert_eq!(card.axes.len(), 5);
    }

    #[test]
    fn low_quality_patterns_are_flagged_and_penalty_clamped() {
        let card = scorer().score(BAD_POST, Platform::LinkedIn);
        let found = patterns(&card);
        assert!(found.contains(&"hedging_opener"));
        assert!(found.contains(&"stock_phrase"));
        assert!(found.contains(&"hashtag_stuffing"));
        assert!(found.contains(&"excessive_exclamation"));
        assert_eq!(card.penalty, 5.0);
        assert!(card.total < 18, "total {}", card.total);
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = scorer();
        assert_eq!(
            s.score(BAD_POST, Platform::Threads),
            s.score(BAD_POST, Platform::Threads)
        );
    }

    #[test]
    fn over_length_tweet_is_flagged() {
        let long_tweet = "word ".repeat(60);
        let text = format!("1/ Short hook about 3 things?\n\n{long_tweet}");
        let card = scorer().score(&text, Platform::Twitter);
        assert!(patterns(&card).contains(&"over_length_unit"));
        let fit = card
            .axes
            .iter()
            .find(|a| a.axis == Axis::PlatformFit)
            .unwrap();
        assert!(fit.score <= 3.0);
    }

    #[test]
    fn zero_weight_removes_an_axis() {
        let mut config = ValidationConfig::default();
        config.weights.hook = 0.0;
        let card = RuleScorer::new(&config)
            .unwrap()
            .score(CLEAN_POST, Platform::LinkedIn);
        assert_eq!(card.total, 20);
    }

    #[test]
    fn penalty_range_is_configurable() {
        let mut config = ValidationConfig::default();
        config.penalty_max = 2.0;
        let card = RuleScorer::new(&config)
            .unwrap()
            .score(BAD_POST, Platform::LinkedIn);
        assert_eq!(card.penalty, 2.0);
    }

    #[test]
    fn empty_text_scores_low_without_panicking() {
        let card = scorer().score("   ", Platform::Instagram);
        assert!(card.total <= 20);
        let hook = card.axes.iter().find(|a| a.axis == Axis::Hook).unwrap();
        assert_eq!(hook.score, 0.0);
    }

    #[test]
    fn newsletter_wants_a_subject_line() {
        let with = scorer().score("Subject: Q3 in 5 numbers\n\nRevenue grew 12%.", Platform::Newsletter);
        let without = scorer().score("Q3 in 5 numbers\n\nRevenue grew 12%.", Platform::Newsletter);
        let fit = |c: &Scorecard| {
            c.axes
                .iter()
                .find(|a| a.axis == Axis::PlatformFit)
                .map(|a| a.score)
                .unwrap()
        };
        assert_eq!(fit(&with), 5.0);
        assert_eq!(fit(&without), 4.0);
    }
}
