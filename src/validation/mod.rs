//! Quality gate for drafts: a deterministic five-axis scorer merged with an
//! optional external machine-origin detector.

mod detector;
mod pipeline;
mod report;
mod scorer;

pub use detector::{Detector, DetectorError, DetectorScore, HttpDetector};
pub use pipeline::{ValidationError, ValidationPipeline};
pub use report::{
    Axis, AxisScore, Decision, DetectorVerdict, Issue, Severity, ValidationReport,
    normalize_issue, normalize_issues,
};
pub use scorer::{RuleScorer, Scorecard};
