// ABOUTME: Word-level keyword classifier turning failure text into remediation steps.
// ABOUTME: Pure functions; every matching category contributes guidance.

use serde::Serialize;
use std::fmt;

use crate::types::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceCategory {
    Certificate,
    Cdn,
    Lock,
    Generic,
}

impl GuidanceCategory {
    const SPECIFIC: [GuidanceCategory; 3] = [
        GuidanceCategory::Certificate,
        GuidanceCategory::Cdn,
        GuidanceCategory::Lock,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            GuidanceCategory::Certificate => &["certificate", "ssl", "tls", "acm"],
            GuidanceCategory::Cdn => &["cloudfront", "distribution", "cdn"],
            GuidanceCategory::Lock => &["lock"],
            GuidanceCategory::Generic => &[],
        }
    }

    fn title(&self) -> &'static str {
        match self {
            GuidanceCategory::Certificate => "Certificate problem",
            GuidanceCategory::Cdn => "CloudFront distribution problem",
            GuidanceCategory::Lock => "Deployment lock problem",
            GuidanceCategory::Generic => "Deployment failed",
        }
    }

    fn steps(&self, stage: &Stage) -> Vec<String> {
        match self {
            GuidanceCategory::Certificate => vec![
                format!("Check that the ACM certificate for the {stage} domain is ISSUED in us-east-1"),
                format!("Confirm the certificate covers the {stage} domain (wildcards count)"),
                "DNS validation records must still exist for pending certificates".to_string(),
                format!("Redeploy with `stagehand deploy {stage}` once the certificate is issued"),
            ],
            GuidanceCategory::Cdn => vec![
                format!("The CloudFront distribution for {stage} may still be propagating; wait for status Deployed"),
                "Inspect it with `aws cloudfront list-distributions`".to_string(),
                format!("Check the alternate domain names on the {stage} distribution match the configured domain"),
                format!("Invalidate stale content for {stage} with `aws cloudfront create-invalidation --paths '/*'`"),
            ],
            GuidanceCategory::Lock => vec![
                format!("Inspect both lock layers with `stagehand status {stage}`"),
                format!("If no deployment to {stage} is running, clear them with `stagehand recover {stage}`"),
                "Otherwise wait for the running deployment or for the lock to expire".to_string(),
            ],
            GuidanceCategory::Generic => vec![
                format!("Review the output above for the failing {stage} phase and fix the cause"),
                format!("Clear the retained lock with `stagehand recover {stage}`"),
                format!("Retry with `stagehand deploy {stage}`"),
            ],
        }
    }
}

/// Remediation for one matched category.
#[derive(Debug, Clone, Serialize)]
pub struct Guidance {
    pub category: GuidanceCategory,
    pub title: String,
    pub steps: Vec<String>,
}

impl Guidance {
    fn new(category: GuidanceCategory, stage: &Stage) -> Self {
        let mut steps = category.steps(stage);
        if stage.is_production() {
            steps.push(format!(
                "{stage} serves live traffic; confirm user impact before retrying"
            ));
        }
        Self {
            category,
            title: format!("{} ({stage})", category.title()),
            steps,
        }
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Guidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        for step in &self.steps {
            write!(f, "\n  - {step}")?;
        }
        Ok(())
    }
}

/// Acronyms shorter than this must match a whole word; longer keywords
/// also match inflections such as "locked" or "certificates".
const MIN_PREFIX_KEYWORD: usize = 4;

fn keyword_matches(word: &str, keyword: &str) -> bool {
    if keyword.len() < MIN_PREFIX_KEYWORD {
        word == keyword
    } else {
        word.starts_with(keyword)
    }
}

/// Categories whose keywords start a word of the error, case-insensitively.
pub fn classify(error_message: &str) -> Vec<GuidanceCategory> {
    let message = error_message.to_lowercase();
    let words: Vec<&str> = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let matched: Vec<_> = GuidanceCategory::SPECIFIC
        .into_iter()
        .filter(|c| {
            c.keywords()
                .iter()
                .any(|k| words.iter().any(|w| keyword_matches(w, k)))
        })
        .collect();

    if matched.is_empty() {
        vec![GuidanceCategory::Generic]
    } else {
        matched
    }
}

/// Remediation for every category matched by `error_message`.
pub fn provide_rollback_guidance(stage: &Stage, error_message: &str) -> Vec<Guidance> {
    classify(error_message)
        .into_iter()
        .map(|category| Guidance::new(category, stage))
        .collect()
}
