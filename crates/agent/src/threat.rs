use models::{ThreatAssessment, ThreatLevel};

/// ThreatScorer assesses free text for signs that its author is in danger.
/// Implementations can be swapped without affecting notification dispatch,
/// which only ever sees the resulting threat level.
#[async_trait::async_trait]
pub trait ThreatScorer: std::fmt::Debug + Send + Sync {
    async fn score(&self, text: &str) -> anyhow::Result<ThreatAssessment>;
}

const THREAT_KEYWORDS: &[&str] = &[
    "knife",
    "gun",
    "weapon",
    "attack",
    "follow",
    "stalking",
    "threatened",
];

const DISTRESS_KEYWORDS: &[&str] = &["help", "emergency", "scared", "afraid", "please", "urgent"];

/// A simple keyword matcher, which stands in for a real classifier.
///
/// Two or more threat keywords make a `high` threat. A single threat keyword,
/// or two or more distress keywords, make a `medium` threat.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordScorer;

impl KeywordScorer {
    pub fn assess(&self, text: &str) -> ThreatAssessment {
        let text = text.to_lowercase();
        let matches = |keywords: &[&str]| -> Vec<String> {
            keywords
                .iter()
                .filter(|word| text.contains(*word))
                .map(|word| capitalize(word))
                .collect()
        };

        let indicators = matches(THREAT_KEYWORDS);
        let distress_signals = matches(DISTRESS_KEYWORDS);

        let threat_level = if indicators.len() >= 2 {
            ThreatLevel::High
        } else if indicators.len() == 1 || distress_signals.len() >= 2 {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        };

        ThreatAssessment {
            threat_level,
            indicators,
            distress_signals,
        }
    }
}

#[async_trait::async_trait]
impl ThreatScorer for KeywordScorer {
    async fn score(&self, text: &str) -> anyhow::Result<ThreatAssessment> {
        Ok(self.assess(text))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
