use serde::{Deserialize, Serialize};

/// Telegram chat id of the recipient.
pub type SubscriberId = i64;

/// Region value meaning "match any region".
pub const ANY_REGION: &str = "любой";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    #[default]
    AwaitingKeywords,
    AwaitingRegion,
    AwaitingPrice,
    Complete,
}

impl OnboardingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingState::AwaitingKeywords => "awaiting_keywords",
            OnboardingState::AwaitingRegion => "awaiting_region",
            OnboardingState::AwaitingPrice => "awaiting_price",
            OnboardingState::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_keywords" => Some(OnboardingState::AwaitingKeywords),
            "awaiting_region" => Some(OnboardingState::AwaitingRegion),
            "awaiting_price" => Some(OnboardingState::AwaitingPrice),
            "complete" => Some(OnboardingState::Complete),
            _ => None,
        }
    }
}

/// A subscriber's standing interest. One per subscriber; a new submission
/// replaces the old one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubscriberFilter {
    pub subscriber_id: SubscriberId,
    /// Case-insensitive substrings of the tender title. Empty means the
    /// subscriber has not configured a filter yet.
    pub keywords: Vec<String>,
    pub region: Option<String>,
    pub max_price: Option<f64>,
    #[serde(default)]
    pub onboarding: OnboardingState,
}

impl SubscriberFilter {
    pub fn new(subscriber_id: SubscriberId, keywords: Vec<String>) -> Self {
        Self {
            subscriber_id,
            keywords: normalize_keywords(keywords),
            region: None,
            max_price: None,
            onboarding: OnboardingState::Complete,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        let trimmed = region.trim();
        self.region = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_max_price(mut self, max_price: f64) -> Self {
        self.max_price = (max_price.is_finite() && max_price >= 0.0).then_some(max_price);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.keywords.is_empty()
    }

    /// True when the region is absent or the "any region" sentinel.
    pub fn matches_any_region(&self) -> bool {
        match &self.region {
            None => true,
            Some(r) => {
                let r = r.trim().to_lowercase();
                r.is_empty() || r == ANY_REGION || r == "any"
            }
        }
    }
}

/// Trim, drop empties and case-insensitive duplicates while keeping order.
pub fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    let mut out = Vec::new();
    for kw in keywords {
        let kw = kw.trim().to_string();
        if kw.is_empty() {
            continue;
        }
        let folded = kw.to_lowercase();
        if !seen.contains(&folded) {
            seen.push(folded);
            out.push(kw);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_trimmed_and_deduplicated() {
        let f = SubscriberFilter::new(
            1,
            vec![" ноутбук ".into(), "".into(), "НОУТБУК".into(), "принтер".into()],
        );
        assert_eq!(f.keywords, vec!["ноутбук", "принтер"]);
    }

    #[test]
    fn empty_keywords_are_inactive() {
        assert!(!SubscriberFilter::new(1, vec![]).is_active());
        assert!(!SubscriberFilter::new(1, vec!["  ".into()]).is_active());
    }

    #[test]
    fn any_region_sentinel() {
        let f = SubscriberFilter::new(1, vec!["x".into()]);
        assert!(f.matches_any_region());
        assert!(f.clone().with_region("Любой").matches_any_region());
        assert!(f.clone().with_region("  ").matches_any_region());
        assert!(!f.with_region("Москва").matches_any_region());
    }

    #[test]
    fn negative_ceiling_is_ignored() {
        let f = SubscriberFilter::new(1, vec!["x".into()]).with_max_price(-5.0);
        assert_eq!(f.max_price, None);
    }

    #[test]
    fn onboarding_state_round_trips_through_column_text() {
        for state in [
            OnboardingState::AwaitingKeywords,
            OnboardingState::AwaitingRegion,
            OnboardingState::AwaitingPrice,
            OnboardingState::Complete,
        ] {
            assert_eq!(OnboardingState::parse(state.as_str()), Some(state));
        }
        assert_eq!(OnboardingState::parse("bogus"), None);
    }
}
