// ---------------------------------------------------------------------------
// Derived article features
// ---------------------------------------------------------------------------
//
// Keyword-table classifiers assigned once per article at load time:
// category, sentiment, and reading time. Pure functions, no state.
// ---------------------------------------------------------------------------

use crate::types::{Category, Sentiment};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Category keyword lists in match priority order. A category matches when
/// any of its keywords occurs as a substring of the lower-cased keywords.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
	(Category::Technology, &["tech", "software", "ai", "digital"]),
	(Category::Business, &["business", "company", "market", "finance"]),
	(Category::Politics, &["politics", "government", "election"]),
	(Category::Health, &["health", "medical", "covid"]),
];

const POSITIVE_WORDS: &[&str] = &["good", "great", "success", "win"];
const NEGATIVE_WORDS: &[&str] = &["bad", "fail", "loss", "problem"];

const WORDS_PER_MINUTE: f64 = 200.0;

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// First category in declared order with a keyword hit; `General` otherwise.
pub fn extract_category(keywords: Option<&str>) -> Category {
	let Some(keywords) = keywords else {
		return Category::General;
	};
	let lower = keywords.to_lowercase();
	CATEGORY_KEYWORDS
		.iter()
		.find(|(_, words)| words.iter().any(|w| lower.contains(w)))
		.map(|(category, _)| *category)
		.unwrap_or(Category::General)
}

/// Counts how many words of each list occur in the text. Strictly more
/// hits wins; ties (0-0 included) are neutral.
pub fn analyze_sentiment(text: Option<&str>) -> Sentiment {
	let Some(text) = text else {
		return Sentiment::Neutral;
	};
	let lower = text.to_lowercase();
	let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
	let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

	match positive.cmp(&negative) {
		std::cmp::Ordering::Greater => Sentiment::Positive,
		std::cmp::Ordering::Less => Sentiment::Negative,
		std::cmp::Ordering::Equal => Sentiment::Neutral,
	}
}

/// `max(1, round(words / 200))` minutes. Halves round to even.
pub fn estimate_reading_time(text: Option<&str>) -> u32 {
	let Some(text) = text else {
		return 1;
	};
	let words = text.split_whitespace().count() as f64;
	((words / WORDS_PER_MINUTE).round_ties_even() as u32).max(1)
}
