use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RecommendError;

// ---------------------------------------------------------------------------
// Derived labels
// ---------------------------------------------------------------------------

/// Coarse topic label assigned from an article's keywords at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
	Technology,
	Business,
	Politics,
	Health,
	General,
}

impl Category {
	/// All labels in declaration order. `General` is the default and last.
	pub const ALL: [Category; 5] = [
		Category::Technology,
		Category::Business,
		Category::Politics,
		Category::Health,
		Category::General,
	];

	pub fn label(&self) -> &'static str {
		match self {
			Self::Technology => "Technology",
			Self::Business => "Business",
			Self::Politics => "Politics",
			Self::Health => "Health",
			Self::General => "General",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl FromStr for Category {
	type Err = RecommendError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.iter()
			.copied()
			.find(|c| c.label().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| RecommendError::InvalidParams(format!("unknown category: {}", s)))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
	Positive,
	Negative,
	Neutral,
}

impl Sentiment {
	pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

	pub fn label(&self) -> &'static str {
		match self {
			Self::Positive => "positive",
			Self::Negative => "negative",
			Self::Neutral => "neutral",
		}
	}
}

impl fmt::Display for Sentiment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl FromStr for Sentiment {
	type Err = RecommendError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.iter()
			.copied()
			.find(|v| v.label().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| RecommendError::InvalidParams(format!("unknown sentiment: {}", s)))
	}
}

// ---------------------------------------------------------------------------
// Corpus records
// ---------------------------------------------------------------------------

/// One corpus row as read from the source, before normalization.
/// `None` stands for a missing cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArticle {
	pub title: Option<String>,
	pub summary: Option<String>,
	pub text: Option<String>,
	pub keywords: Option<String>,
	pub link: Option<String>,
	pub date: Option<String>,
	/// Pre-merged title/summary cell used as the row validity signal.
	/// `None` on corpora that never carried the column.
	pub title_summary: Option<String>,
}

impl RawArticle {
	/// Row with the three core text fields set and its validity signal
	/// derived from them.
	pub fn new(title: &str, summary: &str, text: &str) -> Self {
		Self {
			title: Some(title.to_string()),
			summary: Some(summary.to_string()),
			text: Some(text.to_string()),
			title_summary: Some(format!("{} {}", title, summary)),
			..Default::default()
		}
	}

	pub fn with_keywords(mut self, keywords: &str) -> Self {
		self.keywords = Some(keywords.to_string());
		self
	}

	pub fn with_link(mut self, link: &str) -> Self {
		self.link = Some(link.to_string());
		self
	}

	pub fn with_date(mut self, date: &str) -> Self {
		self.date = Some(date.to_string());
		self
	}
}

/// A normalized article. `id` is its row position in every matrix of the
/// model generation it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
	pub id: usize,
	pub title: String,
	pub summary: String,
	pub text: String,
	pub keywords: Option<String>,
	pub link: Option<String>,
	pub date: Option<String>,
	pub category: Category,
	pub sentiment: Sentiment,
	#[serde(rename = "readingTime")]
	pub reading_time: u32,
	#[serde(skip)]
	pub(crate) composite_text: String,
}

impl Article {
	pub fn composite_text(&self) -> &str {
		&self.composite_text
	}
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Options for a recommendation query. `None` filters are the
/// "no filter" sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendOptions {
	pub count: usize,
	pub category: Option<Category>,
	pub sentiment: Option<Sentiment>,
	pub min_similarity: Option<f64>,
}

impl RecommendOptions {
	pub fn top(count: usize) -> Self {
		Self {
			count,
			..Default::default()
		}
	}

	pub fn with_category(mut self, category: Category) -> Self {
		self.category = Some(category);
		self
	}

	pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
		self.sentiment = Some(sentiment);
		self
	}

	pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
		self.min_similarity = Some(min_similarity);
		self
	}

	pub(crate) fn has_label_filter(&self) -> bool {
		self.category.is_some() || self.sentiment.is_some()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationEntry {
	pub rank: usize,
	pub id: usize,
	pub title: String,
	pub summary: String,
	pub link: Option<String>,
	pub date: String,
	pub category: Category,
	pub sentiment: Sentiment,
	#[serde(rename = "readingTime")]
	pub reading_time: u32,
	#[serde(rename = "similarityScore")]
	pub similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
	pub label: String,
	pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
	pub loaded: bool,
	pub generation: Option<u64>,
	#[serde(rename = "totalArticles")]
	pub total_articles: usize,
	#[serde(rename = "vocabularySize")]
	pub vocabulary_size: usize,
	#[serde(rename = "topicCount")]
	pub topic_count: usize,
	#[serde(rename = "buildMillis")]
	pub build_millis: Option<u64>,
}
