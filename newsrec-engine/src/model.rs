// ---------------------------------------------------------------------------
// Model generation
// ---------------------------------------------------------------------------
//
// One complete build of the pipeline: normalized articles, term matrix,
// topic model, similarity matrix and title index. A `Model` is immutable
// once built; rebuilding produces a new one that the registry swaps in
// whole.
// ---------------------------------------------------------------------------

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{DedupPolicy, ModelConfig};
use crate::corpus::{load_corpus, normalize};
use crate::error::RecommendError;
use crate::index::TitleIndex;
use crate::query;
use crate::similarity::SimilarityMatrix;
use crate::topic::TopicModel;
use crate::types::{
	Article, Category, LabelCount, ModelStatus, RawArticle, RecommendOptions,
	RecommendationEntry, Sentiment,
};
use crate::vectorizer::{TermMatrix, TfidfVectorizer};

/// Shared, read-only handle to a published model generation.
pub type ModelHandle = Arc<Model>;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug)]
pub struct Model {
	articles: Vec<Article>,
	vectorizer: TfidfVectorizer,
	terms: TermMatrix,
	topics: TopicModel,
	similarity: SimilarityMatrix,
	index: TitleIndex,
	config: ModelConfig,
	/// Assigned by the registry on publish; 0 for an unpublished build.
	pub(crate) generation: u64,
	build_duration: Duration,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Run the full pipeline over raw corpus rows.
///
/// Fails with `InvalidParams` on a bad config and `DataUnavailable` when
/// no article survives normalization or no term survives pruning.
pub fn build(rows: Vec<RawArticle>, config: &ModelConfig) -> Result<Model, RecommendError> {
	config.validate()?;
	let started = Instant::now();

	let articles = normalize(rows, config);
	if articles.is_empty() {
		return Err(RecommendError::DataUnavailable(
			"no usable articles after normalization".into(),
		));
	}

	let documents: Vec<&str> = articles.iter().map(|a| a.composite_text()).collect();
	let (vectorizer, terms) = TfidfVectorizer::fit_transform(&documents, config)?;
	let topics = TopicModel::fit(&terms, config);
	let similarity = SimilarityMatrix::linear_kernel(topics.article_topics());
	let index = TitleIndex::build(&articles);

	let model = Model {
		articles,
		vectorizer,
		terms,
		topics,
		similarity,
		index,
		config: config.clone(),
		generation: 0,
		build_duration: started.elapsed(),
	};
	model.check_consistency()?;

	tracing::info!(
		articles = model.articles.len(),
		vocabulary = model.vectorizer.vocabulary_size(),
		topics = model.topics.topic_count(),
		millis = model.build_duration.as_millis() as u64,
		"Model built"
	);
	Ok(model)
}

/// Load a CSV corpus and build a model from it.
pub fn build_from_path(path: &Path, config: &ModelConfig) -> Result<Model, RecommendError> {
	let rows = load_corpus(path)?;
	build(rows, config)
}

impl Model {
	/// Verify that every artifact agrees on the article count and that the
	/// title index only points at rows carrying that title.
	pub fn check_consistency(&self) -> Result<(), RecommendError> {
		let n = self.articles.len();
		let fail = |msg: String| Err(RecommendError::Inconsistent(msg));

		if self.terms.rows() != n {
			return fail(format!("term matrix has {} rows for {} articles", self.terms.rows(), n));
		}
		if self.topics.article_topics().nrows() != n {
			return fail(format!(
				"topic matrix has {} rows for {} articles",
				self.topics.article_topics().nrows(),
				n
			));
		}
		if self.similarity.size() != n {
			return fail(format!(
				"similarity matrix is {}x{} for {} articles",
				self.similarity.size(),
				self.similarity.size(),
				n
			));
		}
		if let Some((position, article)) =
			self.articles.iter().enumerate().find(|(i, a)| a.id != *i)
		{
			return fail(format!("article at row {} has id {}", position, article.id));
		}
		for (title, row) in self.index.iter() {
			if row >= n || self.articles[row].title != title {
				return fail(format!("title index maps {:?} to row {}", title, row));
			}
		}
		let titles_deduplicated = self.config.dedup_policy != DedupPolicy::KeepAll;
		if titles_deduplicated && self.index.len() != n {
			return fail(format!(
				"title index has {} entries for {} articles",
				self.index.len(),
				n
			));
		}
		Ok(())
	}

	// ── Artifacts ─────────────────────────────────────────────────────────

	pub fn articles(&self) -> &[Article] {
		&self.articles
	}

	pub fn vectorizer(&self) -> &TfidfVectorizer {
		&self.vectorizer
	}

	pub fn terms(&self) -> &TermMatrix {
		&self.terms
	}

	pub fn topics(&self) -> &TopicModel {
		&self.topics
	}

	pub fn similarity(&self) -> &SimilarityMatrix {
		&self.similarity
	}

	pub fn index(&self) -> &TitleIndex {
		&self.index
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn build_duration(&self) -> Duration {
		self.build_duration
	}

	// ── Queries ───────────────────────────────────────────────────────────

	pub fn recommend(
		&self,
		title: &str,
		options: &RecommendOptions,
	) -> Result<Vec<RecommendationEntry>, RecommendError> {
		query::recommend(self, title, options)
	}

	pub fn article(&self, title: &str) -> Result<&Article, RecommendError> {
		let row = self.index.resolve(title)?;
		Ok(&self.articles[row])
	}

	/// All titles in row order.
	pub fn titles(&self) -> Vec<&str> {
		self.articles.iter().map(|a| a.title.as_str()).collect()
	}

	/// Case-insensitive substring match over titles, in row order.
	pub fn search_titles(&self, query: &str, limit: usize) -> Vec<&Article> {
		let needle = query.to_lowercase();
		if needle.is_empty() {
			return Vec::new();
		}
		self.articles
			.iter()
			.filter(|a| a.title.to_lowercase().contains(&needle))
			.take(limit)
			.collect()
	}

	pub fn category_histogram(&self) -> Vec<LabelCount> {
		histogram(Category::ALL.iter().map(|c| {
			let count = self.articles.iter().filter(|a| a.category == *c).count();
			(c.label(), count)
		}))
	}

	pub fn sentiment_histogram(&self) -> Vec<LabelCount> {
		histogram(Sentiment::ALL.iter().map(|s| {
			let count = self.articles.iter().filter(|a| a.sentiment == *s).count();
			(s.label(), count)
		}))
	}

	/// The `n` heaviest vocabulary terms of `topic`.
	pub fn topic_terms(&self, topic: usize, n: usize) -> Vec<(&str, f64)> {
		let terms = self.vectorizer.terms();
		self.topics
			.top_terms(topic, n)
			.into_iter()
			.map(|(col, weight)| (terms[col].as_str(), weight))
			.collect()
	}

	pub fn status(&self) -> ModelStatus {
		ModelStatus {
			loaded: true,
			generation: Some(self.generation),
			total_articles: self.articles.len(),
			vocabulary_size: self.vectorizer.vocabulary_size(),
			topic_count: self.topics.topic_count(),
			build_millis: Some(self.build_duration.as_millis() as u64),
		}
	}
}

/// Count descending, declaration order on ties, zero counts omitted.
fn histogram<'a>(counts: impl Iterator<Item = (&'a str, usize)>) -> Vec<LabelCount> {
	let mut out: Vec<LabelCount> = counts
		.filter(|(_, count)| *count > 0)
		.map(|(label, count)| LabelCount {
			label: label.to_string(),
			count,
		})
		.collect();
	out.sort_by(|a, b| b.count.cmp(&a.count));
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rows() -> Vec<RawArticle> {
		vec![
			RawArticle::new("Markets slide", "Stocks fall", "Stocks fall on bad loss news")
				.with_keywords("market"),
			RawArticle::new("Markets rebound", "Stocks rise", "Stocks rise after a great win")
				.with_keywords("finance"),
			RawArticle::new("Vaccine trial", "Health update", "Trial results for vaccine")
				.with_keywords("health"),
		]
	}

	fn config() -> ModelConfig {
		ModelConfig {
			topic_count: 2,
			..Default::default()
		}
	}

	#[test]
	fn build_produces_consistent_generation() {
		let model = build(rows(), &config()).unwrap();
		assert_eq!(model.articles().len(), 3);
		assert_eq!(model.index().len(), 3);
		assert_eq!(model.similarity().size(), 3);
		assert_eq!(model.terms().rows(), 3);
		assert_eq!(model.topics().article_topics().ncols(), 2);
		assert_eq!(model.generation(), 0);
		assert!(model.check_consistency().is_ok());
	}

	#[test]
	fn build_rejects_invalid_config() {
		let bad = ModelConfig {
			topic_count: 0,
			..Default::default()
		};
		assert!(matches!(build(rows(), &bad), Err(RecommendError::InvalidParams(_))));
	}

	#[test]
	fn build_without_usable_rows_is_data_unavailable() {
		let mut row = RawArticle::new("T", "S", "X");
		row.text = None;
		assert!(matches!(
			build(vec![row], &config()),
			Err(RecommendError::DataUnavailable(_))
		));
		assert!(matches!(
			build(Vec::new(), &config()),
			Err(RecommendError::DataUnavailable(_))
		));
	}

	#[test]
	fn build_from_missing_path_is_data_unavailable() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			build_from_path(&dir.path().join("missing.csv"), &config()),
			Err(RecommendError::DataUnavailable(_))
		));
	}

	#[test]
	fn build_from_path_reads_csv() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("news.csv");
		std::fs::write(
			&path,
			"title,summary,text,keywords\n\
			Rates rise,Bank moves,Central bank raises rates,finance\n\
			Rates hold,Bank waits,Central bank holds rates steady,finance\n",
		)
		.unwrap();
		let model = build_from_path(&path, &config()).unwrap();
		assert_eq!(model.titles(), vec!["Rates rise", "Rates hold"]);
	}

	#[test]
	fn accessors_project_articles() {
		let model = build(rows(), &config()).unwrap();
		assert_eq!(
			model.titles(),
			vec!["Markets slide", "Markets rebound", "Vaccine trial"]
		);
		assert_eq!(model.article("Vaccine trial").unwrap().id, 2);
		assert!(matches!(
			model.article("vaccine trial"),
			Err(RecommendError::ArticleNotFound(_))
		));

		let categories = model.category_histogram();
		assert_eq!(
			categories,
			vec![
				LabelCount { label: "Business".into(), count: 2 },
				LabelCount { label: "Health".into(), count: 1 },
			]
		);
		let sentiments = model.sentiment_histogram();
		assert_eq!(
			sentiments.iter().map(|l| l.label.as_str()).collect::<Vec<_>>(),
			vec!["positive", "negative", "neutral"]
		);
	}

	#[test]
	fn search_titles_is_case_insensitive_and_bounded() {
		let model = build(rows(), &config()).unwrap();
		let hits: Vec<&str> = model
			.search_titles("MARKETS", DEFAULT_SEARCH_LIMIT)
			.iter()
			.map(|a| a.title.as_str())
			.collect();
		assert_eq!(hits, vec!["Markets slide", "Markets rebound"]);
		assert_eq!(model.search_titles("markets", 1).len(), 1);
		assert!(model.search_titles("", 10).is_empty());
		assert!(model.search_titles("sports", 10).is_empty());
	}

	#[test]
	fn topic_terms_come_from_the_vocabulary() {
		let model = build(rows(), &config()).unwrap();
		let terms = model.topic_terms(0, 3);
		assert_eq!(terms.len(), 3);
		for (term, _) in terms {
			assert!(model.vectorizer().column(term).is_some());
		}
	}

	#[test]
	fn status_reports_dimensions() {
		let model = build(rows(), &config()).unwrap();
		let status = model.status();
		assert!(status.loaded);
		assert_eq!(status.total_articles, 3);
		assert_eq!(status.topic_count, 2);
		assert_eq!(status.vocabulary_size, model.vectorizer().vocabulary_size());
	}
}
