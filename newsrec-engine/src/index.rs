use std::collections::HashMap;

use crate::error::RecommendError;
use crate::types::Article;

/// Exact, case-sensitive title lookup. The first article carrying a title
/// owns it; later articles with the same title are not reachable by title.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
	positions: HashMap<String, usize>,
}

impl TitleIndex {
	pub fn build(articles: &[Article]) -> Self {
		let mut positions = HashMap::with_capacity(articles.len());
		for article in articles {
			positions.entry(article.title.clone()).or_insert(article.id);
		}
		if positions.len() < articles.len() {
			tracing::debug!(
				shadowed = articles.len() - positions.len(),
				"Duplicate titles left out of the title index"
			);
		}
		Self { positions }
	}

	pub fn len(&self) -> usize {
		self.positions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.positions.is_empty()
	}

	pub fn get(&self, title: &str) -> Option<usize> {
		self.positions.get(title).copied()
	}

	pub fn resolve(&self, title: &str) -> Result<usize, RecommendError> {
		self.get(title)
			.ok_or_else(|| RecommendError::ArticleNotFound(title.to_string()))
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
		self.positions.iter().map(|(t, &i)| (t.as_str(), i))
	}
}
