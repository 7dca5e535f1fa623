// ---------------------------------------------------------------------------
// TF-IDF vectorizer
// ---------------------------------------------------------------------------
//
// Fits a fixed vocabulary over the composite texts of one model generation
// and turns every document into an L2-normalized sparse TF-IDF row. The
// vocabulary and its column order never change after `fit_transform`.
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use sprs::CsMat;
use unicode_normalization::UnicodeNormalization;

use crate::config::ModelConfig;
use crate::error::RecommendError;
use crate::stopwords::is_stop_word;

/// Tokens of two or more word characters.
static TOKEN_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

/// Fold accents to their ASCII base (NFKD, then drop non-ASCII) and
/// lower-case.
pub fn fold_accents(text: &str) -> String {
	text.nfkd()
		.filter(char::is_ascii)
		.collect::<String>()
		.to_ascii_lowercase()
}

/// Accent-folded, lower-cased tokens with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
	let folded = fold_accents(text);
	TOKEN_RE
		.find_iter(&folded)
		.map(|m| m.as_str())
		.filter(|t| !is_stop_word(t))
		.map(str::to_string)
		.collect()
}

fn term_counts(text: &str) -> HashMap<String, usize> {
	let mut counts = HashMap::new();
	for token in tokenize(text) {
		*counts.entry(token).or_insert(0) += 1;
	}
	counts
}

/// `N x V` CSR term-weight matrix in the vectorizer's column order.
pub type TermMatrix = CsMat<f64>;

// ---------------------------------------------------------------------------
// Vectorizer
// ---------------------------------------------------------------------------

/// A fitted vocabulary with its smoothed inverse document frequencies.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
	terms: Vec<String>,
	columns: HashMap<String, usize>,
	idf: Vec<f64>,
}

impl TfidfVectorizer {
	/// Fit the vocabulary over `documents` and weight every document.
	///
	/// A term is kept iff `min_df <= df <= max_df_fraction * N`; after that
	/// `max_features` keeps the terms with the highest total count, ties by
	/// term order. Columns are in lexicographic term order. An empty
	/// vocabulary is `DataUnavailable`.
	pub fn fit_transform<S: AsRef<str> + Sync>(
		documents: &[S],
		config: &ModelConfig,
	) -> Result<(Self, TermMatrix), RecommendError> {
		let n_docs = documents.len();
		let doc_counts: Vec<HashMap<String, usize>> =
			documents.par_iter().map(|d| term_counts(d.as_ref())).collect();

		// term -> (document frequency, total count)
		let mut stats: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
		for counts in &doc_counts {
			for (term, &count) in counts {
				let entry = stats.entry(term.as_str()).or_insert((0, 0));
				entry.0 += 1;
				entry.1 += count;
			}
		}
		let seen = stats.len();

		let max_doc_count = config.max_document_frequency_fraction * n_docs as f64;
		let mut kept: Vec<(&str, usize, usize)> = stats
			.into_iter()
			.filter(|(_, (df, _))| {
				*df >= config.min_document_frequency && (*df as f64) <= max_doc_count
			})
			.map(|(term, (df, total))| (term, df, total))
			.collect();

		if let Some(limit) = config.max_features {
			if kept.len() > limit {
				// Stable sort keeps lexicographic order among equal counts.
				kept.sort_by(|a, b| b.2.cmp(&a.2));
				kept.truncate(limit);
				kept.sort_by(|a, b| a.0.cmp(&b.0));
			}
		}

		if kept.is_empty() {
			return Err(RecommendError::DataUnavailable(
				"no terms remain after document-frequency pruning".into(),
			));
		}

		let terms: Vec<String> = kept.iter().map(|(t, _, _)| t.to_string()).collect();
		let idf: Vec<f64> = kept
			.iter()
			.map(|(_, df, _)| smoothed_idf(n_docs, *df))
			.collect();
		let columns = terms
			.iter()
			.enumerate()
			.map(|(i, t)| (t.clone(), i))
			.collect();

		let vectorizer = Self {
			terms,
			columns,
			idf,
		};
		let vocabulary = vectorizer.vocabulary_size();
		let mut indptr = Vec::with_capacity(n_docs + 1);
		let mut indices = Vec::new();
		let mut data = Vec::new();
		indptr.push(0);
		for counts in &doc_counts {
			for (col, weight) in vectorizer.weigh(counts) {
				indices.push(col);
				data.push(weight);
			}
			indptr.push(indices.len());
		}
		let matrix = CsMat::new((n_docs, vocabulary), indptr, indices, data);

		tracing::info!(
			documents = n_docs,
			terms_seen = seen,
			vocabulary,
			stored = matrix.nnz(),
			"Vocabulary fitted"
		);
		Ok((vectorizer, matrix))
	}

	pub fn vocabulary_size(&self) -> usize {
		self.terms.len()
	}

	pub fn terms(&self) -> &[String] {
		&self.terms
	}

	pub fn column(&self, term: &str) -> Option<usize> {
		self.columns.get(term).copied()
	}

	/// L2-normalized `(column, weight)` pairs sorted by column. Terms outside
	/// the vocabulary are ignored.
	fn weigh(&self, counts: &HashMap<String, usize>) -> Vec<(usize, f64)> {
		let mut row: Vec<(usize, f64)> = counts
			.iter()
			.filter_map(|(term, &tf)| {
				let col = self.column(term)?;
				Some((col, tf as f64 * self.idf[col]))
			})
			.collect();
		row.sort_by_key(|(col, _)| *col);

		let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
		if norm > 0.0 {
			for (_, w) in &mut row {
				*w /= norm;
			}
		}
		row
	}
}

/// `ln((1 + N) / (1 + df)) + 1`
fn smoothed_idf(n_docs: usize, df: usize) -> f64 {
	((1 + n_docs) as f64 / (1 + df) as f64).ln() + 1.0
}
