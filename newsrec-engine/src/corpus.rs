// ---------------------------------------------------------------------------
// Corpus loader & normalizer
// ---------------------------------------------------------------------------
//
// Reads raw article rows from a CSV corpus, drops unusable and duplicate
// rows, derives category / sentiment / reading time, and builds the
// composite text the vectorizer consumes. Row positions are assigned only
// after every drop, so `Article::id` is the final surviving order.
// ---------------------------------------------------------------------------

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::{DedupPolicy, ModelConfig};
use crate::error::RecommendError;
use crate::features::{analyze_sentiment, estimate_reading_time, extract_category};
use crate::types::{Article, RawArticle};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct Columns {
	title: Option<usize>,
	summary: Option<usize>,
	text: Option<usize>,
	keywords: Option<usize>,
	link: Option<usize>,
	date: Option<usize>,
	title_summary: Option<usize>,
}

impl Columns {
	fn from_headers(headers: &csv::StringRecord) -> Self {
		let mut cols = Self::default();
		for (i, name) in headers.iter().enumerate() {
			let slot = match name.trim() {
				"title" => &mut cols.title,
				"summary" => &mut cols.summary,
				"text" => &mut cols.text,
				"keywords" => &mut cols.keywords,
				"link" => &mut cols.link,
				"date" => &mut cols.date,
				"title_summary" => &mut cols.title_summary,
				_ => continue,
			};
			// First column with a given name wins.
			if slot.is_none() {
				*slot = Some(i);
			}
		}
		cols
	}
}

/// Empty cells read as missing.
fn cell(record: &csv::StringRecord, col: Option<usize>) -> Option<String> {
	let value = record.get(col?)?;
	if value.trim().is_empty() {
		None
	} else {
		Some(value.to_string())
	}
}

/// Read a CSV corpus file.
///
/// A missing or unreadable file, an empty file, or a header without a
/// `title` column is `DataUnavailable`.
pub fn load_corpus(path: &Path) -> Result<Vec<RawArticle>, RecommendError> {
	let file = File::open(path).map_err(|e| {
		RecommendError::DataUnavailable(format!("cannot open {}: {}", path.display(), e))
	})?;
	let rows = parse_corpus(file)?;
	tracing::info!(path = %path.display(), rows = rows.len(), "Corpus read");
	Ok(rows)
}

/// Parse CSV corpus rows from any reader. Rows that fail to parse are
/// skipped with a warning.
pub fn parse_corpus<R: Read>(reader: R) -> Result<Vec<RawArticle>, RecommendError> {
	let mut csv_reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.flexible(true)
		.from_reader(reader);

	let headers = csv_reader
		.headers()
		.map_err(|e| RecommendError::DataUnavailable(format!("unreadable corpus header: {}", e)))?
		.clone();
	if headers.is_empty() {
		return Err(RecommendError::DataUnavailable("corpus has no header row".into()));
	}

	let cols = Columns::from_headers(&headers);
	if cols.title.is_none() {
		return Err(RecommendError::DataUnavailable(
			"corpus has no 'title' column".into(),
		));
	}

	let mut rows = Vec::new();
	for (line, result) in csv_reader.records().enumerate() {
		let record = match result {
			Ok(r) => r,
			Err(e) => {
				tracing::warn!(row = line + 1, "Skipping malformed corpus row: {}", e);
				continue;
			}
		};

		let title = cell(&record, cols.title);
		let summary = cell(&record, cols.summary);
		let title_summary = match cols.title_summary {
			Some(_) => cell(&record, cols.title_summary),
			None => match (&title, &summary) {
				(Some(t), Some(s)) => Some(format!("{} {}", t, s)),
				_ => None,
			},
		};

		rows.push(RawArticle {
			title,
			summary,
			text: cell(&record, cols.text),
			keywords: cell(&record, cols.keywords),
			link: cell(&record, cols.link),
			date: cell(&record, cols.date),
			title_summary,
		});
	}

	Ok(rows)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A row that survived the validity filter, with its core text fields
/// unwrapped.
struct ValidRow {
	raw: RawArticle,
	title: String,
	summary: String,
	text: String,
}

/// Keep only rows carrying the validity signal and all three core text
/// fields.
fn valid_rows(rows: Vec<RawArticle>) -> Vec<ValidRow> {
	rows.into_iter()
		.filter_map(|mut raw| {
			raw.title_summary.as_ref()?;
			let title = raw.title.take()?;
			let summary = raw.summary.take()?;
			let text = raw.text.take()?;
			Some(ValidRow {
				raw,
				title,
				summary,
				text,
			})
		})
		.collect()
}

/// Keep the first row for every distinct key, preserving order.
fn dedup_by<F>(rows: Vec<ValidRow>, key: F) -> Vec<ValidRow>
where
	F: Fn(&ValidRow) -> &str,
{
	let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
	rows.into_iter()
		.filter(|row| seen.insert(key(row).to_string()))
		.collect()
}

/// Take at most `limit` Unicode scalar values.
fn truncate_chars(s: &str, limit: Option<usize>) -> &str {
	match limit {
		Some(limit) => match s.char_indices().nth(limit) {
			Some((byte, _)) => &s[..byte],
			None => s,
		},
		None => s,
	}
}

/// Space-joined `title, keywords, summary, text`, skipping empty pieces.
/// Keywords are left out unless `config.include_keywords`.
pub fn composite_text(
	title: &str,
	keywords: Option<&str>,
	summary: &str,
	text: &str,
	config: &ModelConfig,
) -> String {
	let pieces = [
		title,
		keywords.filter(|_| config.include_keywords).unwrap_or(""),
		truncate_chars(summary, config.summary_truncation_length),
		truncate_chars(text, config.text_truncation_length),
	];
	pieces
		.iter()
		.filter(|p| !p.is_empty())
		.copied()
		.collect::<Vec<_>>()
		.join(" ")
}

/// Clean raw rows into the article list every other component indexes by.
///
/// Order of operations: row cap, validity filter, dedup passes per
/// `config.dedup_policy`, then feature derivation and id assignment.
/// With `DedupPolicy::Content` a row is dropped for repeating an earlier
/// row's summary or text even when its title is new.
pub fn normalize(mut rows: Vec<RawArticle>, config: &ModelConfig) -> Vec<Article> {
	let read = rows.len();
	if let Some(cap) = config.max_corpus_rows {
		rows.truncate(cap);
	}
	let capped = rows.len();

	let mut valid = valid_rows(rows);
	let after_validity = valid.len();

	match config.dedup_policy {
		DedupPolicy::Content => {
			valid = dedup_by(valid, |r| r.title.as_str());
			valid = dedup_by(valid, |r| r.summary.as_str());
			valid = dedup_by(valid, |r| r.text.as_str());
		}
		DedupPolicy::TitleOnly => {
			valid = dedup_by(valid, |r| r.title.as_str());
		}
		DedupPolicy::KeepAll => {}
	}

	tracing::info!(
		read,
		capped,
		invalid = capped - after_validity,
		duplicates = after_validity - valid.len(),
		kept = valid.len(),
		"Corpus normalized"
	);

	valid
		.into_iter()
		.enumerate()
		.map(|(id, row)| {
			let keywords = row.raw.keywords;
			let composite_text =
				composite_text(&row.title, keywords.as_deref(), &row.summary, &row.text, config);
			Article {
				id,
				category: extract_category(keywords.as_deref()),
				sentiment: analyze_sentiment(Some(&row.text)),
				reading_time: estimate_reading_time(Some(&row.text)),
				title: row.title,
				summary: row.summary,
				text: row.text,
				keywords,
				link: row.raw.link,
				date: row.raw.date,
				composite_text,
			}
		})
		.collect()
}
