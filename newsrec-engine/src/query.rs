// ---------------------------------------------------------------------------
// Recommendation query engine
// ---------------------------------------------------------------------------
//
// Turns one similarity row into a bounded, filtered recommendation list.
// Pure read-only computation over a published model generation.
//
// Candidate order is similarity descending, row position ascending on ties.
// The source article is always excluded. With a category or sentiment
// filter and a finite over-fetch factor, only the first `count * factor`
// candidates are examined, so a selective filter may return fewer than
// `count` entries.
// ---------------------------------------------------------------------------

use std::cmp::Ordering;

use ndarray::ArrayView1;

use crate::error::RecommendError;
use crate::model::Model;
use crate::types::{Article, RecommendOptions, RecommendationEntry};

const SCORE_SCALE: f64 = 10_000.0;

/// Round to four decimal places.
pub fn round_score(score: f64) -> f64 {
	(score * SCORE_SCALE).round() / SCORE_SCALE
}

/// Every row except `source`, ordered by similarity descending with ties
/// broken by ascending row position.
pub fn ranked_candidates(row: ArrayView1<'_, f64>, source: usize) -> Vec<usize> {
	let mut candidates: Vec<usize> = (0..row.len()).filter(|&j| j != source).collect();
	candidates.sort_by(|&a, &b| match row[b].total_cmp(&row[a]) {
		Ordering::Equal => a.cmp(&b),
		other => other,
	});
	candidates
}

fn matches_labels(article: &Article, options: &RecommendOptions) -> bool {
	options.category.is_none_or(|c| article.category == c)
		&& options.sentiment.is_none_or(|s| article.sentiment == s)
}

/// Recommend up to `options.count` articles similar to `title`.
pub fn recommend(
	model: &Model,
	title: &str,
	options: &RecommendOptions,
) -> Result<Vec<RecommendationEntry>, RecommendError> {
	let source = model.index().resolve(title)?;
	if options.count == 0 {
		return Ok(Vec::new());
	}

	let row = model.similarity().row(source);
	let candidates = ranked_candidates(row, source);

	let window = match (options.has_label_filter(), model.config().overfetch_factor) {
		(true, Some(factor)) => options.count.saturating_mul(factor),
		_ => candidates.len(),
	};

	let articles = model.articles();
	let selected: Vec<usize> = candidates
		.into_iter()
		.take(window)
		.filter(|&j| options.min_similarity.is_none_or(|min| row[j] >= min))
		.filter(|&j| matches_labels(&articles[j], options))
		.take(options.count)
		.collect();

	tracing::debug!(
		title,
		source,
		window,
		returned = selected.len(),
		requested = options.count,
		"Recommendations ranked"
	);

	Ok(selected
		.into_iter()
		.enumerate()
		.map(|(rank, j)| entry(rank + 1, &articles[j], row[j]))
		.collect())
}

fn entry(rank: usize, article: &Article, similarity: f64) -> RecommendationEntry {
	RecommendationEntry {
		rank,
		id: article.id,
		title: article.title.clone(),
		summary: article.summary.clone(),
		link: article.link.clone(),
		date: article.date.clone().unwrap_or_else(|| "Unknown".to_string()),
		category: article.category,
		sentiment: article.sentiment,
		reading_time: article.reading_time,
		similarity_score: round_score(similarity),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ndarray::aview1;

	use crate::config::ModelConfig;
	use crate::model::build;
	use crate::types::{Category, RawArticle, Sentiment};

	fn corpus() -> Vec<RawArticle> {
		vec![
			RawArticle::new(
				"Chip makers rally",
				"Semiconductor stocks surge",
				"Semiconductor chip makers surge as software demand grows, a great success",
			)
			.with_keywords("tech, software"),
			RawArticle::new(
				"Software giants report",
				"Software revenue climbs",
				"Software revenue climbs for chip and semiconductor vendors with great success",
			)
			.with_keywords("software, market"),
			RawArticle::new(
				"Chip shortage bites",
				"Semiconductor supply problem",
				"Semiconductor chip supply problem causes loss for software vendors, bad news",
			)
			.with_keywords("market, finance")
			.with_date("2021-02-03"),
			RawArticle::new(
				"Election called",
				"Parliament dissolved",
				"Parliament dissolved ahead of election campaign and vote",
			)
			.with_keywords("politics, election"),
			RawArticle::new(
				"Vote count begins",
				"Election ballots counted",
				"Election ballots counted after parliament vote campaign",
			)
			.with_keywords("ballots"),
		]
	}

	fn model() -> Model {
		let config = ModelConfig {
			topic_count: 2,
			..Default::default()
		};
		build(corpus(), &config).unwrap()
	}

	// -- ranked_candidates ---------------------------------------------------

	#[test]
	fn ranking_excludes_source_and_breaks_ties_by_position() {
		let row = [0.5, 0.9, 0.2, 0.9, 0.5];
		assert_eq!(ranked_candidates(aview1(&row), 1), vec![3, 0, 4, 2]);
		assert_eq!(ranked_candidates(aview1(&row), 4), vec![1, 3, 0, 2]);
	}

	#[test]
	fn round_score_keeps_four_places() {
		assert_eq!(round_score(0.123456), 0.1235);
		assert_eq!(round_score(1.5), 1.5);
		assert_eq!(round_score(12.00004), 12.0);
	}

	// -- recommend -----------------------------------------------------------

	#[test]
	fn never_recommends_the_source() {
		let model = model();
		for article in model.articles() {
			let recs = recommend(&model, &article.title, &RecommendOptions::top(10)).unwrap();
			assert_eq!(recs.len(), model.articles().len() - 1);
			assert!(recs.iter().all(|r| r.id != article.id));
		}
	}

	#[test]
	fn entries_are_ranked_and_sorted() {
		let model = model();
		let recs = recommend(&model, "Chip makers rally", &RecommendOptions::top(3)).unwrap();
		assert_eq!(recs.len(), 3);
		assert_eq!(
			recs.iter().map(|r| r.rank).collect::<Vec<_>>(),
			vec![1, 2, 3]
		);
		let row = model.similarity().row(0);
		assert!(recs.windows(2).all(|p| row[p[0].id] >= row[p[1].id]));
	}

	#[test]
	fn related_articles_rank_first() {
		let model = model();
		let recs = recommend(&model, "Election called", &RecommendOptions::top(1)).unwrap();
		assert_eq!(recs[0].title, "Vote count begins");
	}

	#[test]
	fn entry_fields_come_from_the_article() {
		let model = model();
		let recs = recommend(&model, "Software giants report", &RecommendOptions::top(4)).unwrap();
		let shortage = recs.iter().find(|r| r.title == "Chip shortage bites").unwrap();
		assert_eq!(shortage.date, "2021-02-03");
		assert_eq!(shortage.category, Category::Business);
		assert_eq!(shortage.sentiment, Sentiment::Negative);
		assert_eq!(shortage.reading_time, 1);
		let election = recs.iter().find(|r| r.title == "Election called").unwrap();
		assert_eq!(election.date, "Unknown");
	}

	#[test]
	fn zero_count_is_empty() {
		let model = model();
		let recs = recommend(&model, "Election called", &RecommendOptions::top(0)).unwrap();
		assert!(recs.is_empty());
	}

	#[test]
	fn unknown_title_is_not_found() {
		let model = model();
		assert!(matches!(
			recommend(&model, "nonexistent-title", &RecommendOptions::top(5)),
			Err(RecommendError::ArticleNotFound(_))
		));
	}

	#[test]
	fn label_filters_restrict_output() {
		let model = model();
		let options = RecommendOptions::top(5).with_category(Category::Politics);
		let recs = recommend(&model, "Chip makers rally", &options).unwrap();
		assert_eq!(recs.len(), 1);
		assert_eq!(recs[0].title, "Election called");

		let options = RecommendOptions::top(5).with_sentiment(Sentiment::Positive);
		let recs = recommend(&model, "Chip shortage bites", &options).unwrap();
		let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
		assert_eq!(titles.len(), 2);
		assert!(titles.contains(&"Chip makers rally"));
		assert!(titles.contains(&"Software giants report"));
	}

	#[test]
	fn min_similarity_drops_weak_candidates() {
		let model = model();
		let all = recommend(&model, "Election called", &RecommendOptions::top(10)).unwrap();
		let threshold = all[0].similarity_score;
		let options = RecommendOptions::top(10).with_min_similarity(threshold + 1.0);
		assert!(recommend(&model, "Election called", &options).unwrap().is_empty());

		let row = model.similarity().row(3);
		let cut = row[all[1].id];
		let options = RecommendOptions::top(10).with_min_similarity(cut);
		let recs = recommend(&model, "Election called", &options).unwrap();
		assert!(recs.iter().all(|r| row[r.id] >= cut));
		assert!(recs.len() >= 2);
	}

	#[test]
	fn overfetch_window_bounds_filtered_scans() {
		// Window of one candidate: only the closest article is examined.
		let config = ModelConfig {
			topic_count: 2,
			overfetch_factor: Some(1),
			..Default::default()
		};
		let model = build(corpus(), &config).unwrap();
		let options = RecommendOptions::top(1).with_category(Category::Politics);
		let recs = recommend(&model, "Chip makers rally", &options).unwrap();
		assert!(recs.is_empty());

		// Scanning the full row finds the politics article.
		let config = ModelConfig {
			overfetch_factor: None,
			..config
		};
		let model = build(corpus(), &config).unwrap();
		let recs = recommend(&model, "Chip makers rally", &options).unwrap();
		assert_eq!(recs.len(), 1);
		assert_eq!(recs[0].category, Category::Politics);
	}

	#[test]
	fn min_similarity_and_label_filter_stay_inside_the_window() {
		let with_factor = |factor| {
			let config = ModelConfig {
				topic_count: 2,
				overfetch_factor: factor,
				..Default::default()
			};
			build(corpus(), &config).unwrap()
		};
		let neutral = |count, min| {
			RecommendOptions::top(count)
				.with_sentiment(Sentiment::Neutral)
				.with_min_similarity(min)
		};

		// Both election articles are neutral and rank behind the tech ones.
		let bounded = with_factor(Some(1));
		let row = bounded.similarity().row(0);
		let ranked = ranked_candidates(row, 0);
		let neutral_ids: Vec<usize> = ranked
			.iter()
			.copied()
			.filter(|&j| bounded.articles()[j].sentiment == Sentiment::Neutral)
			.collect();
		assert_eq!(neutral_ids.len(), 2);
		assert_ne!(bounded.articles()[ranked[0]].sentiment, Sentiment::Neutral);
		let (closer, farther) = (neutral_ids[0], neutral_ids[1]);

		// Every neutral candidate clears the threshold, but the one-candidate
		// window holds none of them, and the threshold does not widen it.
		let lenient = neutral(1, row[farther]);
		assert!(recommend(&bounded, "Chip makers rally", &lenient).unwrap().is_empty());

		// A full scan finds the closer neutral article under the same threshold.
		let unbounded = with_factor(None);
		let recs = recommend(&unbounded, "Chip makers rally", &lenient).unwrap();
		assert_eq!(recs.len(), 1);
		assert_eq!(recs[0].id, closer);

		// A threshold above every neutral score rejects the in-window
		// candidates, and nothing beyond the window is pulled in instead.
		let wide = with_factor(Some(10));
		let strict = neutral(2, row[ranked[0]]);
		for model in [&wide, &unbounded] {
			assert!(recommend(model, "Chip makers rally", &strict).unwrap().is_empty());
		}

		// A threshold at the closer neutral score keeps only candidates at or
		// above it.
		let exact = neutral(2, row[closer]);
		let recs = recommend(&wide, "Chip makers rally", &exact).unwrap();
		assert_eq!(recs[0].id, closer);
		assert!(recs.iter().all(|r| row[r.id] >= row[closer]));
		assert!(recs.iter().all(|r| r.sentiment == Sentiment::Neutral));
	}
}
