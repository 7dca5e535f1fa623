// ---------------------------------------------------------------------------
// Topic model -- non-negative matrix factorization
// ---------------------------------------------------------------------------
//
// Factorizes the `N x V` term matrix X into W (`N x K`, article-topic) and
// H (`K x V`, topic-term) with Lee & Seung multiplicative updates on the
// Frobenius loss. Initialization is drawn from a seeded `StdRng`, and every
// product accumulates in a fixed order, so two fits of the same matrix with
// the same config are bit-identical regardless of thread count.
// ---------------------------------------------------------------------------

use ndarray::{Array2, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ModelConfig;
use crate::vectorizer::TermMatrix;

const EPSILON: f64 = 1e-10;
const ERROR_CHECK_INTERVAL: usize = 10;

#[derive(Debug, Clone)]
pub struct TopicModel {
	/// W: one dense non-negative topic vector per article.
	article_topics: Array2<f64>,
	/// H: topic-term loadings, kept for inspection only.
	components: Array2<f64>,
	iterations: usize,
	reconstruction_error: f64,
}

impl TopicModel {
	/// Fit `config.topic_count` topics to `x`.
	pub fn fit(x: &TermMatrix, config: &ModelConfig) -> Self {
		let n = x.rows();
		let v = x.cols();
		let k = config.topic_count;

		let (mut w, mut h) = initialize(x, k, config.seed);

		let initial_error = reconstruction_error(x, &w, &h);
		let mut previous_error = initial_error;
		let mut iterations = 0;
		let mut converged = false;

		for iter in 1..=config.nmf_max_iterations {
			update_h(x, &w, &mut h);
			update_w(x, &mut w, &h);
			iterations = iter;

			if iter % ERROR_CHECK_INTERVAL == 0 {
				let error = reconstruction_error(x, &w, &h);
				tracing::debug!(iteration = iter, error, "NMF progress");
				if initial_error <= 0.0
					|| (previous_error - error) / initial_error < config.nmf_tolerance
				{
					previous_error = error;
					converged = true;
					break;
				}
				previous_error = error;
			}
		}

		let error = if iterations % ERROR_CHECK_INTERVAL == 0 {
			previous_error
		} else {
			reconstruction_error(x, &w, &h)
		};

		if !converged && config.nmf_max_iterations > 0 {
			tracing::warn!(
				max_iterations = config.nmf_max_iterations,
				"NMF reached the iteration limit before converging"
			);
		}
		tracing::info!(
			articles = n,
			terms = v,
			topics = k,
			iterations,
			reconstruction_error = error,
			"Topic model fitted"
		);

		Self {
			article_topics: w,
			components: h,
			iterations,
			reconstruction_error: error,
		}
	}

	pub fn article_topics(&self) -> &Array2<f64> {
		&self.article_topics
	}

	pub fn components(&self) -> &Array2<f64> {
		&self.components
	}

	pub fn topic_count(&self) -> usize {
		self.components.nrows()
	}

	pub fn iterations(&self) -> usize {
		self.iterations
	}

	pub fn reconstruction_error(&self) -> f64 {
		self.reconstruction_error
	}

	/// The `n` heaviest term columns of `topic`, weight descending, ties by
	/// column. Empty when `topic` is out of range.
	pub fn top_terms(&self, topic: usize, n: usize) -> Vec<(usize, f64)> {
		if topic >= self.topic_count() {
			return Vec::new();
		}
		let mut terms: Vec<(usize, f64)> =
			self.components.row(topic).iter().copied().enumerate().collect();
		terms.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
		terms.truncate(n);
		terms
	}
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Mean over all `N x V` cells, zeros included.
fn mean(x: &TermMatrix) -> f64 {
	let cells = x.rows() * x.cols();
	if cells == 0 {
		return 0.0;
	}
	x.data().iter().sum::<f64>() / cells as f64
}

/// Every cell is `sqrt(mean(X) / K) * u`, `u ~ U[0, 1)`. W is filled first,
/// row-major, then H.
fn initialize(x: &TermMatrix, k: usize, seed: u64) -> (Array2<f64>, Array2<f64>) {
	let scale = (mean(x) / k as f64).sqrt();
	let mut rng = StdRng::seed_from_u64(seed);

	let w = Array2::from_shape_simple_fn((x.rows(), k), || scale * rng.random::<f64>());
	let h = Array2::from_shape_simple_fn((k, x.cols()), || scale * rng.random::<f64>());
	(w, h)
}

// ---------------------------------------------------------------------------
// Sparse-dense products
// ---------------------------------------------------------------------------
//
// Both walk the CSR rows of X in order, so every output cell accumulates its
// terms in the same sequence on every run.

/// `X H^T`, an `N x K` matrix.
fn x_times_ht(x: &TermMatrix, h: &Array2<f64>) -> Array2<f64> {
	let mut out = Array2::zeros((x.rows(), h.nrows()));
	for (i, x_row) in x.outer_iterator().enumerate() {
		let mut out_row = out.row_mut(i);
		for (col, &value) in x_row.iter() {
			out_row.scaled_add(value, &h.column(col));
		}
	}
	out
}

/// `W^T X`, a `K x V` matrix.
fn wt_times_x(x: &TermMatrix, w: &Array2<f64>) -> Array2<f64> {
	let mut out = Array2::zeros((w.ncols(), x.cols()));
	for (i, x_row) in x.outer_iterator().enumerate() {
		let w_row = w.row(i);
		for (col, &value) in x_row.iter() {
			out.column_mut(col).scaled_add(value, &w_row);
		}
	}
	out
}

// ---------------------------------------------------------------------------
// Multiplicative updates
// ---------------------------------------------------------------------------

/// `H <- H * (W^T X) / (W^T W H)`
fn update_h(x: &TermMatrix, w: &Array2<f64>, h: &mut Array2<f64>) {
	let numerator = wt_times_x(x, w);
	let denominator = w.t().dot(w).dot(&*h);
	apply_update(h, &numerator, &denominator);
}

/// `W <- W * (X H^T) / (W H H^T)`
fn update_w(x: &TermMatrix, w: &mut Array2<f64>, h: &Array2<f64>) {
	let numerator = x_times_ht(x, h);
	let denominator = w.dot(&h.dot(&h.t()));
	apply_update(w, &numerator, &denominator);
}

fn apply_update(target: &mut Array2<f64>, numerator: &Array2<f64>, denominator: &Array2<f64>) {
	Zip::from(target)
		.and(numerator)
		.and(denominator)
		.par_for_each(|cell, &num, &den| *cell *= num / (den + EPSILON));
}

// ---------------------------------------------------------------------------
// Loss
// ---------------------------------------------------------------------------

/// `||X - WH||_F`, expanded as `||X||^2 - 2<X H^T, W> + <W^T W, H H^T>` so
/// only the non-zero cells of X are visited.
fn reconstruction_error(x: &TermMatrix, w: &Array2<f64>, h: &Array2<f64>) -> f64 {
	let x_norm: f64 = x.data().iter().map(|v| v * v).sum();
	let cross = (x_times_ht(x, h) * w).sum();
	let model_norm = (w.t().dot(w) * h.dot(&h.t())).sum();

	(x_norm - 2.0 * cross + model_norm).max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vectorizer::TfidfVectorizer;

	fn term_matrix(docs: &[&str]) -> TermMatrix {
		TfidfVectorizer::fit_transform(docs, &ModelConfig::default())
			.unwrap()
			.1
	}

	fn dense(x: &TermMatrix) -> Array2<f64> {
		let mut out = Array2::zeros((x.rows(), x.cols()));
		for (i, row) in x.outer_iterator().enumerate() {
			for (col, &value) in row.iter() {
				out[[i, col]] = value;
			}
		}
		out
	}

	fn config(topics: usize) -> ModelConfig {
		ModelConfig {
			topic_count: topics,
			..Default::default()
		}
	}

	const DOCS: &[&str] = &[
		"football match goal striker",
		"football goal keeper striker",
		"election vote parliament minister",
		"election parliament vote campaign",
	];

	#[test]
	fn output_shapes_and_non_negativity() {
		let x = term_matrix(DOCS);
		let model = TopicModel::fit(&x, &config(3));
		assert_eq!(model.article_topics().dim(), (4, 3));
		assert_eq!(model.components().dim(), (3, x.cols()));
		assert!(model.article_topics().iter().all(|v| *v >= 0.0));
		assert!(model.components().iter().all(|v| *v >= 0.0));
	}

	#[test]
	fn same_seed_is_bit_identical() {
		let x = term_matrix(DOCS);
		let a = TopicModel::fit(&x, &config(2));
		let b = TopicModel::fit(&x, &config(2));
		assert_eq!(a.article_topics(), b.article_topics());
		assert_eq!(a.components(), b.components());
	}

	#[test]
	fn different_seed_changes_initialization() {
		let x = term_matrix(DOCS);
		let a = TopicModel::fit(&x, &ModelConfig { nmf_max_iterations: 0, ..config(2) });
		let b = TopicModel::fit(
			&x,
			&ModelConfig {
				nmf_max_iterations: 0,
				seed: 7,
				..config(2)
			},
		);
		assert_ne!(a.article_topics(), b.article_topics());
	}

	#[test]
	fn fitting_reduces_reconstruction_error() {
		let x = term_matrix(DOCS);
		let untrained = TopicModel::fit(&x, &ModelConfig { nmf_max_iterations: 0, ..config(2) });
		let trained = TopicModel::fit(&x, &config(2));
		assert!(trained.reconstruction_error() < untrained.reconstruction_error());
		assert!(trained.iterations() > 0);
	}

	#[test]
	fn related_articles_share_topics() {
		let x = term_matrix(DOCS);
		let model = TopicModel::fit(&x, &config(2));
		let w = model.article_topics();
		let same = w.row(0).dot(&w.row(1));
		let across = w.row(0).dot(&w.row(2));
		assert!(same > across, "same={same} across={across}");
	}

	#[test]
	fn sparse_products_match_dense_products() {
		let x = term_matrix(DOCS);
		let (w, h) = initialize(&x, 3, 42);
		let x_dense = dense(&x);
		let expected_xht = x_dense.dot(&h.t());
		let expected_wtx = w.t().dot(&x_dense);
		let diff = |a: &Array2<f64>, b: &Array2<f64>| {
			a.iter().zip(b).map(|(p, q)| (p - q).abs()).fold(0.0, f64::max)
		};
		assert!(diff(&x_times_ht(&x, &h), &expected_xht) < 1e-12);
		assert!(diff(&wt_times_x(&x, &w), &expected_wtx) < 1e-12);
	}

	#[test]
	fn top_terms_sorted_and_bounded() {
		let x = term_matrix(DOCS);
		let model = TopicModel::fit(&x, &config(2));
		let top = model.top_terms(0, 3);
		assert_eq!(top.len(), 3);
		assert!(top.windows(2).all(|p| p[0].1 >= p[1].1));
		assert!(model.top_terms(5, 3).is_empty());
	}

	#[test]
	fn error_expansion_matches_direct_computation() {
		let x = term_matrix(&DOCS[..2]);
		let (w, h) = initialize(&x, 2, 42);
		let direct = (dense(&x) - w.dot(&h)).mapv(|d| d * d).sum().sqrt();
		assert!((reconstruction_error(&x, &w, &h) - direct).abs() < 1e-9);
	}
}
