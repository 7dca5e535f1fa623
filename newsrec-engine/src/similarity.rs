// ---------------------------------------------------------------------------
// Similarity engine
// ---------------------------------------------------------------------------
//
// Linear-kernel similarity over topic vectors: `sim(i, j) = w_i . w_j`,
// unnormalized. The full `N x N` matrix is materialized at build time so
// queries read a row in O(1).
// ---------------------------------------------------------------------------

use ndarray::{Array2, ArrayView1};

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
	inner: Array2<f64>,
}

impl SimilarityMatrix {
	/// `topics * topics^T`. The upper triangle is mirrored onto the lower
	/// one afterwards, so `sim(i, j)` and `sim(j, i)` are bit-identical.
	pub fn linear_kernel(topics: &Array2<f64>) -> Self {
		let mut inner = topics.dot(&topics.t());
		let n = inner.nrows();
		for i in 0..n {
			for j in (i + 1)..n {
				inner[[j, i]] = inner[[i, j]];
			}
		}
		tracing::info!(articles = n, "Similarity matrix computed");
		Self { inner }
	}

	/// Number of articles (rows and columns).
	pub fn size(&self) -> usize {
		self.inner.nrows()
	}

	pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
		self.inner.row(i)
	}

	pub fn get(&self, i: usize, j: usize) -> f64 {
		self.inner[[i, j]]
	}
}
