// ---------------------------------------------------------------------------
// Model registry -- atomic generation swap
// ---------------------------------------------------------------------------
//
// Holds the currently published model generation behind one
// `RwLock<Option<Arc<Model>>>`. Queries clone the `Arc` and then run
// lock-free against an immutable generation. A rebuild runs entirely off
// the lock and publishes with a single pointer swap, so no reader can see
// artifacts from two different generations. At most one build runs at a
// time; a failed build leaves the previous generation in place.
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::ModelConfig;
use crate::error::RecommendError;
use crate::model::{build, build_from_path, Model, ModelHandle};
use crate::types::{ModelStatus, RawArticle, RecommendOptions, RecommendationEntry};

#[derive(Debug, Default)]
pub struct ModelRegistry {
	current: RwLock<Option<ModelHandle>>,
	building: AtomicBool,
}

impl ModelRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// The published generation, or `ModelNotLoaded`.
	pub fn current(&self) -> Result<ModelHandle, RecommendError> {
		let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
		guard.clone().ok_or(RecommendError::ModelNotLoaded)
	}

	pub fn is_building(&self) -> bool {
		self.building.load(Ordering::SeqCst)
	}

	/// Stamp `model` with the generation after the published one and swap
	/// it in, returning the new handle and the one it replaced. Numbering
	/// happens under the write guard, so the installed generation is always
	/// the highest handed out.
	pub(crate) fn publish(&self, mut model: Model) -> (ModelHandle, Option<ModelHandle>) {
		let (handle, previous) = {
			let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
			model.generation = guard.as_ref().map_or(0, |m| m.generation()) + 1;
			let handle = Arc::new(model);
			let previous = guard.replace(Arc::clone(&handle));
			(handle, previous)
		};
		tracing::info!(
			generation = handle.generation(),
			replaced = previous.as_ref().map(|p| p.generation()),
			articles = handle.articles().len(),
			"Model generation published"
		);
		(handle, previous)
	}

	/// Reserve the single build slot. The slot is released when the ticket
	/// is dropped.
	pub fn try_begin_build(self: &Arc<Self>) -> Result<BuildTicket, RecommendError> {
		self.building
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.map_err(|_| RecommendError::BuildInProgress)?;
		Ok(BuildTicket {
			registry: Arc::clone(self),
		})
	}

	/// Build from raw rows and publish. Fails with `BuildInProgress` when
	/// another build holds the slot.
	pub fn rebuild(
		self: &Arc<Self>,
		rows: Vec<RawArticle>,
		config: &ModelConfig,
	) -> Result<ModelHandle, RecommendError> {
		self.try_begin_build()?.run(rows, config)
	}

	// ── Queries against the current generation ────────────────────────────

	pub fn recommend(
		&self,
		title: &str,
		options: &RecommendOptions,
	) -> Result<Vec<RecommendationEntry>, RecommendError> {
		self.current()?.recommend(title, options)
	}

	pub fn status(&self) -> ModelStatus {
		match self.current() {
			Ok(model) => model.status(),
			Err(_) => ModelStatus {
				loaded: false,
				generation: None,
				total_articles: 0,
				vocabulary_size: 0,
				topic_count: 0,
				build_millis: None,
			},
		}
	}
}

/// Exclusive right to build and publish one generation.
#[derive(Debug)]
pub struct BuildTicket {
	registry: Arc<ModelRegistry>,
}

impl BuildTicket {
	pub fn run(
		self,
		rows: Vec<RawArticle>,
		config: &ModelConfig,
	) -> Result<ModelHandle, RecommendError> {
		let model = build(rows, config).inspect_err(|e| {
			tracing::error!(code = e.code(), "Model build failed: {}", e);
		})?;
		Ok(self.registry.publish(model).0)
	}

	pub fn run_from_path(
		self,
		path: &std::path::Path,
		config: &ModelConfig,
	) -> Result<ModelHandle, RecommendError> {
		let model = build_from_path(path, config).inspect_err(|e| {
			tracing::error!(code = e.code(), path = %path.display(), "Model build failed: {}", e);
		})?;
		Ok(self.registry.publish(model).0)
	}
}

impl Drop for BuildTicket {
	fn drop(&mut self) {
		self.registry.building.store(false, Ordering::SeqCst);
	}
}
