use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::RecommendError;

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Which duplicate rows the normalizer drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
	/// Drop repeated titles, then repeated summaries, then repeated texts.
	/// Content-level duplicates are dropped even when titles differ.
	#[default]
	Content,
	/// Drop repeated titles only.
	TitleOnly,
	/// Keep every row. Later rows sharing a title stay in the corpus but
	/// are unreachable through the title index.
	KeepAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
	/// Whole corpus, all text fields, 20 topics.
	Full,
	/// Memory-constrained: capped corpus and vocabulary, 5 topics. The
	/// composite text is title plus the first 500 summary characters, with
	/// keywords and body text left out.
	Compact,
}

/// Unified configuration for one model build and the queries against it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
	pub max_corpus_rows: Option<usize>,
	pub max_features: Option<usize>,
	pub min_document_frequency: usize,
	pub max_document_frequency_fraction: f64,
	pub topic_count: usize,
	pub summary_truncation_length: Option<usize>,
	pub text_truncation_length: Option<usize>,
	/// Whether the keywords field is part of the composite text. Keywords
	/// drive the category label either way.
	pub include_keywords: bool,
	pub dedup_policy: DedupPolicy,
	pub nmf_max_iterations: usize,
	pub nmf_tolerance: f64,
	pub seed: u64,
	/// Candidate window for filtered queries, as a multiple of the
	/// requested count. `None` scans the full similarity row.
	pub overfetch_factor: Option<usize>,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			max_corpus_rows: None,
			max_features: None,
			min_document_frequency: 1,
			max_document_frequency_fraction: 1.0,
			topic_count: 20,
			summary_truncation_length: None,
			text_truncation_length: None,
			include_keywords: true,
			dedup_policy: DedupPolicy::Content,
			nmf_max_iterations: 200,
			nmf_tolerance: 1e-4,
			seed: 42,
			overfetch_factor: Some(10),
		}
	}
}

impl ModelConfig {
	pub fn preset(preset: Preset) -> Self {
		match preset {
			Preset::Full => Self::default(),
			Preset::Compact => Self {
				max_corpus_rows: Some(1000),
				max_features: Some(2000),
				min_document_frequency: 3,
				max_document_frequency_fraction: 0.9,
				topic_count: 5,
				summary_truncation_length: Some(500),
				text_truncation_length: Some(0),
				include_keywords: false,
				dedup_policy: DedupPolicy::TitleOnly,
				..Self::default()
			},
		}
	}

	pub fn validate(&self) -> Result<(), RecommendError> {
		if self.topic_count == 0 {
			return Err(RecommendError::InvalidParams(
				"topic_count must be at least 1".into(),
			));
		}
		if !(self.max_document_frequency_fraction > 0.0
			&& self.max_document_frequency_fraction <= 1.0)
		{
			return Err(RecommendError::InvalidParams(format!(
				"max_document_frequency_fraction must be in (0, 1], got {}",
				self.max_document_frequency_fraction
			)));
		}
		if self.min_document_frequency == 0 {
			return Err(RecommendError::InvalidParams(
				"min_document_frequency must be at least 1".into(),
			));
		}
		if self.max_features == Some(0) {
			return Err(RecommendError::InvalidParams(
				"max_features must be at least 1 when set".into(),
			));
		}
		if self.overfetch_factor == Some(0) {
			return Err(RecommendError::InvalidParams(
				"overfetch_factor must be at least 1 when set".into(),
			));
		}
		Ok(())
	}
}

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "newsrec-engine", about = "Content-based news recommendation server over JSON-RPC")]
pub struct CliArgs {
	/// CSV corpus to build the initial model generation from
	#[arg(long, env = "NEWSREC_CORPUS")]
	pub corpus: Option<PathBuf>,

	/// Pipeline preset
	#[arg(long, value_enum, default_value = "full", env = "NEWSREC_PRESET")]
	pub preset: Preset,

	/// Override the number of NMF topics
	#[arg(long)]
	pub topics: Option<usize>,

	/// Override the vocabulary cap
	#[arg(long)]
	pub max_features: Option<usize>,

	/// Seed for the factorization initialization
	#[arg(long)]
	pub seed: Option<u64>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "info", env = "NEWSREC_LOG_LEVEL")]
	pub log_level: String,
}

impl CliArgs {
	/// Preset with command-line overrides applied.
	pub fn model_config(&self) -> ModelConfig {
		let mut config = ModelConfig::preset(self.preset);
		if let Some(topics) = self.topics {
			config.topic_count = topics;
		}
		if let Some(max_features) = self.max_features {
			config.max_features = Some(max_features);
		}
		if let Some(seed) = self.seed {
			config.seed = seed;
		}
		config
	}
}
