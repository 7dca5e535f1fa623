// ---------------------------------------------------------------------------
// NewsServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Presentation shell over the model registry. Reads JSON-RPC 2.0 requests
// (NDJSON over stdin), routes them through `dispatch()` to free-standing
// handler functions, and translates `RecommendError` kinds into JSON-RPC
// errors. `model/build` runs on a background thread; the registry keeps
// serving the previous generation until the new one is published.
// ---------------------------------------------------------------------------

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::ValueEnum;
use serde::Deserialize;

use crate::config::{ModelConfig, Preset};
use crate::error::RecommendError;
use crate::model::{Model, DEFAULT_SEARCH_LIMIT};
use crate::protocol::*;
use crate::registry::ModelRegistry;
use crate::transport::NdjsonTransport;
use crate::types::{Category, RecommendOptions, Sentiment};

const DEFAULT_RECOMMENDATION_COUNT: i64 = 5;
const SUMMARY_DISPLAY_CHARS: usize = 200;
const DEFAULT_TOPIC_TERMS: usize = 10;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct ServerConfig {
	/// Corpus used by `model/build` when the request names none.
	pub corpus: Option<PathBuf>,
	pub model: ModelConfig,
}

pub struct NewsServer<W> {
	transport: NdjsonTransport<W>,
	registry: Arc<ModelRegistry>,
	config: ServerConfig,
}

impl<W: Write + Send + 'static> NewsServer<W> {
	pub fn new(
		config: ServerConfig,
		registry: Arc<ModelRegistry>,
		transport: NdjsonTransport<W>,
	) -> Self {
		Self {
			transport,
			registry,
			config,
		}
	}

	/// Main loop over stdin.
	pub fn run(&mut self) -> io::Result<()> {
		self.serve(io::stdin().lock())
	}

	/// Read JSON-RPC messages line by line and dispatch them. Returns once
	/// input ends or the client stops reading our output.
	pub fn serve<R: BufRead>(&mut self, reader: R) -> io::Result<()> {
		for line_result in reader.lines() {
			let line = line_result?;
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			match self.dispatch(request) {
				Ok(()) => {}
				Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
					tracing::info!("Output closed by client, stopping");
					return Ok(());
				}
				Err(e) => return Err(e),
			}
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) -> io::Result<()> {
		let id = req.id;
		tracing::debug!(id, method = %req.method, "Request");

		let result = match req.method.as_str() {
			// -- Model ---------------------------------------------------
			"model/status" => to_value(self.registry.status()),
			"model/build" => self.handle_build(req.params),
			"model/topics" => self.with_model(|m| handle_topics(m, req.params)),

			// -- Articles ------------------------------------------------
			"articles/list" => {
				self.with_model(|m| Ok(serde_json::json!({ "articles": m.titles() })))
			}
			"articles/search" => self.with_model(|m| handle_search(m, req.params)),
			"articles/categories" => self.with_model(|m| {
				Ok(serde_json::json!({ "categories": m.category_histogram() }))
			}),
			"articles/sentiments" => self.with_model(|m| {
				Ok(serde_json::json!({ "sentiments": m.sentiment_histogram() }))
			}),

			// -- Recommendation ------------------------------------------
			"recommend" => self.with_model(|m| handle_recommend(m, req.params)),

			// -- Unknown -------------------------------------------------
			_ => {
				return self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				let code = match &e {
					RecommendError::InvalidParams(_) => INVALID_PARAMS,
					RecommendError::Inconsistent(_) => INTERNAL_ERROR,
					_ => NEWSREC_ERROR,
				};
				self.transport
					.write_error(id, code, e.to_string(), Some(e.to_json_rpc_error()))
			}
		}
	}

	// ── Model access ──────────────────────────────────────────────────────

	/// Run `f` against the current generation. The handle is held for the
	/// whole request, so a concurrent publish cannot change it midway.
	fn with_model<F>(&self, f: F) -> Result<serde_json::Value, RecommendError>
	where
		F: FnOnce(&Model) -> Result<serde_json::Value, RecommendError>,
	{
		let model = self.registry.current()?;
		f(&model)
	}

	// ── Build ─────────────────────────────────────────────────────────────

	fn handle_build(&self, params: serde_json::Value) -> Result<serde_json::Value, RecommendError> {
		let p: BuildParams = parse_params(params)?;

		let path = p
			.corpus_path
			.map(PathBuf::from)
			.or_else(|| self.config.corpus.clone())
			.ok_or_else(|| {
				RecommendError::InvalidParams("corpusPath is required: no default corpus".into())
			})?;
		let config = match p.preset.as_deref() {
			Some(name) => ModelConfig::preset(parse_preset(name)?),
			None => self.config.model.clone(),
		};
		config.validate()?;

		let ticket = self.registry.try_begin_build()?;
		let transport = self.transport.clone();
		let corpus = path.clone();
		tracing::info!(corpus = %path.display(), "Background model build started");

		thread::spawn(move || {
			let sent = match ticket.run_from_path(&corpus, &config) {
				Ok(model) => transport.write_notification(
					"model/built",
					serde_json::json!({
						"generation": model.generation(),
						"totalArticles": model.articles().len(),
						"buildMillis": model.build_duration().as_millis() as u64,
					}),
				),
				Err(e) => transport.write_notification("model/buildFailed", e.to_json_rpc_error()),
			};
			if let Err(e) = sent {
				tracing::warn!("Build notification not delivered: {}", e);
			}
		});

		Ok(serde_json::json!({
			"started": true,
			"corpusPath": path.display().to_string(),
		}))
	}
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, RecommendError> {
	// Methods without params may send null.
	let params = if params.is_null() {
		serde_json::json!({})
	} else {
		params
	};
	serde_json::from_value(params).map_err(|e| RecommendError::InvalidParams(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<serde_json::Value, RecommendError> {
	serde_json::to_value(value)
		.map_err(|e| RecommendError::Inconsistent(format!("unserializable result: {}", e)))
}

fn parse_preset(name: &str) -> Result<Preset, RecommendError> {
	Preset::from_str(name, true)
		.map_err(|_| RecommendError::InvalidParams(format!("unknown preset: {}", name)))
}

/// `None` and `"all"` mean no filter on that axis.
fn parse_filter<T>(label: Option<&str>) -> Result<Option<T>, RecommendError>
where
	T: std::str::FromStr<Err = RecommendError>,
{
	match label {
		None => Ok(None),
		Some(l) if l.trim().eq_ignore_ascii_case("all") => Ok(None),
		Some(l) => l.parse().map(Some),
	}
}

fn display_summary(summary: &str) -> String {
	match summary.char_indices().nth(SUMMARY_DISPLAY_CHARS) {
		Some((byte, _)) => format!("{}...", &summary[..byte]),
		None => summary.to_string(),
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildParams {
	corpus_path: Option<String>,
	preset: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
	query: String,
	limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendParams {
	title: String,
	count: Option<i64>,
	category: Option<String>,
	sentiment: Option<String>,
	min_similarity: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicsParams {
	top_terms: Option<usize>,
}

// ---------------------------------------------------------------------------
// Free-standing handler functions
// ---------------------------------------------------------------------------

fn handle_recommend(
	model: &Model,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: RecommendParams = parse_params(params)?;
	if p.title.trim().is_empty() {
		return Err(RecommendError::InvalidParams("title is required".into()));
	}

	let options = RecommendOptions {
		// Non-positive counts yield an empty list.
		count: p.count.unwrap_or(DEFAULT_RECOMMENDATION_COUNT).max(0) as usize,
		category: parse_filter::<Category>(p.category.as_deref())?,
		sentiment: parse_filter::<Sentiment>(p.sentiment.as_deref())?,
		min_similarity: p.min_similarity,
	};

	let original = model.article(&p.title)?;
	let recommendations: Vec<serde_json::Value> = model
		.recommend(&p.title, &options)?
		.into_iter()
		.map(|mut entry| {
			entry.summary = display_summary(&entry.summary);
			to_value(entry)
		})
		.collect::<Result<_, _>>()?;

	Ok(serde_json::json!({
		"originalArticle": {
			"title": original.title,
			"link": original.link,
			"summary": display_summary(&original.summary),
			"category": original.category,
			"sentiment": original.sentiment,
			"readingTime": original.reading_time,
		},
		"recommendations": recommendations,
	}))
}

fn handle_search(
	model: &Model,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: SearchParams = parse_params(params)?;
	let articles: Vec<serde_json::Value> = model
		.search_titles(&p.query, p.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
		.into_iter()
		.map(|a| {
			serde_json::json!({
				"title": a.title,
				"summary": display_summary(&a.summary),
				"link": a.link,
			})
		})
		.collect();
	Ok(serde_json::json!({ "articles": articles }))
}

fn handle_topics(
	model: &Model,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: TopicsParams = parse_params(params)?;
	let n = p.top_terms.unwrap_or(DEFAULT_TOPIC_TERMS);
	let topics: Vec<serde_json::Value> = (0..model.topics().topic_count())
		.map(|topic| {
			let terms: Vec<serde_json::Value> = model
				.topic_terms(topic, n)
				.into_iter()
				.map(|(term, weight)| serde_json::json!({ "term": term, "weight": weight }))
				.collect();
			serde_json::json!({ "topic": topic, "terms": terms })
		})
		.collect();
	Ok(serde_json::json!({
		"topics": topics,
		"iterations": model.topics().iterations(),
		"reconstructionError": model.topics().reconstruction_error(),
	}))
}
