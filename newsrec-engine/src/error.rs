use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendError {
	#[error("Data unavailable: {0}")]
	DataUnavailable(String),
	#[error("Model not loaded: build a model generation first")]
	ModelNotLoaded,
	#[error("Article not found: {0}")]
	ArticleNotFound(String),
	#[error("Invalid params: {0}")]
	InvalidParams(String),
	#[error("A model build is already in progress")]
	BuildInProgress,
	#[error("Inconsistent model generation: {0}")]
	Inconsistent(String),
}

impl RecommendError {
	pub fn code(&self) -> &str {
		match self {
			Self::DataUnavailable(_) => "NEWSREC_DATA_UNAVAILABLE",
			Self::ModelNotLoaded => "NEWSREC_MODEL_NOT_LOADED",
			Self::ArticleNotFound(_) => "NEWSREC_ARTICLE_NOT_FOUND",
			Self::InvalidParams(_) => "NEWSREC_INVALID_PARAMS",
			Self::BuildInProgress => "NEWSREC_BUILD_IN_PROGRESS",
			Self::Inconsistent(_) => "NEWSREC_INCONSISTENT",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"newsrecCode": self.code(),
			"message": self.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_distinct_per_kind() {
		let errors = [
			RecommendError::DataUnavailable("x".into()),
			RecommendError::ModelNotLoaded,
			RecommendError::ArticleNotFound("x".into()),
			RecommendError::InvalidParams("x".into()),
			RecommendError::BuildInProgress,
			RecommendError::Inconsistent("x".into()),
		];
		let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
		codes.sort();
		codes.dedup();
		assert_eq!(codes.len(), errors.len());
	}

	#[test]
	fn json_rpc_error_carries_code_and_message() {
		let err = RecommendError::ArticleNotFound("Missing Title".into());
		let value = err.to_json_rpc_error();
		assert_eq!(value["newsrecCode"], "NEWSREC_ARTICLE_NOT_FOUND");
		assert_eq!(value["message"], "Article not found: Missing Title");
	}
}
