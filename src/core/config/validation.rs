use super::settings::AppConfig;
use super::ConfigError;

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let rag = &config.rag;
    validate_range("rag.chunk_size", rag.chunk_size as u64, 1, 1_000_000)?;
    if rag.chunk_overlap >= rag.chunk_size {
        return Err(invalid(
            "rag.chunk_overlap",
            format!("must be smaller than rag.chunk_size ({})", rag.chunk_size),
        ));
    }
    validate_range("rag.max_history", rag.max_history as u64, 0, 1_000)?;

    let llm = &config.llm;
    validate_non_empty("llm.model", &llm.model)?;
    validate_url("llm.base_url", &llm.base_url)?;
    validate_range("llm.max_tokens", llm.max_tokens as u64, 1, 200_000)?;
    validate_range("llm.max_tool_rounds", llm.max_tool_rounds as u64, 0, 16)?;
    validate_range("llm.timeout_secs", llm.timeout_secs, 1, 3_600)?;
    validate_range("llm.max_retries", llm.max_retries as u64, 0, 10)?;
    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(invalid("llm.temperature", "must be between 0 and 1"));
    }

    let embedding = &config.embedding;
    validate_url("embedding.base_url", &embedding.base_url)?;
    validate_non_empty("embedding.model", &embedding.model)?;
    validate_range("embedding.batch_size", embedding.batch_size as u64, 1, 4_096)?;
    validate_range("embedding.timeout_secs", embedding.timeout_secs, 1, 3_600)?;

    let store = &config.vector_store;
    validate_url("vector_store.chroma_url", &store.chroma_url)?;
    validate_range("vector_store.max_results", store.max_results as u64, 1, 100)?;
    if !(0.0..=1.0).contains(&store.course_match_threshold) {
        return Err(invalid(
            "vector_store.course_match_threshold",
            "must be between 0 and 1",
        ));
    }

    validate_range(
        "documents.load_concurrency",
        config.documents.load_concurrency as u64,
        1,
        64,
    )?;

    for (index, origin) in config.server.cors_allowed_origins.iter().enumerate() {
        if origin.trim().is_empty() {
            return Err(invalid(
                &format!("server.cors_allowed_origins[{}]", index),
                "value cannot be empty",
            ));
        }
    }

    Ok(())
}

fn validate_range(path: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_non_empty(path: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(path, "value cannot be empty"));
    }
    Ok(())
}

fn validate_url(path: &str, value: &str) -> Result<(), ConfigError> {
    validate_non_empty(path, value)?;
    match reqwest::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(_) => Err(invalid(path, "only http/https URLs are supported")),
        Err(e) => Err(invalid(path, e.to_string())),
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = AppConfig::default();
        config.rag.chunk_overlap = config.rag.chunk_size;

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref path, .. } if path == "rag.chunk_overlap"
        ));
    }

    #[test]
    fn rejects_non_http_urls() {
        let mut config = AppConfig::default();
        config.vector_store.chroma_url = "ftp://example.com".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("vector_store.chroma_url"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.vector_store.course_match_threshold = 1.5;
        assert!(validate_config(&config).is_err());
    }
}
