use crate::config::Config;
use crate::error::{LexicaError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_lexical(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_graph(config, &mut errors);
        Self::validate_authority(config, &mut errors);
        Self::validate_fusion(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LexicaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_lexical(config: &Config, errors: &mut Vec<ValidationError>) {
        if !(config.lexical.k1 > 0.0) {
            errors.push(ValidationError::new(
                "lexical.k1",
                format!("k1 must be positive, got {}", config.lexical.k1),
            ));
        }

        if !(0.0..=1.0).contains(&config.lexical.b) {
            errors.push(ValidationError::new(
                "lexical.b",
                format!("b must be between 0.0 and 1.0, got {}", config.lexical.b),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.dims == 0 {
            errors.push(ValidationError::new(
                "embedding.dims",
                "Embedding dimension must be greater than 0",
            ));
        }
    }

    fn validate_graph(config: &Config, errors: &mut Vec<ValidationError>) {
        let floor = config.graph.same_topic_min_cos;
        if !(-1.0..=1.0).contains(&floor) {
            errors.push(ValidationError::new(
                "graph.same_topic_min_cos",
                format!("Cosine floor must be between -1.0 and 1.0, got {}", floor),
            ));
        }
    }

    fn validate_authority(config: &Config, errors: &mut Vec<ValidationError>) {
        let alpha = config.authority.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            errors.push(ValidationError::new(
                "authority.alpha",
                format!("Teleport probability must be in (0, 1), got {}", alpha),
            ));
        }

        if !(config.authority.half_life_days > 0.0) {
            errors.push(ValidationError::new(
                "authority.half_life_days",
                "Half-life must be positive",
            ));
        }

        if config.authority.iterations == 0 {
            errors.push(ValidationError::new(
                "authority.iterations",
                "Iteration budget must be greater than 0",
            ));
        }
    }

    fn validate_fusion(config: &Config, errors: &mut Vec<ValidationError>) {
        let fusion = &config.fusion;

        if fusion.recall_depth == 0 {
            errors.push(ValidationError::new(
                "fusion.recall_depth",
                "Recall depth must be greater than 0",
            ));
        }

        if !(fusion.ppr_alpha > 0.0 && fusion.ppr_alpha < 1.0) {
            errors.push(ValidationError::new(
                "fusion.ppr_alpha",
                format!(
                    "Teleport probability must be in (0, 1), got {}",
                    fusion.ppr_alpha
                ),
            ));
        }

        if fusion.ppr_iterations == 0 {
            errors.push(ValidationError::new(
                "fusion.ppr_iterations",
                "Iteration budget must be greater than 0",
            ));
        }

        if fusion.beta < 0.0 || fusion.gamma < 0.0 {
            errors.push(ValidationError::new(
                "fusion.beta",
                "Seed exponents must be non-negative",
            ));
        }

        if !(fusion.freshness_half_life_days > 0.0) {
            errors.push(ValidationError::new(
                "fusion.freshness_half_life_days",
                "Half-life must be positive",
            ));
        }

        if fusion.snippet_chars == 0 {
            errors.push(ValidationError::new(
                "fusion.snippet_chars",
                "Snippet length must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_bm25_params() {
        let mut config = Config::default();
        config.lexical.k1 = 0.0;
        config.lexical.b = 1.5;

        match ConfigValidator::validate(&config) {
            Err(LexicaError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.path == "lexical.k1"));
                assert!(errors.iter().any(|e| e.path == "lexical.b"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_alpha() {
        let mut config = Config::default();
        config.authority.alpha = 1.0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_dims() {
        let mut config = Config::default();
        config.embedding.dims = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
