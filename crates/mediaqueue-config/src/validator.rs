//! Configuration validation.

use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Upper bound above which a per-queue worker count is flagged.
const HIGH_WORKER_COUNT: usize = 64;

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_queue(config, &mut result);
        Self::validate_retry(config, &mut result);
        Self::validate_worker(config, &mut result);
        Self::validate_queues(config, &mut result);

        result
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        if config.queue.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "queue.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if config.queue.connection.is_empty() {
            result.add_error(ValidationError::new(
                "queue.connection",
                "Connection label cannot be empty",
            ));
        }
    }

    fn validate_retry(config: &Config, result: &mut ValidationResult) {
        if config.retry.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "retry.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if config.retry.base_delay_ms == 0 && config.retry.max_jitter_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "retry",
                "Store retries have no delay and may hammer the database",
            ));
        }
    }

    fn validate_worker(config: &Config, result: &mut ValidationResult) {
        if config.worker.poll_interval_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "worker.poll_interval_ms",
                "poll_interval_ms is 0, idle workers will spin against the store",
            ));
        }
    }

    fn validate_queues(config: &Config, result: &mut ValidationResult) {
        if config.queues.is_empty() {
            result.add_warning(ValidationWarning::new(
                "queues",
                "No queues configured, no workers will be started",
            ));
        }

        for (name, count) in &config.queues {
            if name.is_empty() {
                result.add_error(ValidationError::new("queues", "Queue name cannot be empty"));
            }

            if *count > HIGH_WORKER_COUNT {
                result.add_warning(ValidationWarning::new(
                    format!("queues.{}", name),
                    format!("{} workers is very high (>{})", count, HIGH_WORKER_COUNT),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
