use std::path::Path;

use mediaqueue_config::{ConfigLoader, ConfigValidator};

#[test]
fn test_shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
    let config = ConfigLoader::load(&path).unwrap();

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid(), "errors: {:?}", result.errors);
    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);

    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queues.get("encoder"), Some(&2));
    assert_eq!(config.retry.base_delay_ms, 200);
}
