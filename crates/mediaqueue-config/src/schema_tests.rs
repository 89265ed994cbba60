use super::*;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.connection, "database");
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.worker.poll_interval_ms, 1000);
    assert_eq!(config.queues.get("default"), Some(&1));
    assert!(!config.database.in_memory);
    assert!(config.database.path.ends_with("queue.db"));
}

#[test]
fn test_durations() {
    let worker = WorkerConfig {
        poll_interval_ms: 10,
        cycle_pause_ms: 20,
        ramp_up_delay_ms: 30,
    };
    assert_eq!(worker.poll_interval(), Duration::from_millis(10));
    assert_eq!(worker.cycle_pause(), Duration::from_millis(20));
    assert_eq!(worker.ramp_up_delay(), Duration::from_millis(30));

    let retry = RetryConfig {
        max_attempts: 2,
        base_delay_ms: 5,
        max_jitter_ms: 7,
    };
    assert_eq!(retry.base_delay(), Duration::from_millis(5));
    assert_eq!(retry.max_jitter(), Duration::from_millis(7));
}

#[test]
fn test_partial_sections_keep_defaults() {
    let config: Config = toml::from_str(
        r#"
        [queue]
        max_attempts = 5

        [retry]
        base_delay_ms = 50
        "#,
    )
    .unwrap();

    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.connection, "database");
    assert_eq!(config.retry.base_delay_ms, 50);
    assert_eq!(config.retry.max_jitter_ms, 300);
}

#[test]
fn test_config_roundtrip() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.queues, config.queues);
    assert_eq!(parsed.worker.cycle_pause_ms, config.worker.cycle_pause_ms);
}
