//! Configuration file loading tests.

use std::io::Write;

use rover_common::config::{ConfigError, RobotConfig};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

#[test]
fn load_complete_file() {
    let file = write_config(
        r#"
[pid]
kp = 0.12
ki = 0.002
kd = 0.0005
min_output = -90.0
max_output = 90.0
sample_time_sec = 0.02
loop_hz = 50

[slew]
minimum_output = 0.0
maximum_output = 90.0
rate_limit_per_sec = 35.0

[geometry]
wheel_diameter_mm = 68.5
wheelbase_mm = 160.0
steps_per_rotation = 494.0

[travel]
accel_range_cm = 40.0
cruising_velocity = 30.0
targeting_velocity = 3.0

[cruise]
active_range_cm = 80.0
cruising_velocity = 30.0
tock_timeout = 6

[task]
join_timeout_sec = 1.5
retry_budget = 4

[clock]
tick_hz = 20
ticks_per_tock = 10
"#,
    );

    let config = RobotConfig::load(file.path()).unwrap();
    assert_eq!(config.pid.kp, 0.12);
    assert_eq!(config.pid.loop_hz, 50);
    assert_eq!(config.slew.rate_limit_per_sec, 35.0);
    assert_eq!(config.travel.accel_range_cm, 40.0);
    assert_eq!(config.cruise.tock_timeout, 6);
    assert_eq!(config.task.retry_budget, 4);
    assert_eq!(config.clock.ticks_per_tock, 10);
}

#[test]
fn missing_file_is_io_error() {
    let result = RobotConfig::load(std::path::Path::new("/nonexistent/rover.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn invalid_values_rejected_on_load() {
    let file = write_config("[geometry]\nwheel_diameter_mm = -1.0\n");
    let result = RobotConfig::load(file.path());
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}
