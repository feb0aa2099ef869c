//! The run result as external tooling sees it.

use std::collections::HashMap;

use serde_json::json;

use crate::config::SimConfig;
use crate::system::System;

fn config_from(vars: &[(&str, &str)]) -> SimConfig {
    let vars = vars
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect::<HashMap<_, _>>();
    SimConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

#[test]
fn test_result_serializes_to_flat_json() {
    let config = config_from(&[
        ("TOYSSD_DIRECT_LINK", "true"),
        ("TOYSSD_WRITE_DELAY", "1"),
        ("TOYSSD_READ_DELAY", "2"),
        ("TOYSSD_WRITES_PER_ROUND", "2"),
        ("TOYSSD_READS_PER_ROUND", "3"),
    ]);
    let mut system = System::new(&config).unwrap();
    let result = system.run_workload().unwrap();

    assert_eq!(
        serde_json::to_value(result).unwrap(),
        json!({"writes": 2, "reads": 3, "elapsed_time": 8})
    );
}

#[test]
fn test_default_configuration_runs() {
    let mut system = System::new(&config_from(&[])).unwrap();
    let result = system.run_workload().unwrap();
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"writes":1,"reads":1,"elapsed_time":4}"#
    );
}
