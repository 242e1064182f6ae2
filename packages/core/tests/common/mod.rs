//! Shared helpers for the integration suites

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. `RUST_LOG` overrides
/// the default `cryptoframe=debug` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cryptoframe=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap_or_else(|e| panic!("bad hex {s:?}: {e}"))
}

/// One vector record: `KEY: value` pairs in file order.
#[derive(Debug, Default)]
pub struct Record {
    pub line: usize,
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, key: &str) -> &str {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("record at line {} has no {key}", self.line))
    }

    pub fn bytes(&self, key: &str) -> Vec<u8> {
        unhex(self.get(key))
    }
}

/// Parse blank-line separated records; `#` starts a comment line.
pub fn parse_records(text: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            if !current.fields.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .unwrap_or_else(|| panic!("line {}: expected KEY: value", idx + 1));
        if current.fields.is_empty() {
            current.line = idx + 1;
        }
        current.fields.push((key.trim().to_string(), value.trim().to_string()));
    }
    if !current.fields.is_empty() {
        records.push(current);
    }
    records
}
