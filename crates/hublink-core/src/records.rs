//! Benchmark source rows and the cleaning step that produces them.
//!
//! The raw comparison dataset uses human-readable headers; cleaning assigns a
//! stable `row_id` in file order, renames the columns and coerces every
//! numeric cell. Cells that do not parse become `None` instead of failing the
//! load.

use crate::persist::read_csv;
use crate::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::info;

/// One row of the raw comparison dataset, as found on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSourceRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Provider")]
    pub provider: String,
    #[serde(rename = "Context Window", default, deserialize_with = "csv::invalid_option")]
    pub context_window: Option<f64>,
    #[serde(rename = "Speed (tokens/sec)", default, deserialize_with = "csv::invalid_option")]
    pub speed_tokens_per_sec: Option<f64>,
    #[serde(rename = "Latency (sec)", default, deserialize_with = "csv::invalid_option")]
    pub latency_sec: Option<f64>,
    #[serde(rename = "Benchmark (MMLU)", default, deserialize_with = "csv::invalid_option")]
    pub benchmark_mmlu: Option<f64>,
    #[serde(
        rename = "Benchmark (Chatbot Arena)",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub benchmark_chatbot_arena: Option<f64>,
    #[serde(rename = "Open-Source", default, deserialize_with = "lenient_flag")]
    pub open_source: Option<f64>,
    #[serde(
        rename = "Price / Million Tokens",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub price_per_million_tokens: Option<f64>,
    #[serde(
        rename = "Training Dataset Size",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub training_dataset_size: Option<f64>,
    #[serde(rename = "Compute Power", default, deserialize_with = "csv::invalid_option")]
    pub compute_power: Option<f64>,
    #[serde(rename = "Energy Efficiency", default, deserialize_with = "csv::invalid_option")]
    pub energy_efficiency: Option<f64>,
    #[serde(rename = "Quality Rating", default, deserialize_with = "csv::invalid_option")]
    pub quality_rating: Option<f64>,
    #[serde(rename = "Speed Rating", default, deserialize_with = "csv::invalid_option")]
    pub speed_rating: Option<f64>,
    #[serde(rename = "Price Rating", default, deserialize_with = "csv::invalid_option")]
    pub price_rating: Option<f64>,
}

/// A cleaned benchmark row. `row_id` is the join key for every later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub row_id: u64,
    pub model_name: String,
    pub provider: String,
    pub context_window: Option<f64>,
    pub speed_tokens_per_sec: Option<f64>,
    pub latency_sec: Option<f64>,
    pub benchmark_mmlu: Option<f64>,
    pub benchmark_chatbot_arena: Option<f64>,
    pub open_source: Option<f64>,
    pub price_per_million_tokens: Option<f64>,
    pub training_dataset_size: Option<f64>,
    pub compute_power: Option<f64>,
    pub energy_efficiency: Option<f64>,
    pub quality_rating: Option<f64>,
    pub speed_rating: Option<f64>,
    pub price_rating: Option<f64>,
}

impl SourceRecord {
    /// Build a record with only name and provider set.
    pub fn new(row_id: u64, model_name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            row_id,
            model_name: model_name.into(),
            provider: provider.into(),
            context_window: None,
            speed_tokens_per_sec: None,
            latency_sec: None,
            benchmark_mmlu: None,
            benchmark_chatbot_arena: None,
            open_source: None,
            price_per_million_tokens: None,
            training_dataset_size: None,
            compute_power: None,
            energy_efficiency: None,
            quality_rating: None,
            speed_rating: None,
            price_rating: None,
        }
    }

    fn from_raw(row_id: u64, raw: RawSourceRow) -> Self {
        Self {
            row_id,
            model_name: raw.model,
            provider: raw.provider,
            context_window: raw.context_window,
            speed_tokens_per_sec: raw.speed_tokens_per_sec,
            latency_sec: raw.latency_sec,
            benchmark_mmlu: raw.benchmark_mmlu,
            benchmark_chatbot_arena: raw.benchmark_chatbot_arena,
            open_source: raw.open_source,
            price_per_million_tokens: raw.price_per_million_tokens,
            training_dataset_size: raw.training_dataset_size,
            compute_power: raw.compute_power,
            energy_efficiency: raw.energy_efficiency,
            quality_rating: raw.quality_rating,
            speed_rating: raw.speed_rating,
            price_rating: raw.price_rating,
        }
    }
}

/// Load the raw dataset and assign row ids in file order.
pub fn clean_source(raw_csv: &Path) -> Result<Vec<SourceRecord>> {
    let raw: Vec<RawSourceRow> = read_csv(raw_csv)?;
    let records: Vec<SourceRecord> = raw
        .into_iter()
        .enumerate()
        .map(|(i, row)| SourceRecord::from_raw(i as u64, row))
        .collect();

    info!("Cleaned {} source rows from {}", records.len(), raw_csv.display());
    Ok(records)
}

/// Load previously cleaned records.
pub fn load_records(clean_csv: &Path) -> Result<Vec<SourceRecord>> {
    read_csv(clean_csv)
}

/// Parse an open-source flag: numbers pass through, `true/yes` → 1,
/// `false/no` → 0, anything else → `None`.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_flag(&s)))
}

fn parse_flag(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<f64>() {
        return Some(n);
    }
    match value.to_lowercase().as_str() {
        "true" | "yes" => Some(1.0),
        "false" | "no" => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "Model,Provider,Context Window,Speed (tokens/sec),Latency (sec),\
Benchmark (MMLU),Benchmark (Chatbot Arena),Open-Source,Price / Million Tokens,\
Training Dataset Size,Compute Power,Energy Efficiency,Quality Rating,Speed Rating,Price Rating";

    #[test]
    fn test_clean_assigns_row_ids_and_coerces() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("raw.csv");
        let body = format!(
            "{}\n\
Llama-3,Meta,128000,95,0.4,79,1200,1,0.5,15,100,0.8,8,7,9\n\
GPT-4o,OpenAI,n/a,80,,88,1300,0,5,,,,9,6,3\n",
            HEADER
        );
        std::fs::write(&path, body).unwrap();

        let records = clean_source(&path).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].row_id, 0);
        assert_eq!(records[0].model_name, "Llama-3");
        assert_eq!(records[0].context_window, Some(128000.0));
        assert_eq!(records[0].open_source, Some(1.0));

        assert_eq!(records[1].row_id, 1);
        assert_eq!(records[1].provider, "OpenAI");
        assert_eq!(records[1].context_window, None);
        assert_eq!(records[1].latency_sec, None);
        assert_eq!(records[1].benchmark_mmlu, Some(88.0));
        assert_eq!(records[1].open_source, Some(0.0));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(1.0));
        assert_eq!(parse_flag(" Yes "), Some(1.0));
        assert_eq!(parse_flag("false"), Some(0.0));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }
}
