use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

pub fn map_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => file_input(path),
        (None, None) => bail!("either --text or --file is required"),
    }
}

pub fn file_input(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if !is_json(path) {
        return Ok(raw);
    }
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    match findings(&value) {
        Some(list) => {
            let first = list
                .first()
                .ok_or_else(|| anyhow!("{} contains no findings", path.display()))?;
            Ok(serde_json::to_string_pretty(first)?)
        }
        None => Ok(serde_json::to_string_pretty(&value)?),
    }
}

pub fn batch_items(inputs: &[PathBuf]) -> Result<Vec<String>> {
    let mut items = Vec::new();
    for input in inputs {
        let input_str = input.to_string_lossy();
        if input_str.contains('*') || input_str.contains('?') || input_str.contains('[') {
            let mut matched: Vec<PathBuf> = Vec::new();
            for entry in glob(&input_str)? {
                let path = entry?;
                if path.is_file() {
                    matched.push(path);
                }
            }
            for path in matched {
                items.push(file_input(&path)?);
            }
            continue;
        }
        let meta = fs::metadata(input)
            .with_context(|| format!("failed to inspect {}", input.display()))?;
        if meta.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                items.push(file_input(entry.path())?);
            }
        } else {
            let before = items.len();
            items.extend(split_file(input)?);
            debug!(path = %input.display(), items = items.len() - before, "read batch input");
        }
    }
    let items: Vec<String> = items
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect();
    if items.is_empty() {
        bail!("no batch items found in the given inputs");
    }
    Ok(items)
}

fn split_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if !is_json(path) {
        return Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect());
    }
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    let elements = match (findings(&value), &value) {
        (Some(list), _) => list.iter().collect::<Vec<_>>(),
        (None, Value::Array(list)) => list.iter().collect(),
        (None, other) => vec![other],
    };
    elements.into_iter().map(json_item).collect()
}

fn json_item(value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string_pretty(other)?),
    }
}

fn findings(value: &Value) -> Option<&Vec<Value>> {
    value.get("Findings").and_then(Value::as_array)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
