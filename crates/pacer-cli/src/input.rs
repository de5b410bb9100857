use anyhow::{Context, Result};
use pacer_lib::DetectionConfig;
use std::{
    io::{self, Read},
    path::Path,
};

/// Parse newline-delimited floating point samples, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Samples from `input`, or from stdin when no path is given.
pub fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_f64_series(&text)
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read samples from stdin")?;
            parse_f64_series(&buf)
        }
    }
}

/// Load a TOML detection config. Omitted keys take their defaults.
pub fn load_config(path: &Path) -> Result<DetectionConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
}
