//! Rendering of the pre-built chart manifests.

use super::{ChartError, ChartRelease};
use kube::api::DynamicObject;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const MANIFESTS_DIR: &str = "manifests";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("placeholder regex is valid")
});

#[derive(Debug, Deserialize)]
struct ChartMetadata {
    version: String,
}

fn read(path: &Path) -> Result<String, ChartError> {
    std::fs::read_to_string(path).map_err(|source| ChartError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Version declared in the chart's `Chart.yaml`
pub fn chart_version(chart_path: &Path) -> Result<String, ChartError> {
    let path = chart_path.join("Chart.yaml");
    let text = read(&path)?;
    let metadata: ChartMetadata =
        serde_yaml::from_str(&text).map_err(|e| ChartError::Manifest {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(metadata.version)
}

/// Manifest files of the chart, sorted by file name
fn manifest_files(chart_path: &Path) -> Result<Vec<PathBuf>, ChartError> {
    let dir = chart_path.join(MANIFESTS_DIR);
    let entries = std::fs::read_dir(&dir).map_err(|source| ChartError::Read {
        path: dir.display().to_string(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ChartError::Read {
                path: dir.display().to_string(),
                source,
            })?
            .path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Replace every `${flag}` in `text`; an unknown flag is an error
pub fn substitute(
    text: &str,
    flags: &BTreeMap<String, String>,
    file: &str,
) -> Result<String, ChartError> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .find(|flag| !flags.contains_key(flag))
    {
        return Err(ChartError::MissingFlag {
            file: file.to_string(),
            flag: missing,
        });
    }
    Ok(PLACEHOLDER
        .replace_all(text, |c: &Captures<'_>| {
            flags.get(&c[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}

/// Parse a multi-document YAML stream, skipping empty documents
pub fn parse_objects(text: &str, file: &str) -> Result<Vec<DynamicObject>, ChartError> {
    let invalid = |e: serde_yaml::Error| ChartError::Manifest {
        file: file.to_string(),
        message: e.to_string(),
    };
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document).map_err(invalid)?;
        if value.is_null() {
            continue;
        }
        let object: DynamicObject = serde_yaml::from_value(value).map_err(invalid)?;
        if object.types.is_none() || object.metadata.name.is_none() {
            return Err(ChartError::Manifest {
                file: file.to_string(),
                message: "object needs apiVersion, kind and metadata.name".to_string(),
            });
        }
        objects.push(object);
    }
    Ok(objects)
}

/// Render every manifest of `release` with its flags applied
pub fn render(release: &ChartRelease) -> Result<Vec<DynamicObject>, ChartError> {
    let mut objects = Vec::new();
    for path in manifest_files(&release.chart_path)? {
        let file = path.display().to_string();
        let text = substitute(&read(&path)?, &release.flags, &file)?;
        objects.extend(parse_objects(&text, &file)?);
    }
    Ok(objects)
}
