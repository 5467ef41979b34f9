//! Descriptor parsing - one file, or a directory of files merged together.

use super::Topology;
use reconcile::{Error, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Descriptor formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a descriptor file or every descriptor directly inside a directory.
pub fn parse_path(path: &Path) -> Result<Topology> {
    if !path.exists() {
        return Err(Error::config(format!(
            "topology path not found: {}",
            path.display()
        )));
    }

    if path.is_dir() {
        return parse_dir(path);
    }

    let format = Format::from_path(path).ok_or_else(|| Error::Descriptor {
        path: path.to_path_buf(),
        message: "unsupported extension (expected .yaml, .yml, .toml or .json)".to_string(),
    })?;
    parse_file(path, format)
}

fn parse_file(path: &Path, format: Format) -> Result<Topology> {
    let content = fs::read_to_string(path).map_err(|e| descriptor_error(path, e))?;
    let topology = parse_str(&content, format).map_err(|message| Error::Descriptor {
        path: path.to_path_buf(),
        message,
    })?;

    log::debug!(
        "Parsed {} with {} projects",
        path.display(),
        topology.projects.len()
    );
    Ok(topology)
}

/// Parse descriptor text in the given format.
pub fn parse_str(content: &str, format: Format) -> std::result::Result<Topology, String> {
    match format {
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    }
}

fn parse_dir(dir: &Path) -> Result<Topology> {
    let mut merged: Option<Topology> = None;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| descriptor_error(dir, e))?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }
        let Some(format) = Format::from_path(path) else {
            log::debug!("Skipping non-descriptor file {}", path.display());
            continue;
        };

        let topology = parse_file(path, format)?;
        merged = Some(match merged {
            None => topology,
            Some(acc) => merge(acc, topology, path)?,
        });
    }

    merged.ok_or_else(|| Error::Descriptor {
        path: dir.to_path_buf(),
        message: "directory contains no descriptor files".to_string(),
    })
}

fn merge(mut acc: Topology, next: Topology, path: &Path) -> Result<Topology> {
    if acc.context != next.context {
        return Err(Error::Descriptor {
            path: path.to_path_buf(),
            message: format!(
                "context '{}' does not match '{}' declared by earlier descriptors",
                next.context, acc.context
            ),
        });
    }
    if acc.source != next.source {
        return Err(Error::Descriptor {
            path: path.to_path_buf(),
            message: "source does not match earlier descriptors".to_string(),
        });
    }

    acc.projects.extend(next.projects);
    Ok(acc)
}

fn descriptor_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Descriptor {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_parse_yaml_fixture() {
        let topology = parse_path(&fixture("descriptor.yaml")).unwrap();

        assert_eq!(topology.context, "contextOrg");
        assert_eq!(topology.source.as_deref(), Some("source"));
        assert_eq!(topology.projects.len(), 2);

        let foo = &topology.projects[0];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.consumers.len(), 2);
        assert_eq!(foo.producers.len(), 1);
        assert_eq!(foo.topics[0].partitions, Some(3));
        assert_eq!(foo.topics[0].config["retention.ms"], "3600000");
    }

    #[test]
    fn test_parse_directory_merges_projects() {
        let topology = parse_path(&fixture("dir")).unwrap();
        assert_eq!(topology.projects.len(), 4);

        let names: Vec<_> = topology.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bar", "baz", "foo", "qux"]);
    }

    #[test]
    fn test_parse_toml_and_json() {
        let toml = parse_str(
            "context = \"ctx\"\n[[projects]]\nname = \"p\"\n[[projects.topics]]\nname = \"t\"\npartitions = 1\n",
            Format::Toml,
        )
        .unwrap();
        assert_eq!(toml.projects[0].topics[0].partitions, Some(1));

        let json = parse_str(r#"{"context": "ctx", "projects": []}"#, Format::Json).unwrap();
        assert!(json.projects.is_empty());
    }

    #[test]
    fn test_missing_path_is_config_error() {
        let err = parse_path(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topology.txt");
        fs::write(&path, "context: ctx").unwrap();

        assert!(matches!(
            parse_path(&path),
            Err(Error::Descriptor { .. })
        ));
    }

    #[test]
    fn test_directory_context_mismatch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "context: one\nprojects: []\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "context: two\nprojects: []\n").unwrap();

        let err = parse_path(dir.path()).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "notes").unwrap();
        assert!(matches!(
            parse_path(dir.path()),
            Err(Error::Descriptor { .. })
        ));
    }

    #[test]
    fn test_malformed_descriptor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "context: [unterminated").unwrap();

        let err = parse_path(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
