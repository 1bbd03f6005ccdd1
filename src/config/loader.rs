use crate::config::schema::{MonitorConfig, SinkConfig};
use crate::error::{Error, Result};
use crate::sink::{console::ConsoleSink, csv::CsvSink, json::JsonSink, SnapshotSink};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MonitorConfig> {
        let path = path.as_ref();
        let mut visited = HashSet::new();
        Self::load_with_inheritance(path, &mut visited, false)
    }

    fn load_with_inheritance(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        is_parent_load: bool,
    ) -> Result<MonitorConfig> {
        let path = fs::canonicalize(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        if visited.contains(&path) {
            return Err(Error::Config(format!(
                "Circular inheritance detected involving {}",
                path.display()
            )));
        }
        visited.insert(path.clone());

        let config = Self::load_file(&path)?;

        let final_config = if let Some(parent_path_str) = &config.extends {
            let parent_path = path
                .parent()
                .ok_or_else(|| {
                    Error::Config(format!(
                        "Cannot determine parent directory for {}",
                        path.display()
                    ))
                })?
                .join(parent_path_str);

            let parent_config = Self::load_with_inheritance(&parent_path, visited, true)?;
            Self::merge_configs(parent_config, config)
        } else {
            config
        };

        if !is_parent_load {
            validator::Validate::validate(&final_config)?;
        }

        Ok(final_config)
    }

    fn load_file(path: &Path) -> Result<MonitorConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let config: MonitorConfig = serde_json::from_str(&content)?;
                Ok(config)
            }
            Some("yaml") | Some("yml") => {
                let config: MonitorConfig = serde_yaml::from_str(&content)?;
                Ok(config)
            }
            Some("toml") => {
                let config: MonitorConfig = toml::from_str(&content)?;
                Ok(config)
            }
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    fn merge_configs(mut parent: MonitorConfig, child: MonitorConfig) -> MonitorConfig {
        let defaults = MonitorConfig::default();

        if child.nav_debounce_ms != defaults.nav_debounce_ms {
            parent.nav_debounce_ms = child.nav_debounce_ms;
        }
        if child.nav_max_wait_ms != defaults.nav_max_wait_ms {
            parent.nav_max_wait_ms = child.nav_max_wait_ms;
        }
        if child.mutation_coalesce_ms != defaults.mutation_coalesce_ms {
            parent.mutation_coalesce_ms = child.mutation_coalesce_ms;
        }
        if child.mutation_max_coalesce_ms != defaults.mutation_max_coalesce_ms {
            parent.mutation_max_coalesce_ms = child.mutation_max_coalesce_ms;
        }
        if child.recollect_debounce_ms != defaults.recollect_debounce_ms {
            parent.recollect_debounce_ms = child.recollect_debounce_ms;
        }
        if child.min_mutation_nodes != defaults.min_mutation_nodes {
            parent.min_mutation_nodes = child.min_mutation_nodes;
        }
        if child.min_paintable_area_px != defaults.min_paintable_area_px {
            parent.min_paintable_area_px = child.min_paintable_area_px;
        }
        if child.root_depth != defaults.root_depth {
            parent.root_depth = child.root_depth;
        }
        if child.root_churn_ratio != defaults.root_churn_ratio {
            parent.root_churn_ratio = child.root_churn_ratio;
        }
        if child.nav_min_nodes != defaults.nav_min_nodes {
            parent.nav_min_nodes = child.nav_min_nodes;
        }
        if child.output.is_some() {
            parent.output = child.output;
        }

        parent.extends = None;
        parent
    }

    pub fn create_sink(
        config: &MonitorConfig,
        multi: Option<Arc<indicatif::MultiProgress>>,
    ) -> Result<Box<dyn SnapshotSink>> {
        let sink: Box<dyn SnapshotSink> = match &config.output {
            Some(SinkConfig::Json { path }) => Box::new(JsonSink::new(PathBuf::from(path))?),
            Some(SinkConfig::Csv { path }) => Box::new(CsvSink::new(PathBuf::from(path))?),
            Some(SinkConfig::Console) | None => Box::new(ConsoleSink::new(multi)),
        };
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_yaml_with_defaults_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "monitor.yaml", "nav_debounce_ms: 250\n");
        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.nav_debounce_ms, 250.0);
        assert_eq!(config.recollect_debounce_ms, 500.0);
    }

    #[test]
    fn loads_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = write_file(dir.path(), "monitor.toml", "min_mutation_nodes = 9\n");
        assert_eq!(ConfigLoader::load(&toml_path).unwrap().min_mutation_nodes, 9);

        let json_path = write_file(dir.path(), "monitor.json", r#"{"root_churn_ratio": 0.7}"#);
        assert_eq!(ConfigLoader::load(&json_path).unwrap().root_churn_ratio, 0.7);
    }

    #[test]
    fn child_overrides_parent_via_extends() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "base.yaml", "nav_debounce_ms: 150\nnav_min_nodes: 40\n");
        let child = write_file(
            dir.path(),
            "site.yaml",
            "extends: base.yaml\nnav_min_nodes: 60\n",
        );
        let config = ConfigLoader::load(&child).unwrap();
        assert_eq!(config.nav_debounce_ms, 150.0, "inherited");
        assert_eq!(config.nav_min_nodes, 60, "overridden");
        assert!(config.extends.is_none());
    }

    #[test]
    fn circular_inheritance_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.yaml", "extends: b.yaml\n");
        let b = write_file(dir.path(), "b.yaml", "extends: a.yaml\n");
        let err = ConfigLoader::load(&b).unwrap_err();
        assert!(err.to_string().contains("Circular inheritance"));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.yaml", "nav_debounce_ms: 1\n");
        assert!(matches!(ConfigLoader::load(&path), Err(Error::Validation(_))));
    }
}
