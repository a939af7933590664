use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LabelMapError {
    #[error("Failed to read label map: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse label map: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Label map must be a mapping or a list of labels")]
    NotAMapping,
    #[error("Invalid class index {0:?}")]
    InvalidKey(String),
    #[error("Label for class {0} is not a string")]
    InvalidLabel(usize),
    #[error("Label map has no entry for class {0}")]
    MissingClass(usize),
}

/// Class index to human label. Index 1 is the positive class of a sigmoid head.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabelMap {
    labels: BTreeMap<usize, String>,
}

impl Default for ClassLabelMap {
    fn default() -> Self {
        Self {
            labels: BTreeMap::from([(0, "Bad".to_string()), (1, "Good".to_string())]),
        }
    }
}

impl ClassLabelMap {
    pub const NEGATIVE: usize = 0;
    pub const POSITIVE: usize = 1;

    /// Reads the side file if it exists, otherwise falls back to `{0: Bad, 1: Good}`.
    pub fn load_or_default(path: &Path) -> Result<Self, LabelMapError> {
        if !path.exists() {
            log::info!(
                "No label map at {}, using default class names",
                path.display()
            );
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let map = Self::parse(&contents)?;
        log::info!("Loaded {} class labels from {}", map.len(), path.display());
        Ok(map)
    }

    /// Accepts YAML or JSON: `{"0": "Bad", "1": "Good"}`, `{0: Bad, 1: Good}` or `[Bad, Good]`.
    pub fn parse(contents: &str) -> Result<Self, LabelMapError> {
        let value: Value = serde_yaml::from_str(contents)?;
        let mut labels = BTreeMap::new();
        match value {
            Value::Mapping(mapping) => {
                for (key, label) in mapping {
                    let index = parse_index(&key)?;
                    labels.insert(index, label_string(index, label)?);
                }
            }
            Value::Sequence(seq) => {
                for (index, label) in seq.into_iter().enumerate() {
                    labels.insert(index, label_string(index, label)?);
                }
            }
            _ => return Err(LabelMapError::NotAMapping),
        }
        for required in [Self::NEGATIVE, Self::POSITIVE] {
            if !labels.contains_key(&required) {
                return Err(LabelMapError::MissingClass(required));
            }
        }
        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.labels.values().cloned().collect()
    }
}

fn parse_index(key: &Value) -> Result<usize, LabelMapError> {
    let parsed = match key {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| LabelMapError::InvalidKey(format!("{:?}", key)))
}

fn label_string(index: usize, label: Value) -> Result<String, LabelMapError> {
    match label {
        Value::String(s) => Ok(s),
        _ => Err(LabelMapError::InvalidLabel(index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_bad_then_good() {
        let map = ClassLabelMap::default();
        assert_eq!(map.get(0), Some("Bad"));
        assert_eq!(map.get(1), Some("Good"));
        assert_eq!(map.names(), vec!["Bad", "Good"]);
    }

    #[test]
    fn json_with_string_keys() {
        let map = ClassLabelMap::parse(r#"{"0": "Rotten", "1": "Fresh"}"#).unwrap();
        assert_eq!(map.get(0), Some("Rotten"));
        assert_eq!(map.get(1), Some("Fresh"));
    }

    #[test]
    fn yaml_with_integer_keys() {
        let map = ClassLabelMap::parse("1: Good\n0: Bad\n").unwrap();
        assert_eq!(map, ClassLabelMap::default());
    }

    #[test]
    fn plain_list_is_indexed_in_order() {
        let map = ClassLabelMap::parse(r#"["Bad", "Good"]"#).unwrap();
        assert_eq!(map, ClassLabelMap::default());
    }

    #[test]
    fn non_numeric_key_is_rejected() {
        assert!(matches!(
            ClassLabelMap::parse(r#"{"zero": "Bad", "1": "Good"}"#),
            Err(LabelMapError::InvalidKey(_))
        ));
    }

    #[test]
    fn both_binary_classes_are_required() {
        assert!(matches!(
            ClassLabelMap::parse(r#"{"1": "Good"}"#),
            Err(LabelMapError::MissingClass(0))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("quality-service-no-such-labels.json");
        let map = ClassLabelMap::load_or_default(&path).unwrap();
        assert_eq!(map, ClassLabelMap::default());
    }
}
