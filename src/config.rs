//! Runtime configuration.
//!
//! Read with the `config` crate from a file (format chosen by extension) with
//! `MAPDEX__*` environment variables layered on top, e.g.
//! `MAPDEX__LANGUAGE=fr` or `MAPDEX__BATCH_SIZE=500`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{MapdexError, Result};
use crate::schema::{CustomBuilder, PropDef, PropertySchema};
use crate::value::ValueKind;

/// A property definition as written in configuration. Custom builders are
/// referred to by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropDefConfig {
    Value {
        #[serde(rename = "as", default)]
        kind: ValueKind,
        #[serde(default)]
        strict: bool,
        #[serde(default)]
        from: Option<String>,
    },
    Vocab {
        uri: String,
        #[serde(default)]
        from: Option<String>,
    },
    Custom {
        builder: String,
        #[serde(default)]
        from: Option<String>,
    },
    Multi {
        of: Box<PropDefConfig>,
        #[serde(default)]
        from: Option<String>,
    },
}

impl PropDefConfig {
    pub fn to_prop_def(&self) -> Result<PropDef> {
        let (def, from) = match self {
            Self::Value { kind, strict, from } => (
                if *strict { PropDef::strict(*kind) } else { PropDef::value(*kind) },
                from,
            ),
            Self::Vocab { uri, from } => (PropDef::vocab(uri.clone()), from),
            Self::Custom { builder, from } => (PropDef::custom(CustomBuilder::named(builder)?), from),
            Self::Multi { of, from } => (PropDef::multi(of.to_prop_def()?), from),
        };
        Ok(match from {
            Some(field) => def.with_from(field.clone()),
            None => def,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    #[serde(flatten)]
    pub def: PropDefConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VocabSourceConfig {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    /// The first language is the fallback for missing translations.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_searched_fields")]
    pub searched_fields: Vec<String>,
    #[serde(default)]
    pub filterable_fields: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub vocabularies: Vec<VocabSourceConfig>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}
fn default_searched_fields() -> Vec<String> {
    vec!["name".to_string()]
}
fn default_batch_size() -> usize {
    100
}
fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            language: None,
            searched_fields: default_searched_fields(),
            filterable_fields: Vec::new(),
            properties: Vec::new(),
            datasets: Vec::new(),
            vocabularies: Vec::new(),
            batch_size: default_batch_size(),
            bind: default_bind(),
        }
    }
}

impl MapConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Config::builder().add_source(File::from(path.as_ref())))
    }
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::load(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }
    fn load(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings = builder
            .add_source(Environment::with_prefix("MAPDEX").separator("__").try_parsing(true))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn fallback_language(&self) -> &str {
        self.languages.first().map(String::as_str).unwrap_or("en")
    }
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or_else(|| self.fallback_language())
    }

    pub fn property_schema(&self) -> Result<PropertySchema> {
        let defs = self
            .properties
            .iter()
            .map(|prop| Ok((prop.name.clone(), prop.def.to_prop_def()?)))
            .collect::<Result<Vec<_>>>()?;
        PropertySchema::new(defs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(MapdexError::Config("at least one language is required".into()));
        }
        if !self.languages.iter().any(|lang| lang == self.language()) {
            return Err(MapdexError::Config(format!(
                "language '{}' is not one of {:?}",
                self.language(),
                self.languages
            )));
        }
        if self.batch_size == 0 {
            return Err(MapdexError::Config("batch_size must be positive".into()));
        }
        let schema = self.property_schema()?;
        for field in self.searched_fields.iter().chain(&self.filterable_fields) {
            if !schema.contains(field) {
                return Err(MapdexError::Config(format!("unknown property '{field}'")));
            }
        }
        let mut ids = HashSet::new();
        for dataset in &self.datasets {
            if !ids.insert(dataset.id.as_str()) {
                return Err(MapdexError::Config(format!("duplicate dataset id '{}'", dataset.id)));
            }
        }
        Ok(())
    }
}
