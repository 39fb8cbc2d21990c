//! Runtime property schemas.
//!
//! An initiative has no fixed Rust type. Which properties it carries, and how
//! each is sourced from a raw record, is described by a [`PropertySchema`]: an
//! ordered list of named [`PropDef`]s. Building an initiative runs every
//! definition's builder against the raw record.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::OtherHasher;
use crate::error::{MapdexError, Result};
use crate::value::{PropValue, RawRecord, ValueKind, json_type_name};
use crate::vocab::VocabServices;

pub type CustomFn = dyn Fn(&str, &PropDef, &RawRecord) -> Result<PropValue> + Send + Sync;

/// An arbitrary computed property, called with the property id, its own
/// definition and the raw record.
#[derive(Clone)]
pub struct CustomBuilder {
    name: String,
    build: Arc<CustomFn>,
}

impl CustomBuilder {
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&str, &PropDef, &RawRecord) -> Result<PropValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Latitude from `lat`, unless `manLat`/`manLng` both hold usable overrides.
    pub fn latitude() -> Self {
        Self::located("latitude", "lat", "manLat", "manLng")
    }
    /// Longitude from `lng`, unless `manLat`/`manLng` both hold usable overrides.
    pub fn longitude() -> Self {
        Self::located("longitude", "lng", "manLng", "manLat")
    }
    /// Looks up one of the built-in builders by the name used in configuration.
    pub fn named(name: &str) -> Result<Self> {
        match name {
            "latitude" => Ok(Self::latitude()),
            "longitude" => Ok(Self::longitude()),
            other => Err(MapdexError::Schema(format!("unknown custom builder '{other}'"))),
        }
    }
    fn located(name: &str, base: &'static str, own: &'static str, partner: &'static str) -> Self {
        Self::new(name, move |_id, def, raw| {
            let base_field = def.from_field().unwrap_or(base);
            let chosen = if usable_override(raw.get(own)) && usable_override(raw.get(partner)) {
                raw.get(own)
            } else {
                raw.get(base_field)
            };
            Ok(chosen.map_or(PropValue::Absent, |v| ValueKind::Number.coerce(v)))
        })
    }
}

// Overrides must be numeric and not the literal "0" placeholder.
fn usable_override(raw: Option<&Json>) -> bool {
    match raw {
        Some(Json::Number(_)) => true,
        Some(Json::String(s)) => s != "0" && s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

impl fmt::Debug for CustomBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CustomBuilder({})", self.name)
    }
}

/// How one property's value is sourced and typed.
///
/// `from` names the raw field to read; when absent the property's own name is
/// used.
#[derive(Debug, Clone)]
pub enum PropDef {
    Value {
        kind: ValueKind,
        strict: bool,
        from: Option<String>,
    },
    Vocab {
        uri: String,
        from: Option<String>,
    },
    Custom {
        builder: CustomBuilder,
        from: Option<String>,
    },
    Multi {
        of: Box<PropDef>,
        from: Option<String>,
    },
}

impl PropDef {
    pub fn value(kind: ValueKind) -> Self {
        Self::Value { kind, strict: false, from: None }
    }
    pub fn strict(kind: ValueKind) -> Self {
        Self::Value { kind, strict: true, from: None }
    }
    pub fn vocab(uri: impl Into<String>) -> Self {
        Self::Vocab { uri: uri.into(), from: None }
    }
    pub fn custom(builder: CustomBuilder) -> Self {
        Self::Custom { builder, from: None }
    }
    pub fn multi(of: PropDef) -> Self {
        Self::Multi { of: Box::new(of), from: None }
    }
    pub fn with_from(mut self, field: impl Into<String>) -> Self {
        match &mut self {
            Self::Value { from, .. }
            | Self::Vocab { from, .. }
            | Self::Custom { from, .. }
            | Self::Multi { from, .. } => *from = Some(field.into()),
        }
        self
    }
    pub fn from_field(&self) -> Option<&str> {
        match self {
            Self::Value { from, .. }
            | Self::Vocab { from, .. }
            | Self::Custom { from, .. }
            | Self::Multi { from, .. } => from.as_deref(),
        }
    }
    pub fn source_field<'a>(&'a self, id: &'a str) -> &'a str {
        self.from_field().unwrap_or(id)
    }
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi { .. })
    }
    /// The vocabulary this property draws its values from, looking through a
    /// `Multi` wrapper.
    pub fn vocab_uri(&self) -> Option<&str> {
        match self {
            Self::Vocab { uri, .. } => Some(uri),
            Self::Multi { of, .. } => of.vocab_uri(),
            _ => None,
        }
    }

    /// Builds the value of property `id` from `raw`.
    pub fn build(&self, id: &str, raw: &RawRecord, vocabs: &VocabServices) -> Result<PropValue> {
        let field = self.source_field(id);
        match self {
            Self::Value { kind, strict, .. } => {
                let value = raw.get(field).unwrap_or(&Json::Null);
                if *strict {
                    if !kind.matches(value) {
                        return Err(MapdexError::TypeMismatch {
                            property: id.to_string(),
                            field: field.to_string(),
                            expected: kind.data_type(),
                            found: json_type_name(value).to_string(),
                        });
                    }
                    Ok(PropValue::from(value))
                } else {
                    Ok(kind.coerce(value))
                }
            }
            Self::Vocab { .. } => match raw.get(field) {
                None | Some(Json::Null) => Ok(PropValue::Absent),
                Some(Json::String(uri)) => Ok(PropValue::Text(vocabs.abbrev_uri(uri))),
                Some(other) => Err(MapdexError::Type {
                    property: id.to_string(),
                    field: field.to_string(),
                    message: format!("vocabulary term must be a string, found {}", json_type_name(other)),
                }),
            },
            Self::Custom { builder, .. } => (builder.build)(id, self, raw),
            Self::Multi { of, .. } => {
                let items = match raw.get(field) {
                    None | Some(Json::Null) => Vec::new(),
                    Some(Json::Array(items)) => items.clone(),
                    Some(single) => vec![single.clone()],
                };
                // each element replaces the list at this property's own source
                // field, and the inner builder is pointed at that same field
                let inner = (**of).clone().with_from(field);
                let mut built = Vec::with_capacity(items.len());
                for item in items {
                    let mut substituted = raw.clone();
                    substituted.insert(field.to_string(), item);
                    built.push(inner.build(id, &substituted, vocabs)?);
                }
                Ok(PropValue::List(built))
            }
        }
    }
}

/// Ordered set of named property definitions.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    props: Vec<(String, PropDef)>,
    positions: HashMap<String, usize, OtherHasher>,
}

impl PropertySchema {
    /// The properties every initiative carries.
    pub fn base() -> Self {
        let mut schema = Self {
            props: Vec::new(),
            positions: HashMap::default(),
        };
        schema.put("uri".into(), PropDef::strict(ValueKind::String));
        schema.put("name".into(), PropDef::value(ValueKind::String));
        schema.put("dataset".into(), PropDef::value(ValueKind::String));
        schema.put("lat".into(), PropDef::custom(CustomBuilder::latitude()));
        schema.put("lng".into(), PropDef::custom(CustomBuilder::longitude()));
        schema.put("manLat".into(), PropDef::value(ValueKind::Number));
        schema.put("manLng".into(), PropDef::value(ValueKind::Number));
        schema
    }
    /// The base schema extended with `defs`. A definition named like a base
    /// property replaces it in place.
    pub fn new<I, S>(defs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, PropDef)>,
        S: Into<String>,
    {
        let mut schema = Self::base();
        for (name, def) in defs {
            let name = name.into();
            if name.is_empty() {
                return Err(MapdexError::Schema("property name must not be empty".into()));
            }
            validate(&name, &def)?;
            schema.put(name, def);
        }
        Ok(schema)
    }
    fn put(&mut self, name: String, def: PropDef) {
        match self.positions.get(&name) {
            Some(&at) => self.props[at].1 = def,
            None => {
                self.positions.insert(name.clone(), self.props.len());
                self.props.push((name, def));
            }
        }
    }
    pub fn get(&self, name: &str) -> Option<&PropDef> {
        self.positions.get(name).map(|&at| &self.props[at].1)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropDef)> {
        self.props.iter().map(|(name, def)| (name.as_str(), def))
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.props.iter().map(|(name, _)| name.as_str())
    }
    pub fn is_multi(&self, name: &str) -> bool {
        self.get(name).is_some_and(PropDef::is_multi)
    }
    pub fn vocab_uri(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropDef::vocab_uri)
    }
    /// True for vocabulary properties, including multis of them.
    pub fn resolves_to_vocab(&self, name: &str) -> bool {
        self.vocab_uri(name).is_some()
    }
    pub fn len(&self) -> usize {
        self.props.len()
    }
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

impl Default for PropertySchema {
    fn default() -> Self {
        Self::base()
    }
}

fn validate(name: &str, def: &PropDef) -> Result<()> {
    if let PropDef::Multi { of, .. } = def {
        if of.is_multi() {
            return Err(MapdexError::Schema(format!(
                "property '{name}' wraps a multi inside a multi"
            )));
        }
    }
    Ok(())
}
