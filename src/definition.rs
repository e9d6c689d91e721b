//! Substitution definitions.
//!
//! A definition names change pairs (`before -> after`), groups that apply a
//! set of change pairs to a set of files, and components that bundle groups.
//! Definitions are stored as JSON.
//!
//! ```json
//! {
//!   "change_pairs": [ { "id": "port", "before": "%%%PORT%%%", "after": "4848" } ],
//!   "groups": [ { "id": "config", "change_pair_refs": [ { "name": "port" } ],
//!                 "file_entries": [ { "name": "$DOMAIN_DIR$/config/*.xml" } ],
//!                 "archives": [ { "name": "$DOMAIN_DIR$/lib/app.jar",
//!                                 "members": [ "META-INF/app.properties" ] } ] } ],
//!   "components": [ { "id": "domain", "group_refs": [ { "name": "config" } ] } ]
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StringSubsError};
use crate::substitution::ModeType;

/// Root of a substitution definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringsubsDefinition {
    pub version: Option<String>,
    pub defaults: Option<Defaults>,
    pub change_pairs: Vec<ChangePair>,
    pub groups: Vec<Group>,
    pub components: Vec<Component>,
}

impl StringsubsDefinition {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let definition: Self = serde_json::from_reader(reader)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            StringSubsError::definition(format!(
                "Failed to read definition file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_reader(json.as_bytes())
    }

    /// Ids must be unique within each kind.
    pub fn validate(&self) -> Result<()> {
        fn check_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
            let mut seen = std::collections::HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(StringSubsError::definition(format!("Duplicate {kind} id '{id}'")));
                }
            }
            Ok(())
        }

        check_unique("group", self.groups.iter().map(|g| g.id.as_str()))?;
        check_unique("component", self.components.iter().map(|c| c.id.as_str()))?;
        check_unique(
            "change-pair",
            self.change_pairs.iter().filter_map(|p| p.id.as_deref()),
        )?;
        Ok(())
    }

    pub fn find_group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn find_component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Default properties, optionally restricted to one type.
    pub fn default_properties(&self, property_type: Option<PropertyType>) -> Vec<&Property> {
        let Some(defaults) = &self.defaults else {
            return Vec::new();
        };
        defaults
            .properties
            .iter()
            .filter(|p| property_type.is_none_or(|t| p.property_type == t))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub properties: Vec<Property>,
}

/// A named default value offered to the tooling that fills in change pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Port,
    #[default]
    String,
}

/// One `before -> after` substitution. Incomplete pairs are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePair {
    pub id: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl ChangePair {
    pub fn new<I, B, A>(id: I, before: B, after: A) -> Self
    where
        I: Into<String>,
        B: Into<String>,
        A: Into<String>,
    {
        Self {
            id: Some(id.into()),
            before: Some(before.into()),
            after: Some(after.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePairRef {
    pub name: String,
    /// Overrides the group's mode. Kept as text so an unknown mode only
    /// disables post-processing for this pair.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Applies a set of change pairs to a set of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub mode: Option<ModeType>,
    pub change_pair_refs: Vec<ChangePairRef>,
    pub file_entries: Vec<FileEntry>,
    pub archives: Vec<Archive>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
}

impl FileEntry {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

/// A zip or jar archive whose named members are substituted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Archive {
    pub name: String,
    /// Paths of the members inside the archive, e.g. `META-INF/MANIFEST.MF`.
    pub members: Vec<String>,
}

impl Archive {
    pub fn new<S: Into<String>>(name: S, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub name: String,
}

/// A named bundle of groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub id: String,
    pub group_refs: Vec<GroupRef>,
}
