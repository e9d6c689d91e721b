//! Definition-driven substitution over groups of files.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::definition::{
    Archive, Component, FileEntry, Group, Property, PropertyType, StringsubsDefinition,
};
use crate::error::{Result, StringSubsError};
use crate::substitution::{
    AttributePreprocessor, FileSubstitutableFactory, ModeType, RadixTreeSubstitutionAlgorithm,
    Substitutable, SubstitutableFactory, SubstitutionAlgorithm, VariablePreprocessor,
};

/// Summary of one substitution run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionReport {
    /// Groups whose files were substituted.
    pub groups_processed: usize,
    /// Groups skipped for lack of files or change pairs.
    pub groups_skipped: usize,
    /// Archives that could not be updated. These are logged, not fatal.
    pub archives_failed: usize,
    /// Names of the substituted resources, in processing order.
    pub files: Vec<String>,
}

impl SubstitutionReport {
    fn merge(&mut self, other: SubstitutionReport) {
        self.groups_processed += other.groups_processed;
        self.groups_skipped += other.groups_skipped;
        self.archives_failed += other.archives_failed;
        self.files.extend(other.files);
    }
}

/// Applies the change pairs of a [`StringsubsDefinition`] to the files its
/// groups name.
pub struct StringSubstitutionEngine {
    definition: StringsubsDefinition,
    config: EngineConfig,
    preprocessor: Box<dyn AttributePreprocessor>,
    factory: Box<dyn SubstitutableFactory>,
}

impl StringSubstitutionEngine {
    pub fn new(definition: StringsubsDefinition) -> Self {
        let config = EngineConfig::default();
        Self {
            definition,
            factory: Box::new(FileSubstitutableFactory::new(config.clone())),
            config,
            preprocessor: Box::new(VariablePreprocessor::default()),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(Self::new(StringsubsDefinition::from_reader(reader)?))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(StringsubsDefinition::from_file(path)?))
    }

    /// Replace the configuration. This also resets the substitutable factory
    /// to a [`FileSubstitutableFactory`] using the new configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.factory = Box::new(FileSubstitutableFactory::new(config.clone()));
        self.config = config;
        self
    }

    pub fn set_attribute_preprocessor(&mut self, preprocessor: Box<dyn AttributePreprocessor>) {
        self.preprocessor = preprocessor;
    }

    pub fn set_substitutable_factory(&mut self, factory: Box<dyn SubstitutableFactory>) {
        self.factory = factory;
    }

    pub fn definition(&self) -> &StringsubsDefinition {
        &self.definition
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_properties(&self, property_type: Option<PropertyType>) -> Vec<&Property> {
        self.definition.default_properties(property_type)
    }

    /// Substitute every component in definition order.
    pub fn substitute_all(&self) -> Result<SubstitutionReport> {
        let mut report = SubstitutionReport::default();
        for component in &self.definition.components {
            report.merge(self.substitute_component(component)?);
        }
        Ok(report)
    }

    /// Substitute the named components. Unknown ids are skipped.
    pub fn substitute_components(&self, ids: &[String]) -> Result<SubstitutionReport> {
        if ids.is_empty() {
            return Err(StringSubsError::invalid_argument("Missing component identifiers"));
        }
        let mut report = SubstitutionReport::default();
        for id in ids {
            match self.definition.find_component(id) {
                Some(component) => report.merge(self.substitute_component(component)?),
                None => info!("Component {} is not present", id),
            }
        }
        Ok(report)
    }

    /// Substitute the named groups. Unknown ids are skipped.
    pub fn substitute_groups(&self, ids: &[String]) -> Result<SubstitutionReport> {
        if ids.is_empty() {
            return Err(StringSubsError::invalid_argument("Missing group identifiers"));
        }
        let mut report = SubstitutionReport::default();
        for id in ids {
            match self.definition.find_group(id) {
                Some(group) => report.merge(self.substitute_group(group)?),
                None => warn!("Group {} is not present", id),
            }
        }
        Ok(report)
    }

    fn substitute_component(&self, component: &Component) -> Result<SubstitutionReport> {
        let mut report = SubstitutionReport::default();
        for group_ref in &component.group_refs {
            match self.definition.find_group(&group_ref.name) {
                Some(group) => report.merge(self.substitute_group(group)?),
                None => warn!(
                    "Group {} referred by component {} is not present",
                    group_ref.name, component.id
                ),
            }
        }
        Ok(report)
    }

    fn substitute_group(&self, group: &Group) -> Result<SubstitutionReport> {
        let skipped = SubstitutionReport {
            groups_skipped: 1,
            ..Default::default()
        };
        if group.file_entries.is_empty() && group.archives.is_empty() {
            debug!("Group {} has no file entries or archives", group.id);
            return Ok(skipped);
        }
        if group.change_pair_refs.is_empty() {
            debug!("Group {} has no change pairs", group.id);
            return Ok(skipped);
        }

        let substitution_map = self.substitution_map(group);
        if substitution_map.is_empty() {
            info!("Group {} resolves to no change pairs", group.id);
            return Ok(skipped);
        }
        let algorithm = RadixTreeSubstitutionAlgorithm::new(&substitution_map)?;

        let mut substitutables = Vec::new();
        for entry in &group.file_entries {
            let entry = FileEntry::new(self.preprocessor.substitute_path(&entry.name));
            substitutables.extend(self.factory.file_entry_substitutables(&entry)?);
        }
        let mut files: Vec<String> = substitutables.iter().map(|s| s.name().to_string()).collect();
        debug!("Group {}: {} files", group.id, files.len());

        if self.config.parallel {
            substitutables
                .into_par_iter()
                .try_for_each(|mut substitutable| run(&algorithm, substitutable.as_mut()))?;
        } else {
            for mut substitutable in substitutables {
                run(&algorithm, substitutable.as_mut())?;
            }
        }

        let mut archives_failed = 0;
        for archive in &group.archives {
            if archive.name.is_empty() {
                continue;
            }
            let archive = Archive::new(self.preprocessor.substitute_path(&archive.name), archive.members.clone());
            match self.substitute_archive(&algorithm, &archive) {
                Ok(members) => files.extend(members),
                Err(e) => {
                    warn!("Failed to update archive {} with the substitutable files: {}", archive.name, e);
                    archives_failed += 1;
                }
            }
        }

        Ok(SubstitutionReport {
            groups_processed: 1,
            groups_skipped: 0,
            archives_failed,
            files,
        })
    }

    /// Substitute the members of one archive. Any failure leaves the archive
    /// untouched.
    fn substitute_archive(
        &self,
        algorithm: &dyn SubstitutionAlgorithm,
        archive: &Archive,
    ) -> Result<Vec<String>> {
        let substitutables = self.factory.archive_entry_substitutables(archive)?;
        debug!("Archive {}: {} members", archive.name, substitutables.len());
        let mut members = Vec::with_capacity(substitutables.len());
        for mut substitutable in substitutables {
            members.push(substitutable.name().to_string());
            run(algorithm, substitutable.as_mut())?;
        }
        Ok(members)
    }

    /// `before -> after` for the group's change pair refs, with preprocessing
    /// and modes applied. A ref's own mode overrides the group's.
    fn substitution_map(&self, group: &Group) -> HashMap<String, String> {
        let pairs = self.change_pairs();
        let mut map = HashMap::new();
        for pair_ref in &group.change_pair_refs {
            let Some((before, after)) = pairs.get(pair_ref.name.as_str()) else {
                info!(
                    "Change pair {} referred by group {} is not defined",
                    pair_ref.name, group.id
                );
                continue;
            };

            let local_mode = pair_ref.mode.as_deref().map(str::trim).filter(|m| !m.is_empty());
            let after = match local_mode {
                Some(mode) => match mode.parse::<ModeType>() {
                    Ok(mode) => mode.apply(after),
                    Err(_) => {
                        warn!("Invalid mode type {}", mode);
                        after.clone()
                    }
                },
                None => match group.mode {
                    Some(mode) => mode.apply(after),
                    None => {
                        debug!("No mode for change pair {} in group {}", pair_ref.name, group.id);
                        after.clone()
                    }
                },
            };
            map.insert(before.clone(), after);
        }
        map
    }

    /// Complete change pairs by id, preprocessed.
    fn change_pairs(&self) -> HashMap<&str, (String, String)> {
        let mut pairs = HashMap::with_capacity(self.definition.change_pairs.len());
        for pair in &self.definition.change_pairs {
            let (Some(id), Some(before), Some(after)) = (&pair.id, &pair.before, &pair.after) else {
                info!("Found an incomplete change pair");
                continue;
            };
            pairs.insert(
                id.as_str(),
                (
                    self.preprocessor.substitute_before(before),
                    self.preprocessor.substitute_after(after),
                ),
            );
        }
        pairs
    }
}

fn run(algorithm: &dyn SubstitutionAlgorithm, substitutable: &mut dyn Substitutable) -> Result<()> {
    algorithm.substitute(substitutable)?;
    substitutable.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::definition::{ChangePair, ChangePairRef, GroupRef};
    use crate::substitution::StringSubstitutable;

    /// Serves in-memory documents and records their output.
    #[derive(Default)]
    struct MemoryFactory {
        documents: HashMap<String, String>,
        /// Archive name to `(member, content)` pairs. A `None` archive is corrupt.
        archives: HashMap<String, Option<Vec<(String, String)>>>,
        outputs: Arc<Mutex<Vec<(String, String)>>>,
    }

    struct RecordingSubstitutable {
        inner: StringSubstitutable,
        outputs: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Substitutable for RecordingSubstitutable {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn open(&mut self) -> Result<(Box<dyn std::io::BufRead + '_>, Box<dyn std::io::Write + '_>)> {
            self.inner.open()
        }

        fn finish(&mut self) -> Result<()> {
            self.inner.finish()?;
            self.outputs
                .lock()
                .unwrap()
                .push((self.inner.name().to_string(), self.inner.output()));
            Ok(())
        }
    }

    impl SubstitutableFactory for MemoryFactory {
        fn file_entry_substitutables(&self, entry: &FileEntry) -> Result<Vec<Box<dyn Substitutable>>> {
            Ok(self
                .documents
                .get(&entry.name)
                .map(|content| {
                    Box::new(RecordingSubstitutable {
                        inner: StringSubstitutable::new(entry.name.clone(), content.clone()),
                        outputs: Arc::clone(&self.outputs),
                    }) as Box<dyn Substitutable>
                })
                .into_iter()
                .collect())
        }

        fn archive_entry_substitutables(&self, archive: &Archive) -> Result<Vec<Box<dyn Substitutable>>> {
            let Some(found) = self.archives.get(&archive.name) else {
                return Ok(Vec::new());
            };
            let members = found
                .as_ref()
                .ok_or_else(|| StringSubsError::other(format!("{} is not a zip archive", archive.name)))?;
            Ok(members
                .iter()
                .filter(|(member, _)| archive.members.contains(member))
                .map(|(member, content)| {
                    Box::new(RecordingSubstitutable {
                        inner: StringSubstitutable::new(format!("{}!/{}", archive.name, member), content.clone()),
                        outputs: Arc::clone(&self.outputs),
                    }) as Box<dyn Substitutable>
                })
                .collect())
        }
    }

    fn definition() -> StringsubsDefinition {
        StringsubsDefinition {
            change_pairs: vec![
                ChangePair::new("path", "%%%PATH%%%", r"C:\gf\$DOMAIN$"),
                ChangePair::new("port", "%%%PORT%%%", "4848"),
                ChangePair {
                    id: Some("broken".into()),
                    before: Some("x".into()),
                    after: None,
                },
            ],
            groups: vec![
                Group {
                    id: "forward".into(),
                    mode: Some(ModeType::Forward),
                    change_pair_refs: vec![
                        ChangePairRef { name: "path".into(), mode: None },
                        ChangePairRef { name: "port".into(), mode: None },
                        ChangePairRef { name: "broken".into(), mode: None },
                    ],
                    file_entries: vec![FileEntry::new("$DOMAIN$.xml")],
                    archives: Vec::new(),
                },
                Group {
                    id: "double".into(),
                    mode: Some(ModeType::Forward),
                    change_pair_refs: vec![ChangePairRef {
                        name: "path".into(),
                        mode: Some("double".into()),
                    }],
                    file_entries: vec![FileEntry::new("asenv.conf")],
                    archives: Vec::new(),
                },
                Group {
                    id: "jars".into(),
                    mode: None,
                    change_pair_refs: vec![ChangePairRef { name: "port".into(), mode: None }],
                    file_entries: Vec::new(),
                    archives: vec![
                        Archive::new("broken.jar", vec!["app.properties".into()]),
                        Archive::new("", vec!["app.properties".into()]),
                        Archive::new("$DOMAIN$.jar", vec!["app.properties".into()]),
                    ],
                },
                Group {
                    id: "empty".into(),
                    ..Default::default()
                },
            ],
            components: vec![Component {
                id: "domain".into(),
                group_refs: vec![
                    GroupRef { name: "forward".into() },
                    GroupRef { name: "missing".into() },
                    GroupRef { name: "empty".into() },
                ],
            }],
            ..Default::default()
        }
    }

    fn engine(parallel: bool) -> (StringSubstitutionEngine, Arc<Mutex<Vec<(String, String)>>>) {
        let mut factory = MemoryFactory::default();
        factory.documents.insert(
            "domain1.xml".into(),
            "<path>%%%PATH%%%</path><port>%%%PORT%%%</port>".into(),
        );
        factory.documents.insert("asenv.conf".into(), "AS_HOME=%%%PATH%%%".into());
        factory.archives.insert("broken.jar".into(), None);
        factory.archives.insert(
            "domain1.jar".into(),
            Some(vec![
                ("app.properties".into(), "port=%%%PORT%%%".into()),
                ("other.properties".into(), "port=%%%PORT%%%".into()),
            ]),
        );
        let outputs = Arc::clone(&factory.outputs);

        let mut preprocessor = VariablePreprocessor::default();
        preprocessor.set_variable("DOMAIN", "domain1");

        let mut engine = StringSubstitutionEngine::new(definition())
            .with_config(EngineConfig::default().with_parallel(parallel));
        engine.set_attribute_preprocessor(Box::new(preprocessor));
        engine.set_substitutable_factory(Box::new(factory));
        (engine, outputs)
    }

    #[test]
    fn test_substitute_all() {
        let (engine, outputs) = engine(false);
        let report = engine.substitute_all().unwrap();
        assert_eq!(report.groups_processed, 1);
        assert_eq!(report.groups_skipped, 1);
        assert_eq!(report.files, vec!["domain1.xml"]);

        let outputs = outputs.lock().unwrap();
        assert_eq!(
            outputs[0],
            (
                "domain1.xml".to_string(),
                "<path>C:/gf/domain1</path><port>4848</port>".to_string()
            )
        );
    }

    #[test]
    fn test_ref_mode_overrides_group_mode() {
        let (engine, outputs) = engine(true);
        engine.substitute_groups(&["double".to_string()]).unwrap();
        let outputs = outputs.lock().unwrap();
        assert_eq!(outputs[0].1, r"AS_HOME=C:\\gf\\domain1");
    }

    #[test]
    fn test_unknown_ids_skipped() {
        let (engine, outputs) = engine(false);
        let report = engine.substitute_groups(&["nope".to_string()]).unwrap();
        assert_eq!(report, SubstitutionReport::default());
        let report = engine.substitute_components(&["nope".to_string()]).unwrap();
        assert_eq!(report, SubstitutionReport::default());
        assert!(outputs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_id_lists_rejected() {
        let (engine, _) = engine(false);
        assert!(matches!(
            engine.substitute_groups(&[]).unwrap_err(),
            StringSubsError::InvalidArgument(_)
        ));
        assert!(matches!(
            engine.substitute_components(&[]).unwrap_err(),
            StringSubsError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_archive_failure_does_not_stop_group() {
        let (engine, outputs) = engine(false);
        let report = engine.substitute_groups(&["jars".to_string()]).unwrap();
        assert_eq!(report.groups_processed, 1);
        assert_eq!(report.archives_failed, 1);
        assert_eq!(report.files, vec!["domain1.jar!/app.properties"]);

        let outputs = outputs.lock().unwrap();
        assert_eq!(
            *outputs,
            vec![("domain1.jar!/app.properties".to_string(), "port=4848".to_string())]
        );
    }

    #[test]
    fn test_invalid_ref_mode_leaves_value() {
        let mut definition = definition();
        definition.groups[1].change_pair_refs[0].mode = Some("sideways".into());
        let (mut engine, outputs) = engine(false);
        engine.definition = definition;
        engine.substitute_groups(&["double".to_string()]).unwrap();
        assert_eq!(outputs.lock().unwrap()[0].1, r"AS_HOME=C:\gf\domain1");
    }
}
