//! Substitution of members inside zip and jar archives.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::substitutable::{Substitutable, backup_file, commit, temp_sibling};
use crate::config::EngineConfig;
use crate::definition::Archive;
use crate::error::{Result, StringSubsError};

/// Rewritten members waiting for their archive to be repacked.
#[derive(Debug)]
struct PendingArchive {
    path: PathBuf,
    name: String,
    remaining: usize,
    rewritten: HashMap<String, Vec<u8>>,
    backup_location: Option<PathBuf>,
}

impl PendingArchive {
    /// Write a copy of the archive with the rewritten members swapped in and
    /// move it over the original. Untouched entries are copied raw.
    fn repack(&mut self) -> Result<()> {
        if let Some(dir) = &self.backup_location {
            let saved = backup_file(&self.path, &self.name, dir)?;
            debug!("Backed up {} to {}", self.name, saved.display());
        }

        let temp_path = temp_sibling(&self.path);
        match self.write_repacked(&temp_path) {
            Ok(()) => commit(&temp_path, &self.path, &self.name),
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    fn write_repacked(&self, temp_path: &Path) -> Result<()> {
        let source = File::open(&self.path).map_err(|e| StringSubsError::substitution(&self.name, e))?;
        let mut reader =
            ZipArchive::new(BufReader::new(source)).map_err(|e| StringSubsError::archive(&self.name, e))?;
        let target = File::create(temp_path).map_err(|e| StringSubsError::substitution(&self.name, e))?;
        let mut writer = ZipWriter::new(BufWriter::new(target));

        for index in 0..reader.len() {
            let entry = reader
                .by_index_raw(index)
                .map_err(|e| StringSubsError::archive(&self.name, e))?;
            let Some(content) = self.rewritten.get(entry.name()) else {
                writer
                    .raw_copy_file(entry)
                    .map_err(|e| StringSubsError::archive(&self.name, e))?;
                continue;
            };

            let method = match entry.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = SimpleFileOptions::default().compression_method(method);
            if let Some(mode) = entry.unix_mode() {
                options = options.unix_permissions(mode);
            }
            let name = entry.name().to_string();
            writer
                .start_file(name, options)
                .map_err(|e| StringSubsError::archive(&self.name, e))?;
            writer
                .write_all(content)
                .map_err(|e| StringSubsError::substitution(&self.name, e))?;
        }

        let mut inner = writer.finish().map_err(|e| StringSubsError::archive(&self.name, e))?;
        inner.flush().map_err(|e| StringSubsError::substitution(&self.name, e))
    }
}

/// One member of a zip or jar archive, substituted in memory.
///
/// Members of the same archive share one pending rewrite. The archive is
/// repacked once, when the last of them finishes; if any member never
/// finishes the archive is left untouched.
pub struct ArchiveMemberSubstitutable {
    name: String,
    member: String,
    input: Vec<u8>,
    output: Vec<u8>,
    finished: bool,
    archive: Arc<Mutex<PendingArchive>>,
}

impl ArchiveMemberSubstitutable {
    pub fn member(&self) -> &str {
        &self.member
    }
}

impl Substitutable for ArchiveMemberSubstitutable {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(Box<dyn BufRead + '_>, Box<dyn Write + '_>)> {
        let Self { input, output, .. } = self;
        output.clear();
        let reader: Box<dyn BufRead + '_> = Box::new(input.as_slice());
        let writer: Box<dyn Write + '_> = Box::new(output);
        Ok((reader, writer))
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let mut archive = self.archive.lock();
        archive
            .rewritten
            .insert(self.member.clone(), mem::take(&mut self.output));
        archive.remaining -= 1;
        if archive.remaining > 0 {
            return Ok(());
        }
        debug!("Repacking {}", archive.name);
        archive.repack()
    }
}

/// Substitutables for the members an [`Archive`] names.
///
/// A missing archive or member is logged and skipped. Directory members are
/// ignored.
pub fn archive_member_substitutables(
    archive: &Archive,
    config: &EngineConfig,
) -> Result<Vec<Box<dyn Substitutable>>> {
    let path = Path::new(&archive.name);
    if !path.is_file() {
        info!("Archive {} is not present", archive.name);
        return Ok(Vec::new());
    }

    let file = File::open(path).map_err(|e| StringSubsError::substitution(&archive.name, e))?;
    let mut zip = ZipArchive::new(BufReader::with_capacity(config.buffer_size.max(1), file))
        .map_err(|e| StringSubsError::archive(&archive.name, e))?;

    let mut found = Vec::new();
    for member in &archive.members {
        let mut entry = match zip.by_name(member) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                info!("Member {} is not present in {}", member, archive.name);
                continue;
            }
            Err(e) => return Err(StringSubsError::archive(&archive.name, e)),
        };
        if entry.is_dir() {
            debug!("Skipping directory {} in {}", member, archive.name);
            continue;
        }
        let mut input = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut input)
            .map_err(|e| StringSubsError::substitution(member_name(&archive.name, member), e))?;
        found.push((member.clone(), input));
    }

    if found.is_empty() {
        return Ok(Vec::new());
    }

    let pending = Arc::new(Mutex::new(PendingArchive {
        path: path.to_path_buf(),
        name: archive.name.clone(),
        remaining: found.len(),
        rewritten: HashMap::new(),
        backup_location: config.backup_location.clone(),
    }));

    Ok(found
        .into_iter()
        .map(|(member, input)| {
            Box::new(ArchiveMemberSubstitutable {
                name: member_name(&archive.name, &member),
                member,
                input,
                output: Vec::new(),
                finished: false,
                archive: Arc::clone(&pending),
            }) as Box<dyn Substitutable>
        })
        .collect())
}

fn member_name(archive: &str, member: &str) -> String {
    format!("{archive}!/{member}")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::*;

    fn write_jar(path: &Path, entries: &[(&str, &str, CompressionMethod)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_jar(path: &Path) -> Vec<(String, String)> {
        let bytes = fs::read(path).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                (entry.name().to_string(), content)
            })
            .collect()
    }

    fn rewrite(substitutable: &mut dyn Substitutable) {
        {
            let (mut reader, mut writer) = substitutable.open().unwrap();
            let mut content = String::new();
            reader.read_to_string(&mut content).unwrap();
            writer.write_all(content.to_uppercase().as_bytes()).unwrap();
        }
        substitutable.finish().unwrap();
    }

    #[test]
    fn test_members_repacked_after_last_finish() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("app.jar");
        write_jar(
            &jar,
            &[
                ("META-INF/MANIFEST.MF", "manifest", CompressionMethod::Deflated),
                ("config/a.properties", "a=1", CompressionMethod::Stored),
                ("config/b.properties", "b=2", CompressionMethod::Deflated),
            ],
        );

        let archive = Archive::new(
            jar.display().to_string(),
            vec!["config/a.properties".to_string(), "config/b.properties".to_string()],
        );
        let mut members = archive_member_substitutables(&archive, &EngineConfig::default()).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members[0].name().ends_with("app.jar!/config/a.properties"));

        rewrite(members[0].as_mut());
        // Not repacked until every member is done.
        assert_eq!(read_jar(&jar)[1].1, "a=1");

        rewrite(members[1].as_mut());
        assert_eq!(
            read_jar(&jar),
            vec![
                ("META-INF/MANIFEST.MF".to_string(), "manifest".to_string()),
                ("config/a.properties".to_string(), "A=1".to_string()),
                ("config/b.properties".to_string(), "B=2".to_string()),
            ]
        );
        assert!(!dir.path().join(".app.jar.stringsubs.tmp").exists());
    }

    #[test]
    fn test_missing_archive_and_members_skipped() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("x.txt", "x", CompressionMethod::Stored)]);

        let missing = Archive::new(dir.path().join("absent.jar").display().to_string(), vec!["x.txt".into()]);
        assert!(archive_member_substitutables(&missing, &EngineConfig::default()).unwrap().is_empty());

        let no_member = Archive::new(jar.display().to_string(), vec!["y.txt".into()]);
        assert!(archive_member_substitutables(&no_member, &EngineConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("broken.jar");
        fs::write(&jar, "not a zip").unwrap();

        let archive = Archive::new(jar.display().to_string(), vec!["x.txt".into()]);
        let err = archive_member_substitutables(&archive, &EngineConfig::default()).err().unwrap();
        match err {
            StringSubsError::Archive { resource, .. } => assert!(resource.ends_with("broken.jar")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unfinished_member_leaves_archive() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("app.jar");
        write_jar(
            &jar,
            &[
                ("a.txt", "a", CompressionMethod::Stored),
                ("b.txt", "b", CompressionMethod::Stored),
            ],
        );
        let before = fs::read(&jar).unwrap();

        let archive = Archive::new(jar.display().to_string(), vec!["a.txt".into(), "b.txt".into()]);
        let mut members = archive_member_substitutables(&archive, &EngineConfig::default()).unwrap();
        rewrite(members[0].as_mut());
        drop(members);

        assert_eq!(fs::read(&jar).unwrap(), before);
    }
}
