//! Sources and sinks that a substitution algorithm rewrites.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info};
use regex::Regex;

use super::archive::archive_member_substitutables;
use crate::config::EngineConfig;
use crate::definition::{Archive, FileEntry};
use crate::error::{Result, StringSubsError};

/// A resource whose content is substituted as a stream.
pub trait Substitutable: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Open the input stream and the output sink together.
    fn open(&mut self) -> Result<(Box<dyn BufRead + '_>, Box<dyn Write + '_>)>;

    /// Commit the written output.
    fn finish(&mut self) -> Result<()>;
}

/// Produces the substitutables that file entries and archives refer to.
pub trait SubstitutableFactory: Send + Sync {
    fn file_entry_substitutables(&self, entry: &FileEntry) -> Result<Vec<Box<dyn Substitutable>>>;

    fn archive_entry_substitutables(&self, archive: &Archive) -> Result<Vec<Box<dyn Substitutable>>>;
}

/// In-memory source and sink.
#[derive(Debug, Clone, Default)]
pub struct StringSubstitutable {
    name: String,
    input: String,
    output: Vec<u8>,
    finished: bool,
}

impl StringSubstitutable {
    pub fn new<N: Into<String>, S: Into<String>>(name: N, input: S) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            output: Vec::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Output written so far, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Substitutable for StringSubstitutable {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(Box<dyn BufRead + '_>, Box<dyn Write + '_>)> {
        let Self { input, output, .. } = self;
        output.clear();
        let reader: Box<dyn BufRead + '_> = Box::new(input.as_bytes());
        let writer: Box<dyn Write + '_> = Box::new(output);
        Ok((reader, writer))
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// A file rewritten in place.
///
/// Output goes to a hidden sibling temporary file that replaces the original
/// on [`finish`](Substitutable::finish), keeping its permissions. A symlink is
/// resolved first so the link survives and its target is rewritten. Dropping
/// an unfinished substitutable removes the temporary file and leaves the
/// original untouched.
#[derive(Debug)]
pub struct FileSubstitutable {
    path: PathBuf,
    name: String,
    /// Resolved target and its temporary sibling, set by `open`.
    staged: Option<(PathBuf, PathBuf)>,
    buffer_size: usize,
    backup_location: Option<PathBuf>,
}

impl FileSubstitutable {
    pub fn new<P: Into<PathBuf>>(path: P, config: &EngineConfig) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            staged: None,
            buffer_size: config.buffer_size.max(1),
            backup_location: config.backup_location.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Substitutable for FileSubstitutable {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(Box<dyn BufRead + '_>, Box<dyn Write + '_>)> {
        let target = fs::canonicalize(&self.path).map_err(|e| StringSubsError::substitution(&self.name, e))?;
        if let Some(dir) = &self.backup_location {
            let saved = backup_file(&target, &self.name, dir)?;
            debug!("Backed up {} to {}", self.name, saved.display());
        }
        let temp_path = temp_sibling(&target);
        let input = File::open(&target).map_err(|e| StringSubsError::substitution(&self.name, e))?;
        let output = File::create(&temp_path).map_err(|e| StringSubsError::substitution(&self.name, e))?;
        self.staged = Some((target, temp_path));

        let reader: Box<dyn BufRead + '_> = Box::new(BufReader::with_capacity(self.buffer_size, input));
        let writer: Box<dyn Write + '_> = Box::new(BufWriter::with_capacity(self.buffer_size, output));
        Ok((reader, writer))
    }

    fn finish(&mut self) -> Result<()> {
        match self.staged.take() {
            Some((target, temp_path)) if temp_path.exists() => commit(&temp_path, &target, &self.name),
            _ => {
                debug!("Nothing to commit for {}", self.name);
                Ok(())
            }
        }
    }
}

impl Drop for FileSubstitutable {
    fn drop(&mut self) {
        if let Some((_, temp_path)) = &self.staged {
            if temp_path.exists() {
                let _ = fs::remove_file(temp_path);
            }
        }
    }
}

/// Hidden temporary sibling that receives the rewritten content of `path`.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.stringsubs.tmp"))
}

/// Copy `path` into `dir` as `<file>.<timestamp>.bak`.
pub(crate) fn backup_file(path: &Path, name: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| StringSubsError::substitution(name, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d%H%M%S%3f");
    let target = dir.join(format!("{file_name}.{stamp}.bak"));
    fs::copy(path, &target).map_err(|e| StringSubsError::substitution(name, e))?;
    Ok(target)
}

/// Move `temp_path` over `path`, carrying over the permissions of `path`.
pub(crate) fn commit(temp_path: &Path, path: &Path, name: &str) -> Result<()> {
    let permissions = fs::metadata(path)
        .map_err(|e| StringSubsError::substitution(name, e))?
        .permissions();
    fs::set_permissions(temp_path, permissions).map_err(|e| StringSubsError::substitution(name, e))?;
    fs::rename(temp_path, path).map_err(|e| StringSubsError::substitution(name, e))
}

/// Resolves file entries against the filesystem.
///
/// An entry naming a directory covers every regular file directly inside it.
/// `*` and `?` are honoured in the last path segment.
#[derive(Debug, Clone, Default)]
pub struct FileSubstitutableFactory {
    config: EngineConfig,
}

impl FileSubstitutableFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Paths an entry name resolves to, sorted.
    pub fn resolve(&self, name: &str) -> Result<Vec<PathBuf>> {
        let path = Path::new(name);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file_name.contains(['*', '?']) {
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !dir.is_dir() {
                info!("Directory {} is not present", dir.display());
                return Ok(Vec::new());
            }
            let pattern = wildcard_regex(&file_name)?;
            return list_files(&dir, |candidate| pattern.is_match(candidate));
        }

        if path.is_dir() {
            return list_files(path, |_| true);
        }
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        info!("File {} is not present", path.display());
        Ok(Vec::new())
    }
}

impl SubstitutableFactory for FileSubstitutableFactory {
    fn file_entry_substitutables(&self, entry: &FileEntry) -> Result<Vec<Box<dyn Substitutable>>> {
        Ok(self
            .resolve(&entry.name)?
            .into_iter()
            .map(|path| Box::new(FileSubstitutable::new(path, &self.config)) as Box<dyn Substitutable>)
            .collect())
    }

    fn archive_entry_substitutables(&self, archive: &Archive) -> Result<Vec<Box<dyn Substitutable>>> {
        archive_member_substitutables(archive, &self.config)
    }
}

fn wildcard_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| StringSubsError::Anyhow(anyhow::Error::from(e)))
}

fn list_files<F>(dir: &Path, accept: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".stringsubs.tmp") {
            continue;
        }
        if entry.file_type()?.is_file() && accept(&name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
