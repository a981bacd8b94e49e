//! Folder source - reads inputs from a directory tree, a single file or zip archives

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::adapters::spreadsheet::{read_delimited, read_workbook, WORKBOOK_EXTENSIONS};
use crate::domain::result::{Error, Result};
use crate::domain::{Period, RawSheet, SourceFailure, SourceItem, SourceLoad};
use crate::ports::SourceProvider;
use crate::services::text_parser::DEFAULT_TEXT_ENCODINGS;

/// Editor lock files (e.g. `~$north.xlsx`) are never inputs
const LOCK_FILE_PREFIX: &str = "~$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Csv,
    Tsv,
    Text,
    Workbook,
    Zip,
}

impl InputKind {
    fn of(name: &str) -> Option<Self> {
        let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        if file_name.starts_with(LOCK_FILE_PREFIX) || file_name.starts_with('.') {
            return None;
        }
        let ext = Path::new(file_name).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "txt" => Some(Self::Text),
            "zip" => Some(Self::Zip),
            e if WORKBOOK_EXTENSIONS.contains(&e) => Some(Self::Workbook),
            _ => None,
        }
    }
}

/// Reads every supported file under a root (or the root itself if it is a file)
#[derive(Debug, Clone)]
pub struct FolderSource {
    root: PathBuf,
    name: String,
    encodings: Vec<String>,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: root.display().to_string(),
            root,
            encodings: DEFAULT_TEXT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Encodings tried for CSV/TSV files
    pub fn with_encodings(mut self, encodings: Vec<String>) -> Self {
        if !encodings.is_empty() {
            self.encodings = encodings;
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Supported files under the root, sorted by path
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn label(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).ok().filter(|p| !p.as_os_str().is_empty());
        let shown = match relative {
            Some(rel) => rel,
            None => Path::new(path.file_name().unwrap_or(path.as_os_str())),
        };
        shown.to_string_lossy().replace('\\', "/")
    }

    fn read_file(&self, path: &Path, load: &mut SourceLoad) {
        let label = self.label(path);
        let Some(kind) = InputKind::of(&label) else {
            return;
        };
        // Periods come from the real location, so a single file still picks
        // up its parent folder
        let period = Period::infer(path);

        let read = fs::read(path).map_err(Error::from).and_then(|bytes| match kind {
            InputKind::Zip => self.read_zip(&label, period, bytes, load),
            _ => self.read_item(&label, period, kind, bytes).map(|item| load.items.push(item)),
        });
        if let Err(e) = read {
            load.failures.push(SourceFailure {
                label,
                error: e.to_string(),
            });
        }
    }

    fn read_item(&self, label: &str, period: Option<Period>, kind: InputKind, bytes: Vec<u8>) -> Result<SourceItem> {
        let item = match kind {
            InputKind::Csv => SourceItem::table(label, period, vec![self.delimited(label, &bytes, b',')?]),
            InputKind::Tsv => SourceItem::table(label, period, vec![self.delimited(label, &bytes, b'\t')?]),
            InputKind::Text => SourceItem::text(label, period, bytes),
            InputKind::Workbook => SourceItem::table(label, period, read_workbook(label, bytes)?),
            InputKind::Zip => return Err(Error::validation(format!("{}: nested archive", label))),
        };
        Ok(item)
    }

    fn delimited(&self, label: &str, bytes: &[u8], delimiter: u8) -> Result<RawSheet> {
        read_delimited(label, bytes, delimiter, &self.encodings)
    }

    /// Expand an archive in memory. Entries get their own period from their
    /// path inside the archive, falling back to the archive's.
    fn read_zip(&self, label: &str, period: Option<Period>, bytes: Vec<u8>, load: &mut SourceLoad) -> Result<()> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::validation(format!("{}: {}", label, e)))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| Error::validation(format!("{}: {}", label, e)))?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let Some(kind) = InputKind::of(&entry_name) else {
                continue;
            };
            let entry_label = format!("{}/{}", label, entry_name);
            let entry_period = Period::infer(Path::new(&entry_name)).or(period);

            let mut content = Vec::new();
            let read = entry
                .read_to_end(&mut content)
                .map_err(Error::from)
                .and_then(|_| self.read_item(&entry_label, entry_period, kind, content));
            match read {
                Ok(item) => load.items.push(item),
                Err(e) => load.failures.push(SourceFailure {
                    label: entry_label,
                    error: e.to_string(),
                }),
            }
        }
        Ok(())
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

impl SourceProvider for FolderSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<SourceLoad> {
        if !self.root.exists() {
            return Err(Error::validation(format!("Path not found: {}", self.root.display())));
        }
        let mut load = SourceLoad::default();
        for path in self.list_files()? {
            self.read_file(&path, &mut load);
        }
        Ok(load)
    }
}
