//! Local staging for size-bounded uploads.
//!
//! Large submission files are split into parts of at most `max_records`
//! data lines each (the header line is repeated in every part) and written
//! under the staging directory. The parts are listed in a manifest, a flat
//! [`ChangeStore`], until they are acknowledged by the remote endpoint.
//!
//! ```text
//! <hub>/<staging.dir>/
//!   changes.json                  manifest { "changes": [ "<staging.dir>/x_part_0.csv", … ] }
//!   x_part_0.csv
//!   x_part_1.csv
//! ```
//!
//! Records are split on line boundaries; quoted fields spanning several
//! lines are not supported.

use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use hubsync_core::{ChangeDescriptor, HubConfig, OwnerKey};

use crate::atomic;
use crate::error::{io_err, StoreError};
use crate::layout::FlatLayout;
use crate::store::ChangeStore;

/// Staging area rooted at a hub checkout.
#[derive(Debug, Clone)]
pub struct Staging {
    hub_path: PathBuf,
    dir: PathBuf,
    manifest: ChangeStore<FlatLayout>,
    max_records: usize,
}

impl Staging {
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            hub_path: config.hub_path.clone(),
            dir: config.staging.dir.clone(),
            manifest: ChangeStore::at(config.manifest_path()),
            max_records: config.staging.max_records.max(1),
        }
    }

    /// Absolute staging directory.
    pub fn dir(&self) -> PathBuf {
        self.hub_path.join(&self.dir)
    }

    pub fn manifest(&self) -> &ChangeStore<FlatLayout> {
        &self.manifest
    }

    /// Absolute path of a hub-relative descriptor.
    pub fn resolve(&self, descriptor: &ChangeDescriptor) -> PathBuf {
        self.hub_path.join(descriptor.as_str())
    }

    /// Split every file in `changes` into staged parts and list them in the
    /// manifest. Returns the new part descriptors, relative to the hub path.
    pub fn stage(&self, changes: &[ChangeDescriptor]) -> Result<Vec<ChangeDescriptor>, StoreError> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        self.manifest.init()?;

        let mut staged = Vec::new();
        for change in changes {
            let parts = self.split(change)?;
            tracing::info!(file = %change, parts = parts.len(), "staged file");
            let entries: Vec<_> = parts.iter().map(|p| (OwnerKey::Flat, p.clone())).collect();
            self.manifest.merge_entries(&entries)?;
            staged.extend(parts);
        }
        Ok(staged)
    }

    /// Staged parts still awaiting acknowledgement, sorted.
    pub fn parts(&self) -> Result<Vec<ChangeDescriptor>, StoreError> {
        if !self.manifest.exists() {
            return Ok(Vec::new());
        }
        Ok(self.manifest.pending()?.into_iter().map(|(_, d)| d).collect())
    }

    /// Delete acknowledged parts and shrink the manifest to `remaining`.
    ///
    /// When nothing remains, the manifest and the (then empty) staging
    /// directory are removed as well. Returns `true` in that case.
    pub fn settle(
        &self,
        acknowledged: &[ChangeDescriptor],
        remaining: &[ChangeDescriptor],
    ) -> Result<bool, StoreError> {
        for part in acknowledged {
            let path = self.resolve(part);
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(part = %part, "removed acknowledged part"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(&path, e)),
            }
        }

        if !remaining.is_empty() {
            let entries: Vec<_> = remaining.iter().map(|d| (OwnerKey::Flat, d.clone())).collect();
            self.manifest.reseed_entries(&entries)?;
            return Ok(false);
        }

        match std::fs::remove_file(self.manifest.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(self.manifest.path(), e)),
        }
        let dir = self.dir();
        if let Err(err) = std::fs::remove_dir(&dir) {
            tracing::warn!(dir = %dir.display(), error = %err, "staging directory not removed");
        }
        Ok(true)
    }

    fn split(&self, change: &ChangeDescriptor) -> Result<Vec<ChangeDescriptor>, StoreError> {
        let source = self.resolve(change);
        let file = std::fs::File::open(&source).map_err(|e| io_err(&source, e))?;
        let mut lines = BufReader::new(file).lines();

        let Some(header) = lines.next().transpose().map_err(|e| io_err(&source, e))? else {
            tracing::warn!(file = %change, "empty file, nothing staged");
            return Ok(Vec::new());
        };

        let (stem, ext) = split_name(&source);
        let mut parts = Vec::new();
        let mut chunk: Vec<String> = Vec::with_capacity(self.max_records.min(4096));

        for line in lines {
            chunk.push(line.map_err(|e| io_err(&source, e))?);
            if chunk.len() == self.max_records {
                parts.push(self.write_part(&stem, &ext, parts.len(), &header, &chunk)?);
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            parts.push(self.write_part(&stem, &ext, parts.len(), &header, &chunk)?);
        }
        Ok(parts)
    }

    fn write_part(
        &self,
        stem: &str,
        ext: &str,
        index: usize,
        header: &str,
        rows: &[String],
    ) -> Result<ChangeDescriptor, StoreError> {
        let name = format!("{stem}_part_{index}{ext}");
        let mut body = String::with_capacity(header.len() + rows.iter().map(|r| r.len() + 1).sum::<usize>() + 1);
        body.push_str(header);
        body.push('\n');
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        atomic::write_bytes(&self.dir().join(&name), body.as_bytes())?;
        Ok(ChangeDescriptor::from(relative_descriptor(&self.dir, &name)))
    }
}

/// `("2024-01-01-team-model", ".csv")` for `…/2024-01-01-team-model.csv`.
fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// Hub-relative, `/`-separated descriptor for a file in the staging dir.
fn relative_descriptor(dir: &Path, name: &str) -> String {
    let mut segments: Vec<String> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    segments.push(name.to_owned());
    segments.join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
