//! Import/export of the whole store as one portable tar archive.
//!
//! Entry names are the store-relative record file names, so an
//! exported archive is exactly the record set and nothing else, and an
//! import can re-validate every entry name through the same parser the
//! directory scans use.

use crate::{parse_record_name, FileStore, Result, StoreError};
use std::fs;
use std::io::{Read, Write};
use tracing::{debug, warn};

impl FileStore {
    /// Writes every record currently in the store into a tar archive.
    ///
    /// An empty store produces an empty (but valid) archive; that is
    /// not an error.
    pub fn export_archive<W: Write>(&self, writer: W) -> Result<()> {
        let mut builder = tar::Builder::new(writer);
        for entry in fs::read_dir(self.dir())? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if parse_record_name(&name).is_none() {
                continue;
            }
            let mut file = fs::File::open(entry.path())?;
            builder.append_file(&name, &mut file)?;
        }
        builder.into_inner()?.flush()?;
        Ok(())
    }

    /// Unpacks an archive into the store, skipping every entry whose
    /// record already exists: an import never overwrites local,
    /// possibly fresher, data.
    ///
    /// Returns the number of records actually written, so the caller
    /// can decide whether anything changed.
    pub fn import_archive<R: Read>(&self, reader: R) -> Result<usize> {
        let mut archive = tar::Archive::new(reader);
        let mut imported = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let raw_path = entry.path()?.into_owned();
            // Only the final component counts; anything that is not a
            // well-formed record name is rejected, which also shuts the
            // door on path traversal.
            let name = raw_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    StoreError::InvalidArchiveEntry(raw_path.display().to_string())
                })?;
            if parse_record_name(&name).is_none() {
                warn!(entry = %name, "Skipping non-record archive entry");
                continue;
            }
            let target = self.dir().join(&name);
            if target.is_file() {
                debug!(record = %name, "Record already present, keeping local data");
                continue;
            }
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            self.write_atomic(&target, &bytes)?;
            imported += 1;
        }
        Ok(imported)
    }
}
