use std::{fs::OpenOptions, io::Write, path::Path};

use color_eyre::{eyre::eyre, Result};
use strongbox_core::{importer::FileImporter, storage::SecureFileStore, FileCategory};
use strongbox_interactor::{category_for, ImportOutcome, ImportStage, SecureFileSystemInteractor};
use tracing::debug;

pub fn import<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    source: &Path,
    name: Option<String>,
    image: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| eyre!("cannot derive an entry name from {}", source.display()))?,
    };
    let category = if image {
        FileCategory::Image
    } else {
        category_for(&name)
    };
    let progress = |stage: ImportStage| debug!(?stage, "import progress");

    let outcome = sut.try_import_to_file(
        &FileImporter::new().load_file(source),
        &name,
        category,
        Some(&progress),
    )?;
    match outcome {
        ImportOutcome::Imported { size } => {
            writeln!(out, "Imported {name} ({size} bytes, {category})")?;
            Ok(())
        }
        ImportOutcome::Refused => Err(eyre!(
            "{name} already exists; pick another --name or delete it first"
        )),
    }
}

/// Writes the decrypted entry to `dest`; never clobbers an existing file.
pub fn export<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    name: &str,
    dest: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    let bytes = sut.store().load_bytes_from_file(name)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| eyre!("cannot create {}: {e}", dest.display()))?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    writeln!(
        out,
        "Exported {name} to {} ({} bytes)",
        dest.display(),
        bytes.len()
    )?;
    Ok(())
}

pub fn list<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    category: Option<FileCategory>,
    out: &mut dyn Write,
) -> Result<()> {
    let names = sut.list(category)?;
    if names.is_empty() {
        writeln!(out, "No entries.")?;
        return Ok(());
    }
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

pub fn info<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    name: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let info = sut.info(name)?;
    let category = sut.store().get_details(name)?.category;
    writeln!(out, "Name:     {}", info.file_name)?;
    writeln!(out, "Category: {category}")?;
    writeln!(out, "Size:     {} bytes", info.size)?;
    writeln!(out, "Created:  {}", info.create_date.to_rfc3339())?;
    Ok(())
}

pub fn rename<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    old: &str,
    new: &str,
    out: &mut dyn Write,
) -> Result<()> {
    sut.rename(old, new)?;
    writeln!(out, "Renamed {old} -> {new}")?;
    Ok(())
}

pub fn touch<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    name: &str,
    out: &mut dyn Write,
) -> Result<()> {
    sut.touch(name)?;
    writeln!(out, "Touched {name}")?;
    Ok(())
}

pub fn delete<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    name: &str,
    out: &mut dyn Write,
) -> Result<()> {
    sut.delete(name)?;
    writeln!(out, "Deleted {name}")?;
    Ok(())
}

/// Decrypts every entry; a tampered payload fails the whole run.
pub fn verify<S: SecureFileStore>(
    sut: &SecureFileSystemInteractor<S>,
    out: &mut dyn Write,
) -> Result<()> {
    let names = sut.list(None)?;
    let mut total = 0usize;
    for name in &names {
        let bytes = sut
            .store()
            .load_bytes_from_file(name)
            .map_err(|e| eyre!("{name}: {e}"))?;
        total += bytes.len();
    }
    writeln!(out, "Storage: ok ({} entries, {total} bytes)", names.len())?;
    Ok(())
}
