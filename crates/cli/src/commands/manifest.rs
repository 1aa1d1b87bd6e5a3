//! Write a checksum manifest for an artifact directory

use anyhow::{bail, Context, Result};
use detector_lib::{scoring::write_manifest, ArtifactBundle, MANIFEST_FILE};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{print_success, print_table, OutputFormat};

/// Row for the checksum table
#[derive(Tabled, Serialize)]
struct ChecksumRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "SHA256")]
    sha256: String,
}

/// Compute checksums for the bundle in `dir` and write `manifest.json`
///
/// The bundle is validated first so a manifest is never written for
/// incompatible artifacts. An existing manifest is replaced. When `run_id` is
/// not given, the run id carried by the artifacts (if any) is used.
pub fn manifest(dir: &Path, run_id: Option<String>, format: OutputFormat) -> Result<()> {
    let bundle = ArtifactBundle::read_parts(dir)
        .with_context(|| format!("Failed to load artifacts from {}", dir.display()))?;
    if let (Some(requested), Some(actual)) = (run_id.as_deref(), bundle.run_id()) {
        if requested != actual {
            bail!("Artifacts are from run {}, not {}", actual, requested);
        }
    }
    let run_id = run_id.or_else(|| bundle.run_id().map(str::to_string));

    let manifest = write_manifest(dir, run_id)
        .with_context(|| format!("Failed to write manifest in {}", dir.display()))?;

    let rows: Vec<ChecksumRow> = manifest
        .files
        .iter()
        .map(|(file, sha256)| ChecksumRow {
            file: file.clone(),
            sha256: sha256.clone(),
        })
        .collect();
    print_table(&rows, format);

    if format == OutputFormat::Table {
        print_success(&format!("Wrote {}", dir.join(MANIFEST_FILE).display()));
    }

    Ok(())
}
