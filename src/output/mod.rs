// Artifact delivery: encoded page layers -> output directory + manifest

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{MrcError, Result};
use crate::mrc::{ArtifactFormat, EncodedArtifact, PageOutput};
use crate::telemetry::context::ErrorSet;

/// Receives finished pages in page order. Dropping a delivered
/// [`PageOutput`] removes its scratch files.
pub trait PageSink: Send {
    fn deliver(&mut self, page_index: usize, output: PageOutput) -> Result<()>;

    /// Called once after the last page with the run's warnings.
    fn finish(&mut self, warnings: &ErrorSet) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestArtifact {
    pub file: String,
    pub format: ArtifactFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestPage {
    pub index: usize,
    pub mask: ManifestArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<ManifestArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<ManifestArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub pages: Vec<ManifestPage>,
    pub warnings: Vec<&'static str>,
}

/// Writes `%06d_mask.*`, `%06d_fg.jp2` and `%06d_bg.jp2` per page, then a
/// `manifest.json` describing them.
pub struct DirectorySink {
    dir: PathBuf,
    pages: Vec<ManifestPage>,
}

pub const MANIFEST_FILE: &str = "manifest.json";

impl DirectorySink {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            MrcError::artifact(format!("Failed to create output directory {}: {e}", dir.display()))
        })?;
        Ok(DirectorySink {
            dir: dir.to_path_buf(),
            pages: Vec::new(),
        })
    }

    fn write_artifact(
        &self,
        page_index: usize,
        role: &str,
        artifact: &EncodedArtifact,
    ) -> Result<ManifestArtifact> {
        let file = format!("{page_index:06}_{role}.{}", artifact.format.extension());
        let path = self.dir.join(&file);
        std::fs::write(&path, &artifact.bytes).map_err(|e| {
            MrcError::artifact(format!("Failed to write {}: {e}", path.display()))
        })?;
        Ok(ManifestArtifact {
            file,
            format: artifact.format,
            width: artifact.width,
            height: artifact.height,
        })
    }
}

impl PageSink for DirectorySink {
    fn deliver(&mut self, page_index: usize, output: PageOutput) -> Result<()> {
        let page = match &output {
            PageOutput::Mrc(layers) => ManifestPage {
                index: page_index,
                mask: self.write_artifact(page_index, "mask", &layers.mask)?,
                foreground: Some(self.write_artifact(page_index, "fg", &layers.foreground)?),
                background: Some(self.write_artifact(page_index, "bg", &layers.background)?),
            },
            PageOutput::Bilevel(mask) => ManifestPage {
                index: page_index,
                mask: self.write_artifact(page_index, "mask", mask)?,
                foreground: None,
                background: None,
            },
        };
        debug!(page = page_index, dir = %self.dir.display(), "page delivered");
        self.pages.push(page);
        Ok(())
    }

    fn finish(&mut self, warnings: &ErrorSet) -> Result<()> {
        let manifest = Manifest {
            pages: std::mem::take(&mut self.pages),
            warnings: warnings.codes(),
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| MrcError::artifact(format!("Failed to serialize manifest: {e}")))?;
        std::fs::write(self.dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}
