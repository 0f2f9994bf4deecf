//! Persistence seam and the two-phase commit.
//!
//! A page is written in two phases: one create request carrying the
//! resolved tree, then one append per marker, in marker order, carrying the
//! deferred group. [`DirectorySink`] is a local stand-in that records both
//! phases as JSON:
//!
//! ```text
//! <root>/<page_id>/
//! ├── page.json      create request (title, blocks)
//! ├── appends.json   append requests, in the order received
//! └── audit.json     audit report and recommendations
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use sn2n_shared::{
    AuditReport, ContentBlock, DeferredBlocks, MarkerId, Recommendation, Result, Sn2nError,
};

use crate::markers::reattach;
use crate::pipeline::PageConversion;

/// Identifier the persistence collaborator assigned to a created page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePageId(pub String);

impl std::fmt::Display for RemotePageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persistence collaborator.
pub trait PageSink {
    /// Create a page holding `blocks`.
    fn create_page(&mut self, title: Option<&str>, blocks: &[ContentBlock]) -> Result<RemotePageId>;

    /// Attach `blocks` under the block carrying `marker`.
    fn append_blocks(
        &mut self,
        page: &RemotePageId,
        marker: MarkerId,
        blocks: &[ContentBlock],
    ) -> Result<()>;

    /// Keep the audit outcome next to the page. Optional.
    fn record_audit(
        &mut self,
        _page: &RemotePageId,
        _report: &AuditReport,
        _recommendations: &[Recommendation],
    ) -> Result<()> {
        Ok(())
    }
}

/// Whether pages that failed their audit are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// Write every page; failures travel with their audit record.
    #[default]
    Always,
    /// Skip pages whose audit failed.
    RequirePassingAudit,
}

/// What [`commit`] did with a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { page: RemotePageId, appends: usize },
    Skipped { reason: String },
}

/// Write `page` through `sink`: create, then one append per marker.
///
/// Markers are appended in ascending order, which attaches every block
/// before any group filed beneath it.
#[instrument(skip_all, fields(title = page.display_title(), markers = page.deferred.len()))]
pub fn commit(
    sink: &mut dyn PageSink,
    page: &PageConversion,
    policy: CommitPolicy,
) -> Result<CommitOutcome> {
    if policy == CommitPolicy::RequirePassingAudit && !page.passed() {
        let reason = format!(
            "audit failed at {:.1}% coverage",
            page.audit.coverage_percent()
        );
        warn!(%reason, "page not committed");
        return Ok(CommitOutcome::Skipped { reason });
    }

    let id = sink.create_page(page.title.as_deref(), &page.blocks)?;
    for (marker, blocks) in &page.deferred {
        sink.append_blocks(&id, *marker, blocks)?;
    }
    sink.record_audit(&id, &page.audit, &page.recommendations)?;

    info!(page = %id, appends = page.deferred.len(), "page committed");
    Ok(CommitOutcome::Committed {
        page: id,
        appends: page.deferred.len(),
    })
}

// ---------------------------------------------------------------------------
// Directory sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPage {
    id: RemotePageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    created_at: DateTime<Utc>,
    blocks: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAppend {
    marker: MarkerId,
    blocks: Vec<ContentBlock>,
}

#[derive(Serialize)]
struct StoredAudit<'a> {
    report: &'a AuditReport,
    recommendations: &'a [Recommendation],
}

/// Local sink writing each page into its own directory.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    appends: HashMap<RemotePageId, Vec<StoredAppend>>,
}

impl DirectorySink {
    /// Open (creating if needed) a sink rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| Sn2nError::io(&root, e))?;
        Ok(Self {
            root,
            appends: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_dir(&self, page: &RemotePageId) -> PathBuf {
        self.root.join(&page.0)
    }

    /// Read a stored page back and rebuild its natural tree.
    pub fn read_back(&self, page: &RemotePageId) -> Result<Vec<ContentBlock>> {
        let dir = self.page_dir(page);
        let stored: StoredPage = read_json(&dir.join("page.json"))?;
        let appends_path = dir.join("appends.json");
        let appends: Vec<StoredAppend> = if appends_path.exists() {
            read_json(&appends_path)?
        } else {
            Vec::new()
        };
        let deferred: DeferredBlocks = appends
            .into_iter()
            .map(|append| (append.marker, append.blocks))
            .collect();
        Ok(reattach(&stored.blocks, &deferred))
    }
}

impl PageSink for DirectorySink {
    fn create_page(&mut self, title: Option<&str>, blocks: &[ContentBlock]) -> Result<RemotePageId> {
        let id = RemotePageId(uuid::Uuid::now_v7().to_string());
        let dir = self.page_dir(&id);
        std::fs::create_dir_all(&dir).map_err(|e| Sn2nError::io(&dir, e))?;

        let stored = StoredPage {
            id: id.clone(),
            title: title.map(str::to_string),
            created_at: Utc::now(),
            blocks: blocks.to_vec(),
        };
        write_json_atomic(&dir.join("page.json"), &stored)?;
        debug!(page = %id, blocks = blocks.len(), "page created");
        Ok(id)
    }

    fn append_blocks(
        &mut self,
        page: &RemotePageId,
        marker: MarkerId,
        blocks: &[ContentBlock],
    ) -> Result<()> {
        let dir = self.page_dir(page);
        if !dir.join("page.json").exists() {
            return Err(Sn2nError::Persistence(format!(
                "append to unknown page {page}"
            )));
        }
        let appends = self.appends.entry(page.clone()).or_default();
        if appends.iter().any(|a| a.marker == marker) {
            return Err(Sn2nError::Persistence(format!(
                "{marker} already appended to page {page}"
            )));
        }
        appends.push(StoredAppend {
            marker,
            blocks: blocks.to_vec(),
        });
        write_json_atomic(&dir.join("appends.json"), appends)?;
        debug!(page = %page, %marker, blocks = blocks.len(), "blocks appended");
        Ok(())
    }

    fn record_audit(
        &mut self,
        page: &RemotePageId,
        report: &AuditReport,
        recommendations: &[Recommendation],
    ) -> Result<()> {
        let record = StoredAudit {
            report,
            recommendations,
        };
        write_json_atomic(&self.page_dir(page).join("audit.json"), &record)
    }
}

/// Copy a source file that failed its audit into `dir` for another pass.
pub fn queue_for_reprocess(source: &Path, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| Sn2nError::io(dir, e))?;
    let name = source
        .file_name()
        .ok_or_else(|| Sn2nError::validation(format!("{} has no file name", source.display())))?;
    let target = dir.join(name);
    std::fs::copy(source, &target).map_err(|e| Sn2nError::io(&target, e))?;
    debug!(from = %source.display(), to = %target.display(), "queued for reprocessing");
    Ok(target)
}

/// Write pretty JSON through a temp file and rename.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&temp, json).map_err(|e| Sn2nError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| Sn2nError::io(path, e))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| Sn2nError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}
