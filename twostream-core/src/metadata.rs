//! Video metadata: frame counts, split manifests and the read-only store
//! that joins them.
//!
//! The frame-count table is a JSON object keyed by video name. Names may be
//! raw file names (`v_ApplyEyeMakeup_g01_c01.avi`); they are normalized to
//! the bare identifier (`ApplyEyeMakeup_g01_c01`) that frame directories and
//! split manifests are matched on.
//!
//! Split manifests list one video per line as `<path or id> [<label>]` with
//! 1-based labels, the layout of the UCF101 `trainlist`/`testlist` files.
//! Lines without a label take it from a class index (`classInd.txt`) through
//! the class directory in the path.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::{debug, warn};

use crate::error::{CoreError, CoreResult};

/// One video of the split, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: String,
    pub frame_count: u32,
    /// 0-based class label
    pub label: usize,
}

/// Strips directories, a leading `v_` and the extension from a video name.
///
/// # Examples
///
/// ```rust
/// use twostream_core::metadata::normalize_video_name;
///
/// assert_eq!(normalize_video_name("v_ApplyEyeMakeup_g01_c01.avi"), "ApplyEyeMakeup_g01_c01");
/// assert_eq!(normalize_video_name("ApplyEyeMakeup/v_ApplyEyeMakeup_g08_c01.avi"), "ApplyEyeMakeup_g08_c01");
/// assert_eq!(normalize_video_name("Biking_g02_c03"), "Biking_g02_c03");
/// ```
#[must_use]
pub fn normalize_video_name(raw: &str) -> &str {
    let file_name = raw.rsplit('/').next().unwrap_or(raw);
    let stem = file_name.strip_prefix("v_").unwrap_or(file_name);
    stem.split('.').next().unwrap_or(stem)
}

// ============================================================================
// FRAME COUNT TABLE
// ============================================================================

/// Mapping from normalized video identifier to total frame count.
#[derive(Debug, Clone, Default)]
pub struct FrameCountTable {
    counts: BTreeMap<String, u32>,
}

impl FrameCountTable {
    /// Parses a JSON object of `name -> frame count`.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let raw: BTreeMap<String, u32> = serde_json::from_str(json)?;
        let mut counts = BTreeMap::new();
        for (name, count) in raw {
            let id = normalize_video_name(&name).to_string();
            if let Some(previous) = counts.insert(id.clone(), count) {
                warn!("Frame count for '{id}' given twice ({previous} and {count}); keeping {count}");
            }
        }
        Ok(Self { counts })
    }

    /// Loads the table from a JSON file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&contents)?;
        debug!("Loaded {} frame counts from {}", table.len(), path.display());
        Ok(table)
    }

    #[must_use]
    pub fn get(&self, video_id: &str) -> Option<u32> {
        self.counts.get(video_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u32)> for FrameCountTable {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self {
            counts: iter
                .into_iter()
                .map(|(name, count)| (normalize_video_name(&name).to_string(), count))
                .collect(),
        }
    }
}

// ============================================================================
// CLASS INDEX AND SPLIT MANIFEST
// ============================================================================

/// Class name to 0-based label, parsed from `<1-based index> <ClassName>` lines.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    labels: HashMap<String, usize>,
}

impl ClassIndex {
    pub fn parse(contents: &str) -> CoreResult<Self> {
        let mut labels = HashMap::new();
        for (line_index, line) in contents.lines().enumerate() {
            let line_number = line_index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [] => continue,
                [index, name] => {
                    let label = parse_one_based(index, line_number)?;
                    if labels.insert((*name).to_string(), label).is_some() {
                        return Err(CoreError::SplitParse {
                            line: line_number,
                            reason: format!("class '{name}' listed twice"),
                        });
                    }
                }
                _ => {
                    return Err(CoreError::SplitParse {
                        line: line_number,
                        reason: "expected '<index> <class name>'".to_string(),
                    });
                }
            }
        }
        Ok(Self { labels })
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    #[must_use]
    pub fn label_of(&self, class_name: &str) -> Option<usize> {
        self.labels.get(class_name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One `(video, label)` pair of a split manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitEntry {
    pub video_id: String,
    /// 0-based class label
    pub label: usize,
}

fn parse_one_based(field: &str, line: usize) -> CoreResult<usize> {
    let value: usize = field.parse().map_err(|_| CoreError::SplitParse {
        line,
        reason: format!("label '{field}' is not a non-negative integer"),
    })?;
    if value == 0 {
        return Err(CoreError::SplitParse {
            line,
            reason: "labels are 1-based; got 0".to_string(),
        });
    }
    Ok(value - 1)
}

/// Parses a split manifest in file order.
///
/// Blank lines are skipped; line numbers in errors are 1-based and count
/// blank lines.
pub fn parse_split_manifest(contents: &str, classes: Option<&ClassIndex>) -> CoreResult<Vec<SplitEntry>> {
    let mut entries = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (line_index, line) in contents.lines().enumerate() {
        let line_number = line_index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (path, label) = match fields.as_slice() {
            [] => continue,
            [path, label] => (*path, parse_one_based(label, line_number)?),
            [path] => {
                let class_name = path.split('/').next().filter(|_| path.contains('/'));
                let label = match (class_name, classes) {
                    (Some(name), Some(classes)) => {
                        classes.label_of(name).ok_or_else(|| CoreError::SplitParse {
                            line: line_number,
                            reason: format!("unknown class '{name}'"),
                        })?
                    }
                    _ => {
                        return Err(CoreError::SplitParse {
                            line: line_number,
                            reason: "missing label and no class index to resolve it".to_string(),
                        });
                    }
                };
                (*path, label)
            }
            _ => {
                return Err(CoreError::SplitParse {
                    line: line_number,
                    reason: format!("expected '<video> [<label>]', found {} fields", fields.len()),
                });
            }
        };

        let video_id = normalize_video_name(path).to_string();
        if video_id.is_empty() {
            return Err(CoreError::SplitParse {
                line: line_number,
                reason: "empty video name".to_string(),
            });
        }
        if let Some(first) = seen.insert(video_id.clone(), line_number) {
            return Err(CoreError::SplitParse {
                line: line_number,
                reason: format!("video '{video_id}' already listed on line {first}"),
            });
        }
        entries.push(SplitEntry { video_id, label });
    }

    Ok(entries)
}

// ============================================================================
// METADATA STORE
// ============================================================================

/// Read-only `video_id -> VideoRecord` mapping for one split.
///
/// Shared by reference (or `Arc`) between worker threads; nothing mutates it
/// after construction.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: BTreeMap<String, VideoRecord>,
}

impl MetadataStore {
    /// Joins split entries with their frame counts.
    pub fn from_split(frame_counts: &FrameCountTable, entries: &[SplitEntry]) -> CoreResult<Self> {
        let mut records = BTreeMap::new();
        for entry in entries {
            let frame_count = frame_counts
                .get(&entry.video_id)
                .ok_or_else(|| CoreError::UnknownVideo(entry.video_id.clone()))?;
            records.insert(
                entry.video_id.clone(),
                VideoRecord {
                    id: entry.video_id.clone(),
                    frame_count,
                    label: entry.label,
                },
            );
        }
        Ok(Self { records })
    }

    /// Loads the frame-count table, the manifest and (optionally) the class
    /// index from disk and joins them.
    pub fn load(frame_count_path: &Path, manifest_path: &Path, class_index_path: Option<&Path>) -> CoreResult<Self> {
        let frame_counts = FrameCountTable::load(frame_count_path)?;
        let classes = class_index_path.map(ClassIndex::load).transpose()?;
        let manifest = std::fs::read_to_string(manifest_path)?;
        let entries = parse_split_manifest(&manifest, classes.as_ref())?;
        let store = Self::from_split(&frame_counts, &entries)?;
        debug!("{} videos in split {}", store.len(), manifest_path.display());
        Ok(store)
    }

    #[must_use]
    pub fn get(&self, video_id: &str) -> Option<&VideoRecord> {
        self.records.get(video_id)
    }

    /// Records ordered by video identifier.
    pub fn records(&self) -> impl Iterator<Item = &VideoRecord> {
        self.records.values()
    }

    /// True label per video, as consumed by video-level evaluation.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, usize> {
        self.records
            .values()
            .map(|record| (record.id.clone(), record.label))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<VideoRecord> for MetadataStore {
    fn from_iter<I: IntoIterator<Item = VideoRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(|record| (record.id.clone(), record)).collect(),
        }
    }
}
