// 🗂️ Score Repository - one record per (case, side)
//
// Records live in insertion order (this is the file-list order) with a single
// authoritative index from (case, side) to record position. Records are only
// ever created in L/R pairs and are never deleted; the whole repository is
// replaced when a different session is loaded.

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::Path;
use uuid::Uuid;

use crate::error::{Result, ScorerError};
use crate::landmarks::{Scheme, Score, Side};

/// Version written into every persisted session
pub const FORMAT_VERSION: u32 = 1;

/// Landmark name → score (None = unset)
pub type ScoreMap = BTreeMap<String, Option<Score>>;

/// A map covering every landmark of `scheme`, all unset
pub fn empty_scores(scheme: Scheme) -> ScoreMap {
    scheme
        .landmarks()
        .iter()
        .map(|lm| (lm.name.to_string(), None))
        .collect()
}

/// Expand a supplied map to cover exactly the landmarks of `scheme`.
///
/// Landmarks missing from `supplied` come back unset. Unknown names and
/// out-of-set values are rejected.
pub fn normalize_scores(scheme: Scheme, supplied: &ScoreMap) -> Result<ScoreMap> {
    for (name, value) in supplied {
        scheme.require_landmark(name)?;
        if let Some(score) = value {
            if !scheme.accepts(*score) {
                return Err(ScorerError::InvalidScore {
                    scheme,
                    value: i64::from(score.value()),
                });
            }
        }
    }

    Ok(scheme
        .landmarks()
        .iter()
        .map(|lm| {
            let value = supplied.get(lm.name).copied().flatten();
            (lm.name.to_string(), value)
        })
        .collect())
}

// ============================================================================
// RECORDS
// ============================================================================

/// Display metadata for a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub case_id: String,
    pub case_name: String,
    pub detection_time: String,
}

impl CaseMetadata {
    /// Metadata derived from an image path: generated id, file stem as name
    pub fn from_path(case_path: &str) -> Self {
        let case_name = Path::new(case_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| case_path.to_string());

        CaseMetadata {
            case_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            case_name,
            detection_time: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub case_path: String,
    pub metadata: CaseMetadata,
    pub reviewed: bool,
    pub side: Side,
    pub jsn: ScoreMap,
    pub be: ScoreMap,
}

impl ScoreRecord {
    fn blank(case_path: &str, metadata: &CaseMetadata, side: Side) -> Self {
        ScoreRecord {
            case_path: case_path.to_string(),
            metadata: metadata.clone(),
            reviewed: false,
            side,
            jsn: empty_scores(Scheme::Jsn),
            be: empty_scores(Scheme::Be),
        }
    }

    pub fn scores(&self, scheme: Scheme) -> &ScoreMap {
        match scheme {
            Scheme::Jsn => &self.jsn,
            Scheme::Be => &self.be,
        }
    }

    /// Number of landmarks with a value, across both schemes
    pub fn scored_count(&self) -> usize {
        self.jsn.values().chain(self.be.values()).filter(|v| v.is_some()).count()
    }
}

// ============================================================================
// PERSISTED FORMAT
// ============================================================================

/// On-disk session layout
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionFile {
    pub format_version: u32,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub recent_case: Option<String>,
    pub records: Vec<PersistedRecord>,
}

/// Scores are kept as raw integers here so bad values surface as
/// `CorruptData` instead of a generic parse failure
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub case_path: String,
    #[serde(flatten)]
    pub metadata: CaseMetadata,
    pub reviewed: bool,
    pub side: Side,
    pub jsn: BTreeMap<String, Option<i64>>,
    pub be: BTreeMap<String, Option<i64>>,
}

impl From<&ScoreRecord> for PersistedRecord {
    fn from(record: &ScoreRecord) -> Self {
        let raw = |scores: &ScoreMap| -> BTreeMap<String, Option<i64>> {
            scores
                .iter()
                .map(|(name, value)| (name.clone(), value.map(|s| i64::from(s.value()))))
                .collect()
        };

        PersistedRecord {
            case_path: record.case_path.clone(),
            metadata: record.metadata.clone(),
            reviewed: record.reviewed,
            side: record.side,
            jsn: raw(&record.jsn),
            be: raw(&record.be),
        }
    }
}

fn restore_scores(
    scheme: Scheme,
    case_path: &str,
    raw: &BTreeMap<String, Option<i64>>,
) -> Result<ScoreMap> {
    let mut scores = ScoreMap::new();
    for (name, value) in raw {
        if scheme.landmark(name).is_none() {
            return Err(ScorerError::CorruptData(format!(
                "{case_path}: unknown {scheme} landmark '{name}'"
            )));
        }
        let score = match value {
            None => None,
            Some(v) => {
                let parsed = u8::try_from(*v)
                    .ok()
                    .and_then(|v| scheme.score(v).ok())
                    .ok_or_else(|| {
                        ScorerError::CorruptData(format!(
                            "{case_path}: {scheme} {name} has invalid score {v}"
                        ))
                    })?;
                Some(parsed)
            }
        };
        scores.insert(name.clone(), score);
    }
    normalize_scores(scheme, &scores)
}

// ============================================================================
// EXPORT ROWS
// ============================================================================

/// One flattened (case, side) row for tabular export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub case_path: String,
    pub case_id: String,
    pub case_name: String,
    pub detection_time: String,
    pub reviewed: bool,
    pub side: Side,
    /// (column name, value) in registry order, JSN columns first
    pub scores: Vec<(String, Option<Score>)>,
}

impl ExportRow {
    pub fn headers() -> Vec<String> {
        let mut headers: Vec<String> = [
            "case_path",
            "case_id",
            "case_name",
            "detection_time",
            "reviewed",
            "side",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();

        for scheme in Scheme::ALL {
            headers.extend(scheme.landmarks().iter().map(|lm| lm.column_name()));
        }
        headers
    }

    /// Cell values; unset scores become empty cells
    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![
            self.case_path.clone(),
            self.case_id.clone(),
            self.case_name.clone(),
            self.detection_time.clone(),
            self.reviewed.to_string(),
            self.side.to_string(),
        ];
        cells.extend(
            self.scores
                .iter()
                .map(|(_, v)| v.map(|s| s.to_string()).unwrap_or_default()),
        );
        cells
    }
}

/// Per-case completion counts
#[derive(Debug, Clone, PartialEq)]
pub struct CaseProgress {
    pub case_path: String,
    pub reviewed: bool,
    pub scored_left: usize,
    pub scored_right: usize,
    /// Landmarks per side across both schemes
    pub total_per_side: usize,
}

// ============================================================================
// REPOSITORY
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScoreRepository {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    recent_case: Option<String>,
    records: Vec<ScoreRecord>,
    index: HashMap<(String, Side), usize>,
}

impl Default for ScoreRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreRepository {
    pub fn new() -> Self {
        ScoreRepository {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            recent_case: None,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Case most recently created or updated
    pub fn recent_case(&self) -> Option<&str> {
        self.recent_case.as_deref()
    }

    pub fn contains(&self, case_path: &str) -> bool {
        self.index.contains_key(&(case_path.to_string(), Side::L))
    }

    pub fn case_count(&self) -> usize {
        self.records.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a blank L/R record pair for a new case
    pub fn create(&mut self, case_path: &str, metadata: CaseMetadata) -> Result<()> {
        if self.contains(case_path) {
            return Err(ScorerError::DuplicateCase(case_path.to_string()));
        }

        for side in Side::ALL {
            self.index
                .insert((case_path.to_string(), side), self.records.len());
            self.records
                .push(ScoreRecord::blank(case_path, &metadata, side));
        }
        self.recent_case = Some(case_path.to_string());

        info!("Created records for case {}", case_path);
        Ok(())
    }

    fn position(&self, case_path: &str, side: Side) -> Result<usize> {
        self.index
            .get(&(case_path.to_string(), side))
            .copied()
            .ok_or_else(|| ScorerError::NotFound {
                case: case_path.to_string(),
                side,
            })
    }

    pub fn record(&self, case_path: &str, side: Side) -> Result<&ScoreRecord> {
        let pos = self.position(case_path, side)?;
        Ok(&self.records[pos])
    }

    /// (JSN, BE) scores for one side of a case
    pub fn get(&self, case_path: &str, side: Side) -> Result<(&ScoreMap, &ScoreMap)> {
        let record = self.record(case_path, side)?;
        Ok((&record.jsn, &record.be))
    }

    /// Replace both score maps of a record.
    ///
    /// Full replace: any landmark absent from `jsn` / `be` ends up unset.
    pub fn update(
        &mut self,
        case_path: &str,
        side: Side,
        jsn: &ScoreMap,
        be: &ScoreMap,
    ) -> Result<()> {
        let pos = self.position(case_path, side)?;
        let jsn = normalize_scores(Scheme::Jsn, jsn)?;
        let be = normalize_scores(Scheme::Be, be)?;

        let record = &mut self.records[pos];
        record.jsn = jsn;
        record.be = be;
        self.recent_case = Some(case_path.to_string());

        debug!("Updated {} side {}", case_path, side);
        Ok(())
    }

    /// Reviewed is case-level: both records change together
    pub fn set_reviewed(&mut self, case_path: &str, state: bool) -> Result<()> {
        let left = self.position(case_path, Side::L)?;
        let right = self.position(case_path, Side::R)?;

        self.records[left].reviewed = state;
        self.records[right].reviewed = state;
        info!("Case {} reviewed = {}", case_path, state);
        Ok(())
    }

    pub fn is_reviewed(&self, case_path: &str) -> Result<bool> {
        self.record(case_path, Side::L).map(|r| r.reviewed)
    }

    /// Case identifiers in insertion order, each once
    pub fn list_cases(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.case_path.as_str()))
            .map(|r| r.case_path.as_str())
            .collect()
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    pub fn to_session_file(&self) -> SessionFile {
        SessionFile {
            format_version: FORMAT_VERSION,
            session_id: self.session_id,
            created_at: self.created_at,
            recent_case: self.recent_case.clone(),
            records: self.records.iter().map(PersistedRecord::from).collect(),
        }
    }

    /// Serialize the whole repository as pretty JSON
    pub fn serialize(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_session_file())
            .map_err(|e| ScorerError::Serialize(e.to_string()))
    }

    /// Build a repository from a session file, validating everything first
    pub fn from_session_file(file: SessionFile) -> Result<Self> {
        if file.format_version != FORMAT_VERSION {
            return Err(ScorerError::CorruptData(format!(
                "unsupported format version {}",
                file.format_version
            )));
        }

        let mut records = Vec::with_capacity(file.records.len());
        let mut index = HashMap::new();

        for raw in &file.records {
            if raw.case_path.is_empty() {
                return Err(ScorerError::CorruptData("record with empty case_path".into()));
            }
            let key = (raw.case_path.clone(), raw.side);
            if index.contains_key(&key) {
                return Err(ScorerError::CorruptData(format!(
                    "duplicate record for {} side {}",
                    raw.case_path, raw.side
                )));
            }
            index.insert(key, records.len());
            records.push(ScoreRecord {
                case_path: raw.case_path.clone(),
                metadata: raw.metadata.clone(),
                reviewed: raw.reviewed,
                side: raw.side,
                jsn: restore_scores(Scheme::Jsn, &raw.case_path, &raw.jsn)?,
                be: restore_scores(Scheme::Be, &raw.case_path, &raw.be)?,
            });
        }

        // Pairs must be complete and agree on case-level fields
        for record in &records {
            let twin = index
                .get(&(record.case_path.clone(), record.side.other()))
                .ok_or_else(|| {
                    ScorerError::CorruptData(format!(
                        "case {} is missing side {}",
                        record.case_path,
                        record.side.other()
                    ))
                })?;
            if records[*twin].reviewed != record.reviewed {
                return Err(ScorerError::CorruptData(format!(
                    "case {} has conflicting reviewed flags",
                    record.case_path
                )));
            }
            if records[*twin].metadata != record.metadata {
                return Err(ScorerError::CorruptData(format!(
                    "case {} has conflicting metadata",
                    record.case_path
                )));
            }
        }

        if let Some(recent) = &file.recent_case {
            if !index.contains_key(&(recent.clone(), Side::L)) {
                return Err(ScorerError::CorruptData(format!(
                    "recent case {recent} has no records"
                )));
            }
        }

        Ok(ScoreRepository {
            session_id: file.session_id,
            created_at: file.created_at,
            recent_case: file.recent_case,
            records,
            index,
        })
    }

    /// Parse a JSON blob into a new repository. Nothing is partially applied:
    /// on error the caller's current repository is untouched.
    pub fn deserialize(blob: &str) -> Result<Self> {
        let file: SessionFile = serde_json::from_str(blob)?;
        Self::from_session_file(file)
    }

    // ========================================================================
    // TABULAR EXPORT
    // ========================================================================

    /// One row per record, repository order
    pub fn flatten(&self) -> Vec<ExportRow> {
        self.records
            .iter()
            .map(|record| {
                let mut scores = Vec::new();
                for scheme in Scheme::ALL {
                    let map = record.scores(scheme);
                    scores.extend(scheme.landmarks().iter().map(|lm| {
                        (lm.column_name(), map.get(lm.name).copied().flatten())
                    }));
                }

                ExportRow {
                    case_path: record.case_path.clone(),
                    case_id: record.metadata.case_id.clone(),
                    case_name: record.metadata.case_name.clone(),
                    detection_time: record.metadata.detection_time.clone(),
                    reviewed: record.reviewed,
                    side: record.side,
                    scores,
                }
            })
            .collect()
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> AnyResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(ExportRow::headers())
            .context("Failed to write CSV header")?;
        for row in self.flatten() {
            wtr.write_record(row.cells())
                .with_context(|| format!("Failed to write row for {}", row.case_path))?;
        }
        wtr.flush().context("Failed to flush CSV writer")?;
        Ok(())
    }

    pub fn progress(&self) -> Vec<CaseProgress> {
        let total_per_side: usize = Scheme::ALL.iter().map(|s| s.landmarks().len()).sum();

        self.list_cases()
            .into_iter()
            .filter_map(|case| {
                let left = self.record(case, Side::L).ok()?;
                let right = self.record(case, Side::R).ok()?;
                Some(CaseProgress {
                    case_path: case.to_string(),
                    reviewed: left.reviewed,
                    scored_left: left.scored_count(),
                    scored_right: right.scored_count(),
                    total_per_side,
                })
            })
            .collect()
    }

    // ========================================================================
    // FILE BOUNDARY
    // ========================================================================

    pub fn save_to_path(&self, path: &Path) -> AnyResult<()> {
        let json = self.serialize()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        info!("Saved {} cases to {}", self.case_count(), path.display());
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> AnyResult<Self> {
        let blob = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let repo = Self::deserialize(&blob)
            .with_context(|| format!("Failed to load session {}", path.display()))?;
        info!("Loaded {} cases from {}", repo.case_count(), path.display());
        Ok(repo)
    }

    pub fn export_csv(&self, path: &Path) -> AnyResult<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create export file {}", path.display()))?;
        self.write_csv(file)?;
        info!("Exported {} rows to {}", self.records.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> CaseMetadata {
        CaseMetadata {
            case_id: format!("id-{name}"),
            case_name: name.to_string(),
            detection_time: "unknown".to_string(),
        }
    }

    fn score(scheme: Scheme, v: u8) -> Option<Score> {
        Some(scheme.score(v).unwrap())
    }

    fn scores(scheme: Scheme, pairs: &[(&str, u8)]) -> ScoreMap {
        pairs
            .iter()
            .map(|(name, v)| (name.to_string(), score(scheme, *v)))
            .collect()
    }

    fn sample_repo() -> ScoreRepository {
        let mut repo = ScoreRepository::new();
        repo.create("/data/p1.dcm", meta("p1")).unwrap();
        repo.create("/data/p2.bmp", meta("p2")).unwrap();
        repo.update(
            "/data/p1.dcm",
            Side::L,
            &scores(Scheme::Jsn, &[("MCP-T", 2), ("PIP-S", 4)]),
            &scores(Scheme::Be, &[("Ra", 5)]),
        )
        .unwrap();
        repo.set_reviewed("/data/p2.bmp", true).unwrap();
        repo
    }

    #[test]
    fn test_create_inserts_blank_pair() {
        let mut repo = ScoreRepository::new();
        repo.create("P1", meta("P1")).unwrap();

        for side in Side::ALL {
            let (jsn, be) = repo.get("P1", side).unwrap();
            assert_eq!(jsn.len(), 15);
            assert_eq!(be.len(), 16);
            assert!(jsn.values().chain(be.values()).all(|v| v.is_none()));
        }
        assert!(!repo.is_reviewed("P1").unwrap());
        assert_eq!(repo.case_count(), 1);
    }

    #[test]
    fn test_create_twice_is_duplicate() {
        let mut repo = ScoreRepository::new();
        repo.create("P1", meta("P1")).unwrap();
        let err = repo.create("P1", meta("P1")).unwrap_err();
        assert!(matches!(err, ScorerError::DuplicateCase(_)));
        assert_eq!(repo.records().len(), 2);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let repo = ScoreRepository::new();
        assert!(matches!(
            repo.get("nope", Side::R),
            Err(ScorerError::NotFound { side: Side::R, .. })
        ));
    }

    #[test]
    fn test_update_is_full_replace() {
        let mut repo = ScoreRepository::new();
        repo.create("P1", meta("P1")).unwrap();
        repo.update(
            "P1",
            Side::L,
            &scores(Scheme::Jsn, &[("MCP-T", 1), ("MCP-I", 1)]),
            &scores(Scheme::Be, &[("IP", 1)]),
        )
        .unwrap();
        repo.update(
            "P1",
            Side::L,
            &scores(Scheme::Jsn, &[("MCP-T", 2)]),
            &ScoreMap::new(),
        )
        .unwrap();

        let (jsn, be) = repo.get("P1", Side::L).unwrap();
        assert_eq!(jsn["MCP-T"], score(Scheme::Jsn, 2));
        assert_eq!(jsn["MCP-I"], None);
        assert_eq!(be["IP"], None);
        assert_eq!(jsn.len(), 15);
    }

    #[test]
    fn test_update_missing_record() {
        let mut repo = ScoreRepository::new();
        let err = repo
            .update("P9", Side::L, &ScoreMap::new(), &ScoreMap::new())
            .unwrap_err();
        assert!(matches!(err, ScorerError::NotFound { .. }));
    }

    #[test]
    fn test_update_rejects_unknown_landmark_without_change() {
        let mut repo = ScoreRepository::new();
        repo.create("P1", meta("P1")).unwrap();
        repo.update("P1", Side::R, &scores(Scheme::Jsn, &[("MCP-T", 3)]), &ScoreMap::new())
            .unwrap();

        let mut bad = ScoreMap::new();
        bad.insert("IP".to_string(), None);
        let err = repo.update("P1", Side::R, &bad, &ScoreMap::new()).unwrap_err();
        assert!(matches!(err, ScorerError::UnknownLandmark { .. }));

        let (jsn, _) = repo.get("P1", Side::R).unwrap();
        assert_eq!(jsn["MCP-T"], score(Scheme::Jsn, 3));
    }

    #[test]
    fn test_set_reviewed_affects_both_sides() {
        let mut repo = ScoreRepository::new();
        repo.create("P1", meta("P1")).unwrap();
        repo.set_reviewed("P1", true).unwrap();
        assert!(repo.record("P1", Side::L).unwrap().reviewed);
        assert!(repo.record("P1", Side::R).unwrap().reviewed);

        assert!(matches!(
            repo.set_reviewed("P2", true),
            Err(ScorerError::NotFound { case, side: Side::L }) if case == "P2"
        ));
        assert!(matches!(repo.is_reviewed("P2"), Err(ScorerError::NotFound { .. })));
    }

    #[test]
    fn test_list_cases_in_insertion_order() {
        let mut repo = ScoreRepository::new();
        for case in ["c", "a", "b"] {
            repo.create(case, meta(case)).unwrap();
        }
        repo.update("a", Side::R, &ScoreMap::new(), &ScoreMap::new()).unwrap();
        assert_eq!(repo.list_cases(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_serialize_round_trip() {
        let repo = sample_repo();
        let blob = repo.serialize().unwrap();
        let restored = ScoreRepository::deserialize(&blob).unwrap();

        assert_eq!(restored.list_cases(), repo.list_cases());
        assert_eq!(restored.session_id(), repo.session_id());
        assert_eq!(restored.created_at(), repo.created_at());
        assert_eq!(restored.recent_case(), repo.recent_case());
        for case in repo.list_cases() {
            for side in Side::ALL {
                assert_eq!(restored.get(case, side).unwrap(), repo.get(case, side).unwrap());
            }
            assert_eq!(restored.is_reviewed(case).unwrap(), repo.is_reviewed(case).unwrap());
        }
    }

    #[test]
    fn test_unset_survives_round_trip() {
        let repo = sample_repo();
        let restored = ScoreRepository::deserialize(&repo.serialize().unwrap()).unwrap();
        let (jsn, _) = restored.get("/data/p1.dcm", Side::L).unwrap();
        assert_eq!(jsn["MCP-I"], None);
        assert_eq!(jsn["MCP-T"], score(Scheme::Jsn, 2));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            ScoreRepository::deserialize("{not json"),
            Err(ScorerError::CorruptData(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_invalid_be_score() {
        let repo = sample_repo();
        let mut value: serde_json::Value = serde_json::from_str(&repo.serialize().unwrap()).unwrap();
        value["records"][0]["be"]["Ra"] = serde_json::json!(4);
        let err = ScoreRepository::deserialize(&value.to_string()).unwrap_err();
        assert!(matches!(err, ScorerError::CorruptData(_)));
    }

    #[test]
    fn test_deserialize_rejects_unpaired_case() {
        let repo = sample_repo();
        let mut value: serde_json::Value = serde_json::from_str(&repo.serialize().unwrap()).unwrap();
        value["records"].as_array_mut().unwrap().remove(1);
        let err = ScoreRepository::deserialize(&value.to_string()).unwrap_err();
        assert!(matches!(err, ScorerError::CorruptData(msg) if msg.contains("missing side")));
    }

    #[test]
    fn test_deserialize_rejects_conflicting_metadata() {
        let repo = sample_repo();
        let mut value: serde_json::Value = serde_json::from_str(&repo.serialize().unwrap()).unwrap();
        assert_eq!(value["records"][1]["case_path"], "/data/p1.dcm");
        assert_eq!(value["records"][1]["side"], "R");
        value["records"][1]["case_id"] = "zzzz".into();
        value["records"][1]["case_name"] = "someone-else".into();

        let err = ScoreRepository::deserialize(&value.to_string()).unwrap_err();
        assert!(matches!(err, ScorerError::CorruptData(msg) if msg.contains("conflicting metadata")));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_record() {
        let repo = sample_repo();
        let mut value: serde_json::Value = serde_json::from_str(&repo.serialize().unwrap()).unwrap();
        let first = value["records"][0].clone();
        value["records"].as_array_mut().unwrap().push(first);
        assert!(ScoreRepository::deserialize(&value.to_string()).is_err());
    }

    #[test]
    fn test_flatten_rows() {
        let repo = sample_repo();
        let rows = repo.flatten();
        assert_eq!(rows.len(), 2 * repo.case_count());

        let keys: HashSet<_> = rows.iter().map(|r| (r.case_path.clone(), r.side)).collect();
        assert_eq!(keys.len(), rows.len());

        assert_eq!(rows[0].case_path, "/data/p1.dcm");
        assert_eq!(rows[0].side, Side::L);
        assert_eq!(rows[0].scores.len(), 31);
        assert_eq!(rows[0].scores[0], ("JSN_MCP_T".to_string(), score(Scheme::Jsn, 2)));
        assert_eq!(rows[0].scores[15].0, "BE_MCP_T");
        assert!(rows[2].reviewed && rows[3].reviewed);
    }

    #[test]
    fn test_write_csv_empty_cells_for_unset() {
        let repo = sample_repo();
        let mut out = Vec::new();
        repo.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("case_path,case_id,case_name,detection_time,reviewed,side,JSN_MCP_T"));
        assert!(lines[1].starts_with("/data/p1.dcm,id-p1,p1,unknown,false,L,2,,"));
        assert!(lines[1].ends_with(",5"));
    }

    #[test]
    fn test_progress_counts() {
        let repo = sample_repo();
        let progress = repo.progress();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].scored_left, 3);
        assert_eq!(progress[0].scored_right, 0);
        assert_eq!(progress[0].total_per_side, 31);
        assert!(progress[1].reviewed);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let repo = sample_repo();
        repo.save_to_path(&path).unwrap();

        let loaded = ScoreRepository::load_from_path(&path).unwrap();
        assert_eq!(loaded.list_cases(), repo.list_cases());
    }

    #[test]
    fn test_metadata_from_path() {
        let meta = CaseMetadata::from_path("/scans/hand_007.dcm");
        assert_eq!(meta.case_name, "hand_007");
        assert_eq!(meta.case_id.len(), 8);
        assert_eq!(meta.detection_time, "unknown");
    }
}
