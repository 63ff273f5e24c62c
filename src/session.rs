// 🧭 Session Controller - the only component that knows the current case
//
// State: current case, scheme, displayed side, highlighted landmark.
// Edits land in the Side-Cache; the repository only sees them at commit
// points (case change, save, export), and always as a full two-sided update.

use anyhow::{Context, Result as AnyResult};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

use crate::case_list::is_supported_image;
use crate::error::{Result, ScorerError};
use crate::landmarks::{Landmark, Scheme, Score, Side, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::layout::{LayoutEngine, Point, Rect, Size};
use crate::repository::{CaseMetadata, ScoreRepository};
use crate::side_cache::{CacheSnapshot, SideCache};

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Image viewer seam. The controller never sees pixels, only whether the
/// image could be shown.
pub trait ImageDisplay {
    fn display_image(&mut self, path: &str) -> bool;
}

/// Accepts any existing file with a supported image extension
#[derive(Debug, Default, Clone, Copy)]
pub struct FileProbe;

impl ImageDisplay for FileProbe {
    fn display_image(&mut self, path: &str) -> bool {
        let path = Path::new(path);
        path.is_file() && is_supported_image(path)
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct SessionController<D: ImageDisplay> {
    repo: ScoreRepository,
    display: D,
    cases: Vec<String>,
    current: Option<usize>,
    scheme: Scheme,
    side: Side,
    highlighted: Option<&'static str>,
    /// Present only while a case is open and its image is shown
    cache: Option<SideCache>,
    layout: LayoutEngine,
    container: Size,
    display_order: BTreeMap<Scheme, Vec<&'static str>>,
}

impl<D: ImageDisplay> SessionController<D> {
    pub fn new(display: D) -> Self {
        let reference = Size::new(REFERENCE_WIDTH, REFERENCE_HEIGHT);
        let mut controller = SessionController {
            repo: ScoreRepository::new(),
            display,
            cases: Vec::new(),
            current: None,
            scheme: Scheme::Jsn,
            side: Side::L,
            highlighted: None,
            cache: None,
            layout: LayoutEngine::new(reference),
            container: reference,
            display_order: Scheme::ALL
                .iter()
                .map(|s| (*s, s.landmarks().iter().map(|lm| lm.name).collect::<Vec<_>>()))
                .collect(),
        };
        controller.relayout();
        controller
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn repository(&self) -> &ScoreRepository {
        &self.repo
    }

    pub fn cases(&self) -> &[String] {
        &self.cases
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_case(&self) -> Option<&str> {
        self.current.map(|i| self.cases[i].as_str())
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn highlighted(&self) -> Option<&'static str> {
        self.highlighted
    }

    /// Scoring controls are disabled until a case image is on screen
    pub fn controls_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache(&self) -> Option<&SideCache> {
        self.cache.as_ref()
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Value shown on the control for `name` (current scheme and side)
    pub fn value(&self, name: &str) -> Option<Score> {
        self.cache
            .as_ref()
            .and_then(|c| c.controls().get(self.scheme, name))
    }

    /// Landmarks of the current scheme in the user's display order
    pub fn ordered_landmarks(&self) -> Vec<&'static Landmark> {
        self.display_order[&self.scheme]
            .iter()
            .filter_map(|name| self.scheme.landmark(name))
            .collect()
    }

    pub fn is_current_reviewed(&self) -> bool {
        self.current_case()
            .and_then(|case| self.repo.is_reviewed(case).ok())
            .unwrap_or(false)
    }

    fn cache_mut(&mut self) -> Result<&mut SideCache> {
        self.cache.as_mut().ok_or(ScorerError::NoCaseSelected)
    }

    // ========================================================================
    // LAYOUT
    // ========================================================================

    fn relayout(&mut self) {
        self.layout.relayout(
            self.scheme.landmarks(),
            self.container,
            self.side.is_mirrored(),
        );
    }

    /// Container was resized
    pub fn resize(&mut self, container: Size) {
        self.container = container;
        self.relayout();
    }

    pub fn control_rects(&self) -> &BTreeMap<String, Rect> {
        self.layout.rects()
    }

    /// Highlight the landmark under `point`, if any
    pub fn click(&mut self, point: Point) -> Option<&'static str> {
        let name = self.layout.hit_test(point)?;
        let landmark = self.scheme.landmark(name)?;
        self.highlighted = Some(landmark.name);
        self.highlighted
    }

    // ========================================================================
    // CASE NAVIGATION
    // ========================================================================

    /// Replace the file list and open its first case
    pub fn load_case_list(&mut self, cases: Vec<String>) -> Result<()> {
        self.commit()?;
        self.cases = cases;
        self.current = None;
        self.cache = None;
        self.highlighted = None;
        info!("Case list loaded: {} cases", self.cases.len());

        if self.cases.is_empty() {
            self.relayout();
            Ok(())
        } else {
            self.select_case(0)
        }
    }

    /// Commit the open case, then open case `index`
    pub fn select_case(&mut self, index: usize) -> Result<()> {
        let path = self
            .cases
            .get(index)
            .cloned()
            .ok_or_else(|| ScorerError::CaseNotFound(format!("#{index}")))?;

        self.commit()?;
        self.current = Some(index);
        self.highlighted = None;
        self.side = Side::L;

        if !self.display.display_image(&path) {
            warn!("Could not display {}; scoring disabled", path);
            self.cache = None;
            self.relayout();
            return Ok(());
        }

        if !self.repo.contains(&path) {
            let created = self.repo.create(&path, CaseMetadata::from_path(&path));
            debug_assert!(created.is_ok(), "record pair created twice for {path}");
        }

        let mut snapshot = CacheSnapshot::new();
        for side in Side::ALL {
            let (jsn, be) = self.repo.get(&path, side)?;
            snapshot.entry(Scheme::Jsn).or_default().insert(side, jsn.clone());
            snapshot.entry(Scheme::Be).or_default().insert(side, be.clone());
        }
        let mut cache = SideCache::new(self.side);
        cache.import_state(&snapshot)?;
        self.cache = Some(cache);

        info!("Opened case {} ({})", index, path);
        self.relayout();
        Ok(())
    }

    pub fn next_case(&mut self) -> Result<()> {
        match self.current {
            Some(i) if i + 1 < self.cases.len() => self.select_case(i + 1),
            None if !self.cases.is_empty() => self.select_case(0),
            _ => self.commit(),
        }
    }

    pub fn previous_case(&mut self) -> Result<()> {
        match self.current {
            Some(i) if i > 0 => self.select_case(i - 1),
            _ => self.commit(),
        }
    }

    /// Write both sides of the open case into the repository
    pub fn commit(&mut self) -> Result<()> {
        let (Some(index), Some(cache)) = (self.current, self.cache.as_mut()) else {
            return Ok(());
        };
        let case = &self.cases[index];

        // Both records must exist before either is touched
        for side in Side::ALL {
            self.repo.record(case, side)?;
        }

        let snapshot = cache.export_state();
        for side in Side::ALL {
            self.repo.update(
                case,
                side,
                &snapshot[&Scheme::Jsn][&side],
                &snapshot[&Scheme::Be][&side],
            )?;
        }
        debug!("Committed {}", case);
        Ok(())
    }

    // ========================================================================
    // SCHEME / SIDE
    // ========================================================================

    pub fn select_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
        self.highlighted = None;
        self.relayout();
    }

    pub fn select_side(&mut self, side: Side) {
        if let Some(cache) = self.cache.as_mut() {
            cache.set_displayed_side(side);
        }
        self.side = side;
        self.relayout();
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    pub fn highlight(&mut self, name: &str) -> Result<()> {
        let landmark = self.scheme.require_landmark(name)?;
        self.highlighted = Some(landmark.name);
        Ok(())
    }

    /// Move the highlight through the display order, wrapping around
    pub fn highlight_step(&mut self, forward: bool) {
        let order = &self.display_order[&self.scheme];
        if order.is_empty() {
            return;
        }
        let len = order.len();
        let next = match self.highlighted.and_then(|h| order.iter().position(|n| *n == h)) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        self.highlighted = Some(order[next]);
    }

    /// Set one landmark of the current scheme/side; `None` clears it
    pub fn edit_score(&mut self, name: &str, value: Option<u8>) -> Result<()> {
        let scheme = self.scheme;
        let landmark = scheme.require_landmark(name)?;
        let score = value.map(|v| scheme.score(v)).transpose()?;
        self.cache_mut()?.edit(scheme, landmark.name, score)?;
        self.highlighted = Some(landmark.name);
        Ok(())
    }

    pub fn edit_highlighted(&mut self, value: Option<u8>) -> Result<()> {
        match self.highlighted {
            Some(name) => self.edit_score(name, value),
            None => Ok(()),
        }
    }

    pub fn set_all_negative(&mut self) -> Result<()> {
        let (scheme, side) = (self.scheme, self.side);
        self.cache_mut()?.set_all_negative(scheme, side)
    }

    pub fn set_all_positive(&mut self) -> Result<()> {
        let (scheme, side) = (self.scheme, self.side);
        self.cache_mut()?.set_all_positive(scheme, side)
    }

    /// Assign scores in display order from text such as `"0 1 2 - 3"`.
    ///
    /// `-` or `_` leaves a landmark unset. Nothing is applied unless every
    /// token is valid. Returns how many landmarks were written.
    pub fn bulk_entry(&mut self, text: &str) -> Result<usize> {
        let scheme = self.scheme;
        let order = self.display_order[&scheme].clone();

        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.len() > order.len() {
            return Err(ScorerError::BulkEntry(format!(
                "{} values for {} {} landmarks",
                tokens.len(),
                order.len(),
                scheme
            )));
        }

        let mut values = Vec::with_capacity(tokens.len());
        for (pos, token) in tokens.iter().enumerate() {
            let value = match *token {
                "-" | "_" => None,
                t => {
                    let score = t
                        .parse::<u8>()
                        .ok()
                        .and_then(|v| scheme.score(v).ok())
                        .ok_or_else(|| {
                            ScorerError::BulkEntry(format!(
                                "'{t}' is not a {scheme} score for {}",
                                order[pos]
                            ))
                        })?;
                    Some(score)
                }
            };
            values.push(value);
        }

        let cache = self.cache_mut()?;
        for (name, value) in order.iter().zip(&values) {
            cache.edit(scheme, name, *value)?;
        }
        Ok(values.len())
    }

    /// Move a landmark within the current scheme's display order
    pub fn move_landmark(&mut self, name: &str, delta: isize) -> Result<()> {
        let scheme = self.scheme;
        scheme.require_landmark(name)?;
        let order = self
            .display_order
            .get_mut(&scheme)
            .ok_or(ScorerError::UnknownLandmark {
                scheme,
                name: name.to_string(),
            })?;

        if let Some(from) = order.iter().position(|n| *n == name) {
            let max = order.len() as isize - 1;
            let to = (from as isize + delta).clamp(0, max) as usize;
            let item = order.remove(from);
            order.insert(to, item);
        }
        Ok(())
    }

    pub fn display_order(&self, scheme: Scheme) -> &[&'static str] {
        &self.display_order[&scheme]
    }

    /// Flip the case-level reviewed flag; returns the new state
    pub fn toggle_reviewed(&mut self) -> Result<bool> {
        let case = self
            .current_case()
            .ok_or(ScorerError::NoCaseSelected)?
            .to_string();
        let state = !self.repo.is_reviewed(&case)?;
        self.repo.set_reviewed(&case, state)?;
        Ok(state)
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Commit, then write the session file
    pub fn save(&mut self, path: &Path) -> AnyResult<()> {
        self.commit().context("Failed to commit open case")?;
        self.repo.save_to_path(path)
    }

    /// Commit, then write the CSV export
    pub fn export(&mut self, path: &Path) -> AnyResult<()> {
        self.commit().context("Failed to commit open case")?;
        self.repo.export_csv(path)
    }

    /// Replace the repository with a saved session.
    ///
    /// A bad file leaves the current session exactly as it was.
    pub fn load_session(&mut self, path: &Path) -> AnyResult<()> {
        let repo = ScoreRepository::load_from_path(path)?;

        self.cases = repo.list_cases().into_iter().map(String::from).collect();
        let recent = repo
            .recent_case()
            .and_then(|r| self.cases.iter().position(|c| c == r));
        self.repo = repo;
        self.current = None;
        self.cache = None;
        self.highlighted = None;

        match recent.or(if self.cases.is_empty() { None } else { Some(0) }) {
            Some(index) => self.select_case(index)?,
            None => self.relayout(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Displays everything except paths listed as broken
    #[derive(Default)]
    struct FakeDisplay {
        broken: HashSet<String>,
        shown: Vec<String>,
    }

    impl ImageDisplay for FakeDisplay {
        fn display_image(&mut self, path: &str) -> bool {
            self.shown.push(path.to_string());
            !self.broken.contains(path)
        }
    }

    fn controller(cases: &[&str]) -> SessionController<FakeDisplay> {
        let mut c = SessionController::new(FakeDisplay::default());
        c.load_case_list(cases.iter().map(|s| s.to_string()).collect())
            .unwrap();
        c
    }

    fn s(scheme: Scheme, v: u8) -> Option<Score> {
        Some(scheme.score(v).unwrap())
    }

    #[test]
    fn test_initial_state() {
        let c = SessionController::new(FakeDisplay::default());
        assert_eq!(c.scheme(), Scheme::Jsn);
        assert_eq!(c.side(), Side::L);
        assert!(c.current_case().is_none());
        assert!(!c.controls_enabled());
        assert_eq!(c.control_rects().len(), 15);
    }

    #[test]
    fn test_edit_requires_case() {
        let mut c = SessionController::new(FakeDisplay::default());
        assert!(matches!(
            c.edit_score("MCP-T", Some(1)),
            Err(ScorerError::NoCaseSelected)
        ));
    }

    #[test]
    fn test_side_switch_scenario() {
        let mut c = controller(&["P1"]);
        c.edit_score("MCP-T", Some(2)).unwrap();
        c.select_side(Side::R);
        c.edit_score("MCP-T", Some(0)).unwrap();
        c.select_side(Side::L);

        assert_eq!(c.value("MCP-T"), s(Scheme::Jsn, 2));

        c.commit().unwrap();
        let (jsn_l, _) = c.repository().get("P1", Side::L).unwrap();
        let (jsn_r, _) = c.repository().get("P1", Side::R).unwrap();
        assert_eq!(jsn_l["MCP-T"], s(Scheme::Jsn, 2));
        assert_eq!(jsn_r["MCP-T"], s(Scheme::Jsn, 0));
    }

    #[test]
    fn test_edits_reach_repository_only_on_commit() {
        let mut c = controller(&["P1", "P2"]);
        c.select_scheme(Scheme::Be);
        c.edit_score("IP", Some(5)).unwrap();

        let (_, be) = c.repository().get("P1", Side::L).unwrap();
        assert_eq!(be["IP"], None);

        c.next_case().unwrap();
        assert_eq!(c.current_case(), Some("P2"));
        let (_, be) = c.repository().get("P1", Side::L).unwrap();
        assert_eq!(be["IP"], s(Scheme::Be, 5));
    }

    #[test]
    fn test_case_switch_loads_fresh_cache() {
        let mut c = controller(&["P1", "P2"]);
        c.edit_score("PIP-I", Some(3)).unwrap();
        c.select_side(Side::R);
        c.select_case(1).unwrap();

        assert_eq!(c.side(), Side::L);
        assert!(c.highlighted().is_none());
        assert_eq!(c.value("PIP-I"), None);

        c.previous_case().unwrap();
        assert_eq!(c.value("PIP-I"), s(Scheme::Jsn, 3));
    }

    #[test]
    fn test_select_scheme_keeps_data() {
        let mut c = controller(&["P1"]);
        c.edit_score("MCP-M", Some(1)).unwrap();
        c.select_scheme(Scheme::Be);
        assert_eq!(c.control_rects().len(), 16);
        assert_eq!(c.value("MCP-M"), None);
        c.select_scheme(Scheme::Jsn);
        assert_eq!(c.value("MCP-M"), s(Scheme::Jsn, 1));
    }

    #[test]
    fn test_select_side_mirrors_layout() {
        let mut c = controller(&["P1"]);
        assert!(!c.layout().placement().unwrap().mirrored);
        c.select_side(Side::R);
        assert!(c.layout().placement().unwrap().mirrored);

        let lm = Scheme::Jsn.landmark("MCP-T").unwrap();
        let center = c.control_rects()["MCP-T"].center();
        assert_eq!(center.x, REFERENCE_WIDTH - lm.position.0);
    }

    #[test]
    fn test_display_failure_disables_controls() {
        let mut display = FakeDisplay::default();
        display.broken.insert("bad.dcm".to_string());
        let mut c = SessionController::new(display);
        c.load_case_list(vec!["bad.dcm".to_string(), "good.dcm".to_string()])
            .unwrap();

        assert_eq!(c.current_case(), Some("bad.dcm"));
        assert!(!c.controls_enabled());
        assert!(!c.repository().contains("bad.dcm"));

        c.next_case().unwrap();
        assert!(c.controls_enabled());
        assert!(c.repository().contains("good.dcm"));
        assert_eq!(c.display.shown, vec!["bad.dcm", "good.dcm"]);
    }

    #[test]
    fn test_toggle_reviewed() {
        let mut c = controller(&["P1"]);
        assert!(c.toggle_reviewed().unwrap());
        assert!(c.repository().is_reviewed("P1").unwrap());
        assert!(!c.toggle_reviewed().unwrap());
        assert!(!c.is_current_reviewed());
    }

    #[test]
    fn test_bulk_shortcuts_on_active_side() {
        let mut c = controller(&["P1"]);
        c.select_side(Side::R);
        c.set_all_positive().unwrap();
        c.select_side(Side::L);
        c.set_all_negative().unwrap();
        c.commit().unwrap();

        let (jsn_l, be_l) = c.repository().get("P1", Side::L).unwrap();
        let (jsn_r, _) = c.repository().get("P1", Side::R).unwrap();
        assert!(jsn_l.values().all(|v| *v == s(Scheme::Jsn, 0)));
        assert!(jsn_r.values().all(|v| *v == s(Scheme::Jsn, 4)));
        assert!(be_l.values().all(|v| v.is_none()));
    }

    #[test]
    fn test_bulk_entry_in_display_order() {
        let mut c = controller(&["P1"]);
        c.move_landmark("MCP-I", -1).unwrap();
        assert_eq!(&c.display_order(Scheme::Jsn)[..2], &["MCP-I", "MCP-T"]);

        assert_eq!(c.bulk_entry("3, 1 - 2").unwrap(), 4);
        assert_eq!(c.value("MCP-I"), s(Scheme::Jsn, 3));
        assert_eq!(c.value("MCP-T"), s(Scheme::Jsn, 1));
        assert_eq!(c.value("MCP-M"), None);
        assert_eq!(c.value("MCP-R"), s(Scheme::Jsn, 2));
    }

    #[test]
    fn test_bulk_entry_is_all_or_nothing() {
        let mut c = controller(&["P1"]);
        c.select_scheme(Scheme::Be);
        let err = c.bulk_entry("1 2 4").unwrap_err();
        assert!(matches!(err, ScorerError::BulkEntry(msg) if msg.contains("'4'")));
        assert_eq!(c.value("MCP-T"), None);

        let err = c.bulk_entry("1 x").unwrap_err();
        assert!(matches!(err, ScorerError::BulkEntry(msg) if msg.contains("'x'")));

        let too_many = vec!["0"; 17].join(" ");
        let err = c.bulk_entry(&too_many).unwrap_err();
        assert!(matches!(err, ScorerError::BulkEntry(msg) if msg.starts_with("17 values for 16")));
        assert_eq!(c.value("MCP-T"), None);
    }

    #[test]
    fn test_highlight_step_wraps() {
        let mut c = controller(&["P1"]);
        c.highlight_step(false);
        assert_eq!(c.highlighted(), Some("S-Ra"));
        c.highlight_step(true);
        assert_eq!(c.highlighted(), Some("MCP-T"));
        c.edit_highlighted(Some(4)).unwrap();
        assert_eq!(c.value("MCP-T"), s(Scheme::Jsn, 4));
    }

    #[test]
    fn test_click_highlights_landmark() {
        let mut c = controller(&["P1"]);
        assert_eq!(c.click(Point::new(237.0, 344.0)), Some("MCP-T"));
        assert_eq!(c.highlighted(), Some("MCP-T"));
    }

    #[test]
    fn test_save_and_load_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut c = controller(&["P1", "P2"]);
        c.select_case(1).unwrap();
        c.edit_score("S-C", Some(2)).unwrap();
        c.save(&path).unwrap();

        let mut restored = SessionController::new(FakeDisplay::default());
        restored.load_session(&path).unwrap();
        assert_eq!(restored.cases(), &["P1".to_string(), "P2".to_string()]);
        assert_eq!(restored.current_case(), Some("P2"));
        assert_eq!(restored.value("S-C"), s(Scheme::Jsn, 2));
    }

    #[test]
    fn test_bad_session_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"records\": 7}").unwrap();

        let mut c = controller(&["P1"]);
        c.edit_score("MCP-T", Some(1)).unwrap();
        assert!(c.load_session(&path).is_err());
        assert_eq!(c.current_case(), Some("P1"));
        assert_eq!(c.value("MCP-T"), s(Scheme::Jsn, 1));
    }

    #[test]
    fn test_export_commits_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        let mut c = controller(&["P1"]);
        c.edit_score("MCP-T", Some(4)).unwrap();
        c.export(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().contains(",L,4,"));
    }
}
