// 🔁 Side-Cache - unsaved scores for both hands
//
// The control panel shows one side at a time. Each scheme keeps a two-slot
// store (L, R) behind it. Changing the displayed side always goes through
// `set_displayed_side`, which flushes the panel into the old side's slot
// before restoring the new side's slot, so an edit can neither be lost nor
// leak onto the other hand.

use log::debug;
use std::collections::BTreeMap;

use crate::error::{Result, ScorerError};
use crate::landmarks::{Scheme, Score, Side};
use crate::repository::{empty_scores, normalize_scores, ScoreMap};

/// scheme → side → landmark → value
pub type CacheSnapshot = BTreeMap<Scheme, BTreeMap<Side, ScoreMap>>;

fn check_value(scheme: Scheme, value: Option<Score>) -> Result<()> {
    match value {
        Some(score) if !scheme.accepts(score) => Err(ScorerError::InvalidScore {
            scheme,
            value: i64::from(score.value()),
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// CONTROL PANEL
// ============================================================================

/// Values currently shown in the on-screen score controls
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPanel {
    values: BTreeMap<Scheme, ScoreMap>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        ControlPanel {
            values: Scheme::ALL.iter().map(|s| (*s, empty_scores(*s))).collect(),
        }
    }
}

impl ControlPanel {
    /// None means the control shows no selection
    pub fn get(&self, scheme: Scheme, name: &str) -> Option<Score> {
        self.values
            .get(&scheme)
            .and_then(|m| m.get(name).copied())
            .flatten()
    }

    pub fn scores(&self, scheme: Scheme) -> &ScoreMap {
        &self.values[&scheme]
    }

    fn set(&mut self, scheme: Scheme, name: &str, value: Option<Score>) {
        if let Some(slot) = self.values.get_mut(&scheme).and_then(|m| m.get_mut(name)) {
            *slot = value;
        }
    }

    fn load(&mut self, scheme: Scheme, scores: &ScoreMap) {
        self.values.insert(scheme, scores.clone());
    }
}

// ============================================================================
// SIDE CACHE
// ============================================================================

#[derive(Debug, Clone)]
pub struct SideCache {
    slots: BTreeMap<Scheme, [ScoreMap; 2]>,
    controls: ControlPanel,
    displayed: Side,
}

impl SideCache {
    /// Everything unset, `displayed` side on the panel
    pub fn new(displayed: Side) -> Self {
        SideCache {
            slots: Scheme::ALL
                .iter()
                .map(|s| (*s, [empty_scores(*s), empty_scores(*s)]))
                .collect(),
            controls: ControlPanel::default(),
            displayed,
        }
    }

    pub fn displayed_side(&self) -> Side {
        self.displayed
    }

    pub fn controls(&self) -> &ControlPanel {
        &self.controls
    }

    /// Panel → slot of the displayed side
    fn flush(&mut self) {
        let side = self.displayed.index();
        for scheme in Scheme::ALL {
            if let Some(slots) = self.slots.get_mut(&scheme) {
                slots[side] = self.controls.scores(scheme).clone();
            }
        }
    }

    /// Slot of the displayed side → panel
    fn restore(&mut self) {
        let side = self.displayed.index();
        for scheme in Scheme::ALL {
            let scores = self.slots[&scheme][side].clone();
            self.controls.load(scheme, &scores);
        }
    }

    /// Switch the panel to `side`: flush the old side, then restore the new one
    pub fn set_displayed_side(&mut self, side: Side) {
        self.flush();
        debug!("Side switch {} -> {}", self.displayed, side);
        self.displayed = side;
        self.restore();
    }

    /// Edit one control on the displayed side
    pub fn edit(&mut self, scheme: Scheme, name: &str, value: Option<Score>) -> Result<()> {
        scheme.require_landmark(name)?;
        check_value(scheme, value)?;

        self.controls.set(scheme, name, value);
        let side = self.displayed.index();
        if let Some(slot) = self
            .slots
            .get_mut(&scheme)
            .and_then(|slots| slots[side].get_mut(name))
        {
            *slot = value;
        }
        Ok(())
    }

    /// Current value for any side; the displayed side reads from the panel
    pub fn value(&self, scheme: Scheme, side: Side, name: &str) -> Option<Score> {
        if side == self.displayed {
            self.controls.get(scheme, name)
        } else {
            self.slots
                .get(&scheme)
                .and_then(|slots| slots[side.index()].get(name).copied())
                .flatten()
        }
    }

    /// Consistent copy of both sides, taken after flushing the panel
    pub fn export_state(&mut self) -> CacheSnapshot {
        self.flush();
        self.slots
            .iter()
            .map(|(scheme, slots)| {
                let sides: BTreeMap<Side, ScoreMap> = Side::ALL
                    .iter()
                    .map(|side| (*side, slots[side.index()].clone()))
                    .collect();
                (*scheme, sides)
            })
            .collect()
    }

    /// Overwrite every slot from `snapshot` and refresh the panel.
    ///
    /// Missing schemes, sides or landmarks come back unset. The snapshot is
    /// validated in full before anything is written.
    pub fn import_state(&mut self, snapshot: &CacheSnapshot) -> Result<()> {
        let mut slots = BTreeMap::new();
        for scheme in Scheme::ALL {
            let sides = snapshot.get(&scheme);
            let load = |side: Side| -> Result<ScoreMap> {
                match sides.and_then(|s| s.get(&side)) {
                    Some(scores) => normalize_scores(scheme, scores),
                    None => Ok(empty_scores(scheme)),
                }
            };
            slots.insert(scheme, [load(Side::L)?, load(Side::R)?]);
        }

        self.slots = slots;
        self.restore();
        Ok(())
    }

    /// Write one literal value to every landmark of `scheme` on `side`
    pub fn set_all(&mut self, scheme: Scheme, side: Side, value: Option<Score>) -> Result<()> {
        check_value(scheme, value)?;

        if let Some(slots) = self.slots.get_mut(&scheme) {
            for slot in slots[side.index()].values_mut() {
                *slot = value;
            }
        }
        if side == self.displayed {
            let scores = self.slots[&scheme][side.index()].clone();
            self.controls.load(scheme, &scores);
        }
        Ok(())
    }

    pub fn set_all_negative(&mut self, scheme: Scheme, side: Side) -> Result<()> {
        self.set_all(scheme, side, Some(scheme.min_score()))
    }

    pub fn set_all_positive(&mut self, scheme: Scheme, side: Side) -> Result<()> {
        self.set_all(scheme, side, Some(scheme.max_score()))
    }
}
