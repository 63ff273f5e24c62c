// 📐 Layout Engine - reference diagram → screen placement
//
// The diagram is scaled uniformly to fit the container, centred, and for the
// right hand reflected about the vertical centreline of the drawn diagram.
// Diagram art and score controls both go through `Placement`, so they cannot
// drift apart when the container is resized.

use std::collections::BTreeMap;

use crate::landmarks::Landmark;

/// Half-size of a landmark control, in reference units
pub const MARKER_RADIUS: f64 = 20.0;

/// Gap between a control and its score label, in reference units
pub const LABEL_GAP: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    /// NaN and non-positive dimensions are degenerate
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    /// Square of half-size `radius` centred on `center`
    pub fn around(center: Point, radius: f64) -> Self {
        Rect {
            x: center.x - radius,
            y: center.y - radius,
            width: radius * 2.0,
            height: radius * 2.0,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

// ============================================================================
// PLACEMENT
// ============================================================================

/// Scale, offsets and mirroring for one (container, reference) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub draw_width: f64,
    pub draw_height: f64,
    pub mirrored: bool,
}

impl Placement {
    /// None when either size is degenerate
    pub fn compute(container: Size, reference: Size, mirrored: bool) -> Option<Self> {
        if container.is_degenerate() || reference.is_degenerate() {
            return None;
        }

        let scale = (container.width / reference.width).min(container.height / reference.height);
        let draw_width = reference.width * scale;
        let draw_height = reference.height * scale;

        Some(Placement {
            scale,
            offset_x: (container.width - draw_width) / 2.0,
            offset_y: (container.height - draw_height) / 2.0,
            draw_width,
            draw_height,
            mirrored,
        })
    }

    /// Map a reference-space point to screen space
    pub fn map_point(&self, (ref_x, ref_y): (f64, f64)) -> Point {
        let x = if self.mirrored {
            self.offset_x + self.draw_width - ref_x * self.scale
        } else {
            self.offset_x + ref_x * self.scale
        };
        Point {
            x,
            y: self.offset_y + ref_y * self.scale,
        }
    }

    /// Where the diagram art itself is drawn
    pub fn diagram_rect(&self) -> Rect {
        Rect::new(self.offset_x, self.offset_y, self.draw_width, self.draw_height)
    }

    pub fn marker_radius(&self) -> f64 {
        MARKER_RADIUS * self.scale
    }

    /// Anchor for the score label drawn above a control
    pub fn label_anchor(&self, center: Point) -> Point {
        Point {
            x: center.x,
            y: center.y - self.marker_radius() - LABEL_GAP * self.scale,
        }
    }

    pub fn control_rect(&self, landmark: &Landmark) -> Rect {
        Rect::around(self.map_point(landmark.position), self.marker_radius())
    }
}

/// Control rectangle for each landmark, keyed by name.
///
/// Degenerate container or reference sizes give an empty map.
pub fn place(
    landmarks: &[Landmark],
    container: Size,
    reference: Size,
    mirrored: bool,
) -> BTreeMap<String, Rect> {
    match Placement::compute(container, reference, mirrored) {
        Some(placement) => landmarks
            .iter()
            .map(|lm| (lm.name.to_string(), placement.control_rect(lm)))
            .collect(),
        None => BTreeMap::new(),
    }
}

// ============================================================================
// LAYOUT ENGINE
// ============================================================================

/// Remembers the last placement so hit-testing and painting share it
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    reference: Size,
    placement: Option<Placement>,
    rects: BTreeMap<String, Rect>,
}

impl LayoutEngine {
    pub fn new(reference: Size) -> Self {
        LayoutEngine {
            reference,
            placement: None,
            rects: BTreeMap::new(),
        }
    }

    pub fn reference(&self) -> Size {
        self.reference
    }

    pub fn relayout(
        &mut self,
        landmarks: &[Landmark],
        container: Size,
        mirrored: bool,
    ) -> &BTreeMap<String, Rect> {
        self.placement = Placement::compute(container, self.reference, mirrored);
        self.rects = place(landmarks, container, self.reference, mirrored);
        &self.rects
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn rects(&self) -> &BTreeMap<String, Rect> {
        &self.rects
    }

    /// Landmark whose control contains `point`; nearest centre wins on overlap
    pub fn hit_test(&self, point: Point) -> Option<&str> {
        let distance = |r: &Rect| {
            let c = r.center();
            (c.x - point.x).powi(2) + (c.y - point.y).powi(2)
        };

        self.rects
            .iter()
            .filter(|(_, rect)| rect.contains(point))
            .min_by(|a, b| distance(a.1).total_cmp(&distance(b.1)))
            .map(|(name, _)| name.as_str())
    }
}
