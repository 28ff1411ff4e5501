//! Turns a `DetectionResult` into the text shown in the detections panel.

use crate::response::{Detection, DetectionResult};

/// Placeholder lines for an empty detections list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// Nothing analysed yet.
    AwaitingUpload,
    /// The service found nothing.
    NoneFound,
    /// Count says there are detections but the list is empty.
    Unavailable,
}

impl Placeholder {
    pub fn text(self) -> &'static str {
        match self {
            Self::AwaitingUpload => "Upload an image to view detection metadata.",
            Self::NoneFound => "No guns detected.",
            Self::Unavailable => "Detection data unavailable.",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionLine {
    /// e.g. `Gun • 0.87`
    pub label_text: String,
    /// e.g. `#1 [10, 20, 110, 220]`, or `#1` without a box.
    pub box_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectionEntries {
    Placeholder(Placeholder),
    Lines(Vec<DetectionLine>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionsView {
    pub count_text: String,
    pub entries: DetectionEntries,
}

impl DetectionsView {
    /// State before any analysis, and after a failed one.
    pub fn empty() -> Self {
        Self {
            count_text: "0".to_string(),
            entries: DetectionEntries::Placeholder(Placeholder::AwaitingUpload),
        }
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        match &self.entries {
            DetectionEntries::Placeholder(p) => Some(*p),
            DetectionEntries::Lines(_) => None,
        }
    }

    pub fn lines(&self) -> &[DetectionLine] {
        match &self.entries {
            DetectionEntries::Lines(lines) => lines,
            DetectionEntries::Placeholder(_) => &[],
        }
    }
}

impl Default for DetectionsView {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn render_detections(result: &DetectionResult) -> DetectionsView {
    let detections = result.detections();
    let entries = if detections.is_empty() {
        DetectionEntries::Placeholder(if result.count_is_zero() {
            Placeholder::NoneFound
        } else {
            Placeholder::Unavailable
        })
    } else {
        DetectionEntries::Lines(
            detections
                .iter()
                .enumerate()
                .map(|(index, det)| render_line(index, det))
                .collect(),
        )
    };
    DetectionsView {
        count_text: result.count_text(),
        entries,
    }
}

fn render_line(index: usize, det: &Detection) -> DetectionLine {
    let score = round_half_up(det.score() * 100.0) / 100.0;
    let label_text = format!("{} • {}", det.label(), score);
    let ordinal = index + 1;
    let box_text = match det.corners() {
        Some(corners) => {
            let [x1, y1, x2, y2] = corners.map(|c| round_half_up(c) as i64);
            format!("#{ordinal} [{x1}, {y1}, {x2}, {y2}]")
        }
        None => format!("#{ordinal}"),
    };
    DetectionLine {
        label_text,
        box_text,
    }
}

/// Rounds .5 towards positive infinity.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
