//! Declarative description of what the page should show.
//!
//! The controller produces a `ViewModel`; renderers apply it. Nothing in here
//! knows about a particular UI toolkit.

use crate::render::DetectionsView;
use crate::status::StatusMessage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadZone {
    /// Empty-state prompt ("click or drop an image").
    Prompt,
    /// Preview thumbnail with the "change image" affordance.
    Preview {
        file_name: String,
        data_url: String,
        dimensions: Option<(u32, u32)>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadZoneView {
    pub zone: UploadZone,
    /// A drag is hovering over the zone.
    pub drag_active: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredictButton {
    pub enabled: bool,
    /// Loading indicator shown in place of the label.
    pub loading: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewModel {
    pub upload: UploadZoneView,
    pub original_image: Option<String>,
    pub processed_image: Option<String>,
    pub predict_button: PredictButton,
    pub results_visible: bool,
    pub status: Option<StatusMessage>,
    /// `None` when the page has no threshold control.
    pub threshold_label: Option<String>,
    pub detections: DetectionsView,
}
