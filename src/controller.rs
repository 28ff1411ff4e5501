//! Upload-and-predict controller.
//!
//! The controller is a plain state machine: it consumes [`Event`]s, returns
//! the [`Effect`]s the host must perform, and exposes its state as a
//! [`ViewModel`]. It never blocks and owns no threads.
//!
//! Overlapping asynchronous work is ordered by generations:
//! - every accepted file bumps the file generation; preview completions for
//!   older generations are dropped;
//! - every prediction carries a [`RequestId`]; a response for a file that has
//!   since been replaced ends the loading state but is otherwise discarded;
//! - the status banner has its own generation so an old auto-clear timer
//!   cannot hide a newer message.

use std::time::Duration;

use crate::intake::{validate, CandidateFile, SelectedFile};
use crate::preview::PreviewImage;
use crate::render::{render_detections, DetectionsView};
use crate::response::{DetectionResult, ErrorBody};
use crate::status::{StatusBanner, StatusKind, StatusMessage};
use crate::threshold::{Threshold, ThresholdControl};
use crate::transport::PredictionOutcome;
use crate::view::{PredictButton, UploadZone, UploadZoneView, ViewModel};

pub const NO_FILE_TEXT: &str = "Please upload an image first.";
pub const LOADING_TEXT: &str = "Analyzing image... Please wait.";
pub const SUCCESS_TEXT: &str = "Analysis complete! Results displayed above.";
pub const GENERIC_ERROR_TEXT: &str = "An error occurred during analysis.";
pub const NETWORK_ERROR_TEXT: &str =
    "Network error occurred. Please check your connection and try again.";

/// Identifies one prediction request and the file it was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestId {
    pub seq: u64,
    pub file_generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Auto-clear of a success status.
    StatusExpiry { generation: u64 },
    /// Delayed scroll to the result panel.
    ScrollResults { request: RequestId },
}

#[derive(Clone, Debug)]
pub enum Event {
    /// A file came from the picker.
    FileChosen(CandidateFile),
    DragEnter,
    DragLeave,
    /// Only the first dropped file is used.
    FilesDropped(Vec<CandidateFile>),
    PreviewLoaded {
        generation: u64,
        preview: PreviewImage,
    },
    ThresholdInput(f64),
    PredictRequested,
    PredictionFinished {
        request: RequestId,
        outcome: PredictionOutcome,
    },
    TimerFired(TimerKind),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Read the file into a previewable image, then send `PreviewLoaded`.
    LoadPreview { generation: u64, file: SelectedFile },
    /// Send the file, then send `PredictionFinished`.
    SubmitPrediction {
        request: RequestId,
        file: SelectedFile,
        threshold: Threshold,
    },
    /// Wait, then send `TimerFired`.
    StartTimer { after: Duration, timer: TimerKind },
    /// Bring the result panel into view.
    ScrollResultsIntoView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    pub status_clear_after: Duration,
    pub scroll_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            status_clear_after: Duration::from_secs(5),
            scroll_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerOptions {
    /// Whether the page has a threshold slider.
    pub threshold_control: bool,
    /// Initial slider value, or the fixed value without a slider.
    pub default_threshold: Threshold,
    pub timings: Timings,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            threshold_control: true,
            default_threshold: Threshold::DEFAULT,
            timings: Timings::default(),
        }
    }
}

/// The preview on screen and the file it was made from.
struct ShownPreview {
    generation: u64,
    file_name: String,
    image: PreviewImage,
}

pub struct UploadController {
    timings: Timings,
    default_threshold: Threshold,
    threshold_control: Option<ThresholdControl>,

    selected: Option<SelectedFile>,
    file_generation: u64,
    preview: Option<ShownPreview>,
    drag_active: bool,

    request_seq: u64,
    in_flight: Option<RequestId>,
    last_completed: Option<RequestId>,
    last_result: Option<DetectionResult>,

    predict_enabled: bool,
    processed_image: Option<String>,
    results_visible: bool,
    detections: DetectionsView,
    banner: StatusBanner,
}

impl UploadController {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            timings: options.timings,
            default_threshold: options.default_threshold,
            threshold_control: options
                .threshold_control
                .then(|| ThresholdControl::new(options.default_threshold)),
            selected: None,
            file_generation: 0,
            preview: None,
            drag_active: false,
            request_seq: 0,
            in_flight: None,
            last_completed: None,
            last_result: None,
            predict_enabled: false,
            processed_image: None,
            results_visible: false,
            detections: DetectionsView::empty(),
            banner: StatusBanner::default(),
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::FileChosen(candidate) => self.select(candidate),
            Event::DragEnter => {
                self.drag_active = true;
                Vec::new()
            }
            Event::DragLeave => {
                self.drag_active = false;
                Vec::new()
            }
            Event::FilesDropped(files) => {
                self.drag_active = false;
                match files.into_iter().next() {
                    Some(first) => self.select(first),
                    None => Vec::new(),
                }
            }
            Event::PreviewLoaded {
                generation,
                preview,
            } => {
                self.preview_loaded(generation, preview);
                Vec::new()
            }
            Event::ThresholdInput(value) => {
                match self.threshold_control.as_mut() {
                    Some(control) => control.input(value),
                    None => log::debug!("threshold input ignored; no threshold control"),
                }
                Vec::new()
            }
            Event::PredictRequested => self.predict(),
            Event::PredictionFinished { request, outcome } => self.prediction_finished(request, outcome),
            Event::TimerFired(timer) => self.timer_fired(timer),
        }
    }

    fn select(&mut self, candidate: CandidateFile) -> Vec<Effect> {
        let file = match validate(candidate) {
            Ok(file) => file,
            Err(rejection) => {
                log::warn!("file rejected: {:?}", rejection);
                self.banner.show(rejection.message(), StatusKind::Error);
                return Vec::new();
            }
        };
        log::info!("selected {} ({} bytes)", file.name(), file.size());
        self.file_generation += 1;
        self.selected = Some(file.clone());
        self.reset_detections();
        vec![Effect::LoadPreview {
            generation: self.file_generation,
            file,
        }]
    }

    fn preview_loaded(&mut self, generation: u64, preview: PreviewImage) {
        if generation != self.file_generation {
            log::debug!(
                "dropping preview for generation {} (current {})",
                generation,
                self.file_generation
            );
            return;
        }
        let file_name = self
            .selected
            .as_ref()
            .map(|file| file.name().to_string())
            .unwrap_or_default();
        self.preview = Some(ShownPreview {
            generation,
            file_name,
            image: preview,
        });
        self.predict_enabled = self.in_flight.is_none();
        self.results_visible = false;
        self.banner.clear();
    }

    fn predict(&mut self) -> Vec<Effect> {
        let Some(file) = self.selected.clone() else {
            self.banner.show(NO_FILE_TEXT, StatusKind::Error);
            return Vec::new();
        };
        if let Some(request) = self.in_flight {
            log::debug!("prediction {} still running; ignoring trigger", request.seq);
            return Vec::new();
        }

        self.request_seq += 1;
        let request = RequestId {
            seq: self.request_seq,
            file_generation: self.file_generation,
        };
        self.in_flight = Some(request);
        self.predict_enabled = false;
        self.banner.show(LOADING_TEXT, StatusKind::Loading);
        self.results_visible = false;

        vec![Effect::SubmitPrediction {
            request,
            file,
            threshold: self.threshold(),
        }]
    }

    fn prediction_finished(&mut self, request: RequestId, outcome: PredictionOutcome) -> Vec<Effect> {
        if self.in_flight != Some(request) {
            log::debug!("dropping response for unknown request {}", request.seq);
            return Vec::new();
        }
        self.in_flight = None;
        self.predict_enabled = true;

        if request.file_generation != self.file_generation {
            log::info!(
                "discarding response {} for a replaced file",
                request.seq
            );
            if self.banner.current().map(|s| s.kind) == Some(StatusKind::Loading) {
                self.banner.clear();
            }
            return Vec::new();
        }

        let mut effects = Vec::new();
        match outcome {
            PredictionOutcome::Completed(result) => {
                if let Some(image) = &result.image {
                    self.processed_image = Some(image.clone());
                }
                self.detections = render_detections(&result);
                self.results_visible = true;
                self.last_completed = Some(request);
                self.last_result = Some(result);
                if let Some(generation) = self.banner.show(SUCCESS_TEXT, StatusKind::Success) {
                    effects.push(Effect::StartTimer {
                        after: self.timings.status_clear_after,
                        timer: TimerKind::StatusExpiry { generation },
                    });
                }
                effects.push(Effect::StartTimer {
                    after: self.timings.scroll_delay,
                    timer: TimerKind::ScrollResults { request },
                });
            }
            PredictionOutcome::ServerError {
                status,
                status_text,
                body,
            } => {
                let message = server_error_message(status, &status_text, &body);
                self.reset_detections();
                self.banner.show(message, StatusKind::Error);
            }
            PredictionOutcome::NetworkError(reason) => {
                log::error!("prediction failed: {}", reason);
                self.reset_detections();
                self.banner.show(NETWORK_ERROR_TEXT, StatusKind::Error);
            }
        }
        effects
    }

    fn timer_fired(&mut self, timer: TimerKind) -> Vec<Effect> {
        match timer {
            TimerKind::StatusExpiry { generation } => {
                self.banner.expire(generation);
                Vec::new()
            }
            TimerKind::ScrollResults { request } => {
                if self.results_visible && self.last_completed == Some(request) {
                    vec![Effect::ScrollResultsIntoView]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn reset_detections(&mut self) {
        self.detections = DetectionsView::empty();
        self.processed_image = None;
        self.last_result = None;
    }

    /// Threshold the next request will carry.
    pub fn threshold(&self) -> Threshold {
        self.threshold_control
            .as_ref()
            .map(ThresholdControl::value)
            .unwrap_or(self.default_threshold)
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// Result currently on display, if the last prediction succeeded.
    pub fn last_result(&self) -> Option<&DetectionResult> {
        self.last_result.as_ref()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.banner.current()
    }

    pub fn is_predicting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A selected file is still waiting for its preview.
    pub fn is_preview_pending(&self) -> bool {
        self.selected.is_some()
            && self.preview.as_ref().map(|shown| shown.generation) != Some(self.file_generation)
    }

    pub fn view(&self) -> ViewModel {
        let zone = match &self.preview {
            Some(shown) => UploadZone::Preview {
                file_name: shown.file_name.clone(),
                data_url: shown.image.data_url.clone(),
                dimensions: shown.image.dimensions,
            },
            None => UploadZone::Prompt,
        };
        ViewModel {
            upload: UploadZoneView {
                zone,
                drag_active: self.drag_active,
            },
            original_image: self.preview.as_ref().map(|shown| shown.image.data_url.clone()),
            processed_image: self.processed_image.clone(),
            predict_button: PredictButton {
                enabled: self.predict_enabled,
                loading: self.in_flight.is_some(),
            },
            results_visible: self.results_visible,
            status: self.banner.current().cloned(),
            threshold_label: self
                .threshold_control
                .as_ref()
                .map(|c| c.label().to_string()),
            detections: self.detections.clone(),
        }
    }
}

impl Default for UploadController {
    fn default() -> Self {
        Self::new(ControllerOptions::default())
    }
}

/// Banner text for a non-2xx response.
pub fn server_error_message(status: u16, status_text: &str, body: &[u8]) -> String {
    match ErrorBody::parse(body) {
        Some(parsed) => parsed
            .detail
            .unwrap_or_else(|| GENERIC_ERROR_TEXT.to_string()),
        None => format!("Error: {} {}", status, status_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Placeholder;

    fn png(name: &str) -> CandidateFile {
        CandidateFile::new(name, "image/png", vec![1, 2, 3, 4])
    }

    /// Selects a file and completes its preview.
    fn loaded(controller: &mut UploadController, name: &str) -> SelectedFile {
        let effects = controller.handle(Event::FileChosen(png(name)));
        let Some(Effect::LoadPreview { generation, file }) = effects.into_iter().next() else {
            panic!("expected LoadPreview");
        };
        let preview = PreviewImage::load(&file);
        controller.handle(Event::PreviewLoaded {
            generation,
            preview,
        });
        file
    }

    fn submit(controller: &mut UploadController) -> RequestId {
        match controller.handle(Event::PredictRequested).as_slice() {
            [Effect::SubmitPrediction { request, .. }] => *request,
            other => panic!("expected SubmitPrediction, got {:?}", other),
        }
    }

    fn completed(json: &str) -> PredictionOutcome {
        PredictionOutcome::Completed(DetectionResult::from_slice(json.as_bytes()).unwrap())
    }

    #[test]
    fn rejected_file_keeps_prior_state() {
        let mut controller = UploadController::default();
        let file = loaded(&mut controller, "first.png");
        let before = controller.view();

        let effects = controller.handle(Event::FileChosen(CandidateFile::new(
            "doc.pdf",
            "application/pdf",
            vec![0; 8],
        )));
        assert!(effects.is_empty());
        assert_eq!(controller.selected_file(), Some(&file));

        let after = controller.view();
        assert_eq!(after.upload, before.upload);
        assert_eq!(after.original_image, before.original_image);
        assert_eq!(
            after.status.unwrap().text,
            "Please select a valid image file (JPEG, JPG, or PNG)"
        );
    }

    #[test]
    fn valid_file_previews_and_enables_predict() {
        let mut controller = UploadController::default();
        assert!(!controller.view().predict_button.enabled);

        let file = loaded(&mut controller, "shot.png");
        let view = controller.view();
        let expected = crate::preview::data_url("image/png", file.bytes());
        assert_eq!(view.original_image.as_deref(), Some(expected.as_str()));
        match &view.upload.zone {
            UploadZone::Preview { data_url, .. } => assert_eq!(data_url, &expected),
            UploadZone::Prompt => panic!("upload zone should show the preview"),
        }
        assert!(view.predict_button.enabled);
        assert!(view.status.is_none());
        assert!(!view.results_visible);
    }

    #[test]
    fn stale_preview_is_dropped() {
        let mut controller = UploadController::default();
        let first = controller.handle(Event::FileChosen(png("a.png")));
        let second = controller.handle(Event::FileChosen(png("b.png")));

        let (Effect::LoadPreview { generation: g1, file: f1 }, Effect::LoadPreview { generation: g2, file: f2 }) =
            (first[0].clone(), second[0].clone())
        else {
            panic!("expected previews");
        };

        controller.handle(Event::PreviewLoaded {
            generation: g2,
            preview: PreviewImage::load(&f2),
        });
        controller.handle(Event::PreviewLoaded {
            generation: g1,
            preview: PreviewImage::load(&f1),
        });

        match controller.view().upload.zone {
            UploadZone::Preview { file_name, .. } => assert_eq!(file_name, "b.png"),
            UploadZone::Prompt => panic!("expected preview"),
        }
        assert!(!controller.is_preview_pending());
    }

    #[test]
    fn pending_preview_keeps_previous_name_and_image() {
        let mut controller = UploadController::default();
        let first = loaded(&mut controller, "first.png");
        let first_url = crate::preview::data_url("image/png", first.bytes());

        controller.handle(Event::FileChosen(CandidateFile::new(
            "second.png",
            "image/png",
            vec![9, 9, 9],
        )));
        assert!(controller.is_preview_pending());
        match controller.view().upload.zone {
            UploadZone::Preview {
                file_name,
                data_url,
                ..
            } => {
                assert_eq!(file_name, "first.png");
                assert_eq!(data_url, first_url);
            }
            UploadZone::Prompt => panic!("previous preview should stay up"),
        }
    }

    #[test]
    fn predict_without_file_sends_nothing() {
        let mut controller = UploadController::default();
        let effects = controller.handle(Event::PredictRequested);
        assert!(effects.is_empty());
        let status = controller.status().unwrap();
        assert_eq!(status.text, NO_FILE_TEXT);
        assert_eq!(status.kind, StatusKind::Error);
    }

    #[test]
    fn predict_enters_loading_state() {
        let mut controller = UploadController::default();
        let file = loaded(&mut controller, "a.png");
        controller.handle(Event::ThresholdInput(0.35));

        let effects = controller.handle(Event::PredictRequested);
        match effects.as_slice() {
            [Effect::SubmitPrediction {
                file: sent,
                threshold,
                ..
            }] => {
                assert_eq!(sent, &file);
                assert_eq!(threshold.formatted(), "0.35");
            }
            other => panic!("unexpected effects {:?}", other),
        }

        let view = controller.view();
        assert!(!view.predict_button.enabled);
        assert!(view.predict_button.loading);
        assert_eq!(view.status.unwrap().kind, StatusKind::Loading);
        assert!(!view.results_visible);

        assert!(controller.handle(Event::PredictRequested).is_empty());
    }

    #[test]
    fn success_renders_and_schedules_timers() {
        let mut controller = UploadController::default();
        loaded(&mut controller, "a.png");
        let request = submit(&mut controller);

        let effects = controller.handle(Event::PredictionFinished {
            request,
            outcome: completed(
                r#"{"image": "data:image/png;base64,AAAA", "count": 2, "detections": [
                    {"label": "Gun", "score": 0.873, "box": [10, 20, 110, 220]},
                    {"label": "Gun", "score": 0.5, "box": [5, 5, 50, 50]}
                ]}"#,
            ),
        });

        let view = controller.view();
        assert!(view.results_visible);
        assert!(view.predict_button.enabled);
        assert!(!view.predict_button.loading);
        assert_eq!(view.processed_image.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(view.detections.count_text, "2");
        assert_eq!(view.detections.lines()[0].label_text, "Gun • 0.87");
        assert_eq!(view.detections.lines()[0].box_text, "#1 [10, 20, 110, 220]");
        assert_eq!(view.status.as_ref().unwrap().text, SUCCESS_TEXT);

        assert_eq!(effects.len(), 2);
        let Effect::StartTimer { after, timer } = effects[0] else {
            panic!("expected status timer");
        };
        assert_eq!(after, Duration::from_secs(5));
        assert!(matches!(timer, TimerKind::StatusExpiry { .. }));
        let Effect::StartTimer { after, timer: scroll } = effects[1] else {
            panic!("expected scroll timer");
        };
        assert_eq!(after, Duration::from_millis(500));

        assert_eq!(
            controller.handle(Event::TimerFired(scroll)),
            vec![Effect::ScrollResultsIntoView]
        );
        controller.handle(Event::TimerFired(timer));
        assert!(controller.status().is_none());
    }

    #[test]
    fn empty_detections_placeholders() {
        let mut controller = UploadController::default();
        loaded(&mut controller, "a.png");

        let request = submit(&mut controller);
        controller.handle(Event::PredictionFinished {
            request,
            outcome: completed(r#"{"count": 0, "detections": []}"#),
        });
        assert_eq!(
            controller.view().detections.placeholder(),
            Some(Placeholder::NoneFound)
        );

        let request = submit(&mut controller);
        controller.handle(Event::PredictionFinished {
            request,
            outcome: completed(r#"{"count": 3, "detections": []}"#),
        });
        assert_eq!(
            controller.view().detections.placeholder(),
            Some(Placeholder::Unavailable)
        );
    }

    #[test]
    fn server_error_uses_detail() {
        let mut controller = UploadController::default();
        loaded(&mut controller, "a.png");
        let request = submit(&mut controller);
        controller.handle(Event::PredictionFinished {
            request,
            outcome: PredictionOutcome::ServerError {
                status: 500,
                status_text: "Internal Server Error".to_string(),
                body: br#"{"detail": "model unavailable"}"#.to_vec(),
            },
        });

        let view = controller.view();
        let status = view.status.unwrap();
        assert_eq!(status.text, "model unavailable");
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(
            view.detections.placeholder(),
            Some(Placeholder::AwaitingUpload)
        );
        assert!(view.predict_button.enabled);
        assert!(!view.predict_button.loading);
    }

    #[test]
    fn server_error_without_json() {
        assert_eq!(
            server_error_message(500, "Internal Server Error", b"<html>oops</html>"),
            "Error: 500 Internal Server Error"
        );
        assert_eq!(server_error_message(502, "Bad Gateway", b"{}"), GENERIC_ERROR_TEXT);
    }

    #[test]
    fn network_error_resets_detections() {
        let mut controller = UploadController::default();
        loaded(&mut controller, "a.png");
        let request = submit(&mut controller);
        controller.handle(Event::PredictionFinished {
            request,
            outcome: completed(r#"{"image": "data:image/png;base64,AAAA", "count": 0}"#),
        });

        let request = submit(&mut controller);
        controller.handle(Event::PredictionFinished {
            request,
            outcome: PredictionOutcome::NetworkError("connection refused".to_string()),
        });

        let view = controller.view();
        assert_eq!(view.status.unwrap().text, NETWORK_ERROR_TEXT);
        assert_eq!(view.processed_image, None);
        assert_eq!(view.detections, DetectionsView::empty());
        assert!(controller.last_result().is_none());
        assert!(!controller.is_predicting());
    }

    #[test]
    fn response_for_replaced_file_is_discarded() {
        let mut controller = UploadController::default();
        loaded(&mut controller, "a.png");
        let request = submit(&mut controller);

        loaded(&mut controller, "b.png");
        assert!(!controller.view().predict_button.enabled);

        let effects = controller.handle(Event::PredictionFinished {
            request,
            outcome: completed(r#"{"count": 1, "detections": [{"score": 0.9}]}"#),
        });
        assert!(effects.is_empty());

        let view = controller.view();
        assert!(view.predict_button.enabled);
        assert!(!view.predict_button.loading);
        assert!(!view.results_visible);
        assert_eq!(view.detections, DetectionsView::empty());
    }

    #[test]
    fn old_success_timer_keeps_newer_error() {
        let mut controller = UploadController::default();
        loaded(&mut controller, "a.png");
        let request = submit(&mut controller);
        let effects = controller.handle(Event::PredictionFinished {
            request,
            outcome: completed(r#"{"count": 0}"#),
        });
        let Effect::StartTimer { timer, .. } = effects[0] else {
            panic!("expected status timer");
        };

        controller.handle(Event::PredictRequested);
        controller.handle(Event::FileChosen(CandidateFile::new("x.gif", "image/gif", vec![])));
        controller.handle(Event::TimerFired(timer));
        assert_eq!(
            controller.status().unwrap().text,
            "Please select a valid image file (JPEG, JPG, or PNG)"
        );
    }

    #[test]
    fn drop_uses_first_file_and_clears_drag() {
        let mut controller = UploadController::default();
        controller.handle(Event::DragEnter);
        assert!(controller.view().upload.drag_active);

        let effects = controller.handle(Event::FilesDropped(vec![png("one.png"), png("two.png")]));
        assert!(!controller.view().upload.drag_active);
        match effects.as_slice() {
            [Effect::LoadPreview { file, .. }] => assert_eq!(file.name(), "one.png"),
            other => panic!("unexpected effects {:?}", other),
        }

        assert!(controller.handle(Event::FilesDropped(Vec::new())).is_empty());
    }

    #[test]
    fn without_threshold_control_uses_default() {
        let mut controller = UploadController::new(ControllerOptions {
            threshold_control: false,
            ..ControllerOptions::default()
        });
        controller.handle(Event::ThresholdInput(0.9));
        assert_eq!(controller.threshold().formatted(), "0.50");
        assert_eq!(controller.view().threshold_label, None);
    }

    #[test]
    fn threshold_label_mirrors_input() {
        let mut controller = UploadController::default();
        assert_eq!(controller.view().threshold_label.as_deref(), Some("0.50"));
        controller.handle(Event::ThresholdInput(0.456));
        assert_eq!(controller.view().threshold_label.as_deref(), Some("0.46"));
    }
}
