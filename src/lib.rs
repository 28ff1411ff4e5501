//! Detection console
//!
//! Client side of an image object-detection service: pick an image, preview
//! it, send it to the service with a score threshold, and show the returned
//! boxes, labels and status messages.
//!
//! # Architecture
//!
//! - `controller`: the upload-and-predict state machine. Events in, effects
//!   and a `ViewModel` out. No I/O.
//! - `runtime`: the event loop that performs effects on helper threads and
//!   feeds completions back to the controller.
//! - `transport`: the `PredictionService` seam and its HTTP implementation.
//! - `ui`: renderers that apply a `ViewModel` to a terminal.
//! - Supporting types: `intake`, `preview`, `threshold`, `response`,
//!   `render`, `status`, `view`, `config`.

pub mod config;
pub mod controller;
pub mod intake;
pub mod preview;
pub mod render;
pub mod response;
pub mod runtime;
pub mod status;
pub mod threshold;
pub mod transport;
pub mod ui;
pub mod view;

pub use config::ConsoleConfig;
pub use controller::{ControllerOptions, Effect, Event, RequestId, TimerKind, Timings, UploadController};
pub use intake::{CandidateFile, IntakeRejection, MediaType, SelectedFile, MAX_UPLOAD_BYTES};
pub use preview::PreviewImage;
pub use render::{render_detections, DetectionLine, DetectionsView, Placeholder};
pub use response::{Detection, DetectionResult, ErrorBody};
pub use runtime::{Runtime, RuntimeHandle};
pub use status::{StatusKind, StatusMessage};
pub use threshold::{Threshold, ThresholdControl};
pub use transport::{HttpPredictionService, PredictionOutcome, PredictionService};
pub use ui::{Renderer, TerminalRenderer, UiMode};
pub use view::ViewModel;
