use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detection pipelines the live preview can attach to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DetectorModel {
    ObjectDetection,
    ObjectDetectionCustom,
    CustomAutoMlObjectDetection,
    FaceDetection,
    BarcodeScanning,
    ImageLabeling,
    ImageLabelingCustom,
    CustomAutoMlLabeling,
    #[default]
    PoseDetection,
    SelfieSegmentation,
    TextRecognitionLatin,
    TextRecognitionChinese,
    TextRecognitionDevanagari,
    TextRecognitionJapanese,
    TextRecognitionKorean,
}

impl DetectorModel {
    pub const ALL: [DetectorModel; 15] = [
        DetectorModel::ObjectDetection,
        DetectorModel::ObjectDetectionCustom,
        DetectorModel::CustomAutoMlObjectDetection,
        DetectorModel::FaceDetection,
        DetectorModel::BarcodeScanning,
        DetectorModel::ImageLabeling,
        DetectorModel::ImageLabelingCustom,
        DetectorModel::CustomAutoMlLabeling,
        DetectorModel::PoseDetection,
        DetectorModel::SelfieSegmentation,
        DetectorModel::TextRecognitionLatin,
        DetectorModel::TextRecognitionChinese,
        DetectorModel::TextRecognitionDevanagari,
        DetectorModel::TextRecognitionJapanese,
        DetectorModel::TextRecognitionKorean,
    ];

    /// Models offered in the live-session picker, in display order.
    pub const LIVE_SESSION: [DetectorModel; 2] =
        [DetectorModel::PoseDetection, DetectorModel::ObjectDetection];

    /// Identifier shown to the user and passed to the pipeline selector.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorModel::ObjectDetection => "Object Detection",
            DetectorModel::ObjectDetectionCustom => "Custom Object Detection",
            DetectorModel::CustomAutoMlObjectDetection => {
                "Custom AutoML Object Detection (Flower)"
            }
            DetectorModel::FaceDetection => "Face Detection",
            DetectorModel::BarcodeScanning => "Barcode Scanning",
            DetectorModel::ImageLabeling => "Image Labeling",
            DetectorModel::ImageLabelingCustom => "Custom Image Labeling (Birds)",
            DetectorModel::CustomAutoMlLabeling => "Custom AutoML Image Labeling (Flower)",
            DetectorModel::PoseDetection => "Pose Detection",
            DetectorModel::SelfieSegmentation => "Selfie Segmentation",
            DetectorModel::TextRecognitionLatin => "Text Recognition Latin",
            DetectorModel::TextRecognitionChinese => "Text Recognition Chinese (Beta)",
            DetectorModel::TextRecognitionDevanagari => "Text Recognition Devanagari (Beta)",
            DetectorModel::TextRecognitionJapanese => "Text Recognition Japanese (Beta)",
            DetectorModel::TextRecognitionKorean => "Text Recognition Korean (Beta)",
        }
    }
}

impl fmt::Display for DetectorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a model identifier is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model: {0}")]
pub struct ParseModelError(pub String);

impl FromStr for DetectorModel {
    type Err = ParseModelError;

    /// Accepts the display identifier, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseModelError(s.to_string()))
    }
}

impl TryFrom<String> for DetectorModel {
    type Error = ParseModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DetectorModel> for String {
    fn from(model: DetectorModel) -> Self {
        model.as_str().to_string()
    }
}
