//! Audio attachments. The waveform is never transcribed; the model sees a
//! placeholder naming the file, priced like any other text.

use std::path::Path;

use super::ModelInput;

pub fn extract(path: &Path) -> ModelInput {
    ModelInput::Audio {
        placeholder: placeholder(path),
    }
}

pub fn placeholder(path: &Path) -> String {
    format!("[Audio file: {}]", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::TokenEstimator;

    #[test]
    fn test_placeholder_names_path() {
        assert_eq!(
            placeholder(Path::new("/music/take1.mp3")),
            "[Audio file: /music/take1.mp3]"
        );
    }

    #[test]
    fn test_tokens_follow_placeholder_length() {
        let estimator = TokenEstimator::default();
        let short = extract(Path::new("/a.mp3")).estimate_tokens(&estimator);
        let long = extract(Path::new("/a/much/longer/directory/name/recording.mp3")).estimate_tokens(&estimator);
        assert!(short > 0);
        assert!(long > short);
    }

    #[test]
    fn test_missing_file_still_gets_placeholder() {
        // No I/O happens, so a vanished file cannot fail extraction
        let input = extract(Path::new("/nonexistent/voice.ogg"));
        assert_eq!(input.into_content(), "[Audio file: /nonexistent/voice.ogg]");
    }
}
