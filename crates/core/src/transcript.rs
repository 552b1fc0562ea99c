//! Transcript events delivered by the speech-to-text collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One transcript for a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Call identifier
    pub call_id: String,

    /// Transcribed text
    pub text: String,

    /// Is this a final result?
    pub is_final: bool,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// When the speech was recognized
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEvent {
    pub fn new(call_id: impl Into<String>, text: impl Into<String>, is_final: bool, confidence: f32) -> Self {
        Self {
            call_id: call_id.into(),
            text: text.into(),
            is_final,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        }
    }

    /// Create a final transcript
    pub fn final_result(call_id: impl Into<String>, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(call_id, text, true, confidence)
    }

    /// Create a partial (non-final) transcript
    pub fn partial(call_id: impl Into<String>, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(call_id, text, false, confidence)
    }

    /// Set the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check if transcript is empty
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_creation() {
        let t = TranscriptEvent::final_result("call-1", "press 1 for sales", 0.92);
        assert!(t.is_final);
        assert_eq!(t.call_id, "call-1");
        assert!(!t.is_empty());
    }

    #[test]
    fn test_confidence_clamped() {
        let t = TranscriptEvent::partial("call-1", "  ", 1.4);
        assert_eq!(t.confidence, 1.0);
        assert!(t.is_empty());
    }
}
