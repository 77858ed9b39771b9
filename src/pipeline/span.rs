//! This module contains the pluggable delta-span detection strategies.
//!
//! The Huffman envelopes delta-code an integer array when its elements repeat
//! with a fixed stride. Index lists of face sets are the common case: every face
//! ends with a `-1` terminator, so a mesh of triangles shows a marker every
//! fourth element. A `SpanDetector` looks at the array and returns that stride,
//! or 0 for "no delta coding".

use crate::config::SpanDetection;

/// Largest span the 7-bit envelope header field can carry.
pub const MAX_SPAN: usize = 127;

/// Chooses the delta span for an integer array. 0 disables delta coding.
pub trait SpanDetector {
    fn detect(&self, data: &[i32]) -> usize;
}

/// Looks for `marker` at a consistent stride within the first `window` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSpanDetector {
    pub marker: i32,
    pub window: usize,
}

impl Default for MarkerSpanDetector {
    fn default() -> Self {
        Self {
            marker: -1,
            window: 20,
        }
    }
}

impl SpanDetector for MarkerSpanDetector {
    fn detect(&self, data: &[i32]) -> usize {
        let mut span: Option<usize> = None;
        let mut run = 0usize;
        for &v in data.iter().take(self.window) {
            run += 1;
            if v != self.marker {
                continue;
            }
            match span {
                None => span = Some(run),
                Some(s) if s != run => return 0,
                Some(_) => {}
            }
            run = 0;
        }
        match span {
            Some(s) if s <= MAX_SPAN => s,
            _ => 0,
        }
    }
}

/// Always returns the same span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSpan(pub usize);

impl SpanDetector for FixedSpan {
    fn detect(&self, _data: &[i32]) -> usize {
        if self.0 > MAX_SPAN {
            log::warn!("fixed span {} exceeds {}; delta coding disabled", self.0, MAX_SPAN);
            return 0;
        }
        self.0
    }
}

/// Never delta codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoSpan;

impl SpanDetector for NoSpan {
    fn detect(&self, _data: &[i32]) -> usize {
        0
    }
}

/// Builds the detector a `SpanDetection` setting names.
pub fn detector_for(setting: &SpanDetection) -> Box<dyn SpanDetector + Send + Sync> {
    match *setting {
        SpanDetection::Marker { marker, window } => Box::new(MarkerSpanDetector { marker, window }),
        SpanDetection::Fixed { span } => Box::new(FixedSpan(span as usize)),
        SpanDetection::Disabled => Box::new(NoSpan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_index_list() {
        let faces = [0, 1, 2, -1, 2, 3, 0, -1, 4, 5, 6, -1];
        assert_eq!(MarkerSpanDetector::default().detect(&faces), 4);
    }

    #[test]
    fn test_inconsistent_stride_disables_delta() {
        let faces = [0, 1, 2, -1, 2, 3, 0, 5, -1];
        assert_eq!(MarkerSpanDetector::default().detect(&faces), 0);
    }

    #[test]
    fn test_no_marker_disables_delta() {
        assert_eq!(MarkerSpanDetector::default().detect(&[1, 2, 3, 4]), 0);
        assert_eq!(MarkerSpanDetector::default().detect(&[]), 0);
    }

    #[test]
    fn test_window_limits_the_scan() {
        // The irregular stride only shows up after the window.
        let mut data: Vec<i32> = [7, 8, -1].repeat(7);
        data.extend_from_slice(&[1, 1, 1, 1, -1]);
        let detector = MarkerSpanDetector { marker: -1, window: 20 };
        assert_eq!(detector.detect(&data), 3);
        let wide = MarkerSpanDetector { marker: -1, window: 100 };
        assert_eq!(wide.detect(&data), 0);
    }

    #[test]
    fn test_custom_marker() {
        let detector = MarkerSpanDetector { marker: 99, window: 20 };
        assert_eq!(detector.detect(&[1, 99, 2, 99, 3, 99]), 2);
    }

    #[test]
    fn test_detector_for_settings() {
        let data = [0, 1, -1, 2, 3, -1];
        assert_eq!(detector_for(&SpanDetection::default()).detect(&data), 3);
        assert_eq!(detector_for(&SpanDetection::Fixed { span: 5 }).detect(&data), 5);
        assert_eq!(detector_for(&SpanDetection::Fixed { span: 200 }).detect(&data), 0);
        assert_eq!(detector_for(&SpanDetection::Disabled).detect(&data), 0);
    }
}
