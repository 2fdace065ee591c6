//! Shared-strings sub-interface (spec §4.9 `shared_strings`, §9 open
//! question on `add` vs `append`).
//!
//! Per the Open Question resolution recorded in DESIGN.md: `add` is
//! "add or return existing id" (deduplicated), `append` is "append
//! without dedup" — both return an id the handler later stores on a
//! cell via `sheet::set_string`.

use crate::import::types::Argb;

pub trait SharedStrings {
    /// Add a plain string, deduplicated against previously added content.
    fn add(&mut self, value: &str) -> u32;

    /// Append a plain string without deduplication.
    fn append(&mut self, value: &str) -> u32 {
        self.add(value)
    }

    /// Begin a formatted (rich-text) string built from one or more
    /// segments, each carrying its own run formatting.
    fn start_segments(&mut self) -> Box<dyn SharedStringSegments>;
}

pub trait SharedStringSegments {
    fn set_segment_bold(&mut self, value: bool) {
        let _ = value;
    }
    fn set_segment_italic(&mut self, value: bool) {
        let _ = value;
    }
    fn set_segment_font_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_segment_font_size(&mut self, points: f64) {
        let _ = points;
    }
    fn set_segment_font_color(&mut self, color: Argb) {
        let _ = color;
    }
    /// Append `text` as a new run using whatever segment formatting is
    /// currently set; subsequent `set_segment_*` calls affect only runs
    /// appended afterward.
    fn append_segment(&mut self, text: &str);
    fn commit_segments(self: Box<Self>) -> u32;
}
