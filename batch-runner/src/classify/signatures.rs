// Copyright (c) The stbt-batch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure signatures: recognizable patterns in captured output.
//!
//! Each signature is a pure function from the frozen captured text to a
//! structured answer. Keeping them independent (rather than one monolithic
//! parser) is what lets a single run match several signatures at once.

use regex::Regex;
use std::sync::LazyLock;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Searching for (\S+\.png)").expect("template regex is valid")
});

/// True if the test gave up while searching for a reference image.
pub fn match_timeout(text: &str) -> bool {
    text.contains("MatchTimeout")
}

/// The reference image most recently searched for, if any search was
/// logged. When several searches appear, the last match wins.
pub fn last_searched_template(text: &str) -> Option<&str> {
    TEMPLATE_RE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .last()
        .map(|m| m.as_str())
}

/// True if the capture pipeline reported losing the video signal.
pub fn no_video(text: &str) -> bool {
    text.contains("NoVideo")
}

/// True if a v4l2 source reported that its device node is gone.
pub fn device_missing(text: &str) -> bool {
    text.contains("Cannot identify device")
}

/// True if a Blackmagic diagnostic probe reported that opening the input
/// failed (the card is held by another process).
pub fn probe_input_failed(text: &str) -> bool {
    text.contains("input failed")
}

/// True if a Blackmagic diagnostic probe saw at least one frame arrive.
pub fn probe_frame_arrived(text: &str) -> bool {
    text.contains("frame arrived")
}
