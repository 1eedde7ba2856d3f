//! Fenced code block and inline code span detection.
//!
//! Directives inside fenced code must be copied through untouched, so the
//! expander computes the byte ranges covered by fences before every pass.
//! Macros additionally leave inline code spans alone.

use std::ops::Range;

/// Tracks code fence state during line-by-line processing.
///
/// Fences use backticks or tildes (three or more). The closing fence must use
/// the same character and be at least as long as the opening fence.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    fence_char: Option<char>,
    fence_len: usize,
}

impl FenceTracker {
    pub(crate) fn in_fence(&self) -> bool {
        self.fence_char.is_some()
    }

    /// Feed one line. Returns `true` if the line opened or closed a fence.
    pub(crate) fn update(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();

        if let Some(fence_char) = self.fence_char {
            if is_closing_fence(trimmed, fence_char, self.fence_len) {
                self.fence_char = None;
                self.fence_len = 0;
                return true;
            }
            return false;
        }

        if let Some((ch, len)) = detect_fence(trimmed) {
            self.fence_char = Some(ch);
            self.fence_len = len;
            return true;
        }
        false
    }
}

fn detect_fence(trimmed: &str) -> Option<(char, usize)> {
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let count = trimmed.chars().take_while(|&c| c == first).count();
    // Backtick fences may not carry backticks in their info string.
    if first == '`' && trimmed[count..].contains('`') {
        return None;
    }
    (count >= 3).then_some((first, count))
}

fn is_closing_fence(trimmed: &str, expected: char, min_len: usize) -> bool {
    if !trimmed.starts_with(expected) {
        return false;
    }
    let count = trimmed.chars().take_while(|&c| c == expected).count();
    count >= min_len && trimmed[count..].chars().all(char::is_whitespace)
}

/// Byte ranges of all fenced code blocks in `text`, fence lines included.
///
/// An unclosed fence extends to the end of the text.
pub(crate) fn code_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut tracker = FenceTracker::default();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let was_open = tracker.in_fence();
        if tracker.update(line.trim_end_matches(['\n', '\r'])) {
            if was_open {
                spans.push(start..offset + line.len());
            } else {
                start = offset;
            }
        }
        offset += line.len();
    }
    if tracker.in_fence() {
        spans.push(start..text.len());
    }
    spans
}

/// Byte ranges of inline code spans outside the fenced blocks `fences`.
///
/// A run of backticks opens a span that the next run of the same length
/// closes. Spans do not cross a blank line; an unclosed run is literal text.
pub(crate) fn inline_code_spans(text: &str, fences: &[Range<usize>]) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut gaps = Vec::with_capacity(fences.len() + 1);
    let mut start = 0;
    for fence in fences {
        gaps.push(start..fence.start);
        start = fence.end;
    }
    gaps.push(start..text.len());

    for gap in gaps {
        let mut i = gap.start;
        while i < gap.end {
            if bytes[i] != b'`' {
                i += 1;
                continue;
            }
            let open = backtick_run(bytes, i, gap.end);
            match closing_run(bytes, i + open, gap.end, open) {
                Some(end) => {
                    spans.push(i..end);
                    i = end;
                }
                None => i += open,
            }
        }
    }
    spans
}

/// Fenced blocks and inline code spans, sorted.
pub(crate) fn all_code_spans(text: &str) -> Vec<Range<usize>> {
    let fences = code_spans(text);
    let mut spans = inline_code_spans(text, &fences);
    spans.extend(fences);
    spans.sort_by_key(|span| span.start);
    spans
}

fn backtick_run(bytes: &[u8], at: usize, end: usize) -> usize {
    bytes[at..end].iter().take_while(|&&b| b == b'`').count()
}

/// End offset of the first run of exactly `len` backticks from `from`.
fn closing_run(bytes: &[u8], from: usize, end: usize, len: usize) -> Option<usize> {
    let mut j = from;
    while j < end {
        match bytes[j] {
            b'`' => {
                let run = backtick_run(bytes, j, end);
                if run == len {
                    return Some(j + run);
                }
                j += run;
            }
            b'\n' if starts_blank_line(&bytes[j + 1..end]) => return None,
            _ => j += 1,
        }
    }
    None
}

fn starts_blank_line(rest: &[u8]) -> bool {
    rest.iter()
        .find(|&&b| !matches!(b, b' ' | b'\t' | b'\r'))
        .is_none_or(|&b| b == b'\n')
}

/// Whether `offset` falls inside one of the sorted, disjoint `spans`.
pub(crate) fn in_spans(spans: &[Range<usize>], offset: usize) -> bool {
    spans
        .binary_search_by(|span| {
            if span.end <= offset {
                std::cmp::Ordering::Less
            } else if span.start > offset {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}
