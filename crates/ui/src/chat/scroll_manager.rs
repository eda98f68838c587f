use gpui::{Bounds, Pixels, point};
use gpui_component::VirtualListScrollHandle;

/// Distance from the tail within which following resumes.
const AUTO_FOLLOW_RESUME_THRESHOLD: f32 = 24.;
/// Scroll deltas below this are treated as jitter.
const SCROLL_DELTA_EPSILON: f32 = 1.0;

/// Vertical scroll position as reported by the list handle.
///
/// GPUI scrolls down with negative offsets, so the tail sits at `offset == -max_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ScrollSample {
    offset: f32,
    max_offset: f32,
}

impl ScrollSample {
    fn is_near_tail(&self) -> bool {
        self.max_offset <= 0.
            || (self.offset + self.max_offset).abs() <= AUTO_FOLLOW_RESUME_THRESHOLD
    }
}

/// Decides whether the list keeps following new rows after moving from `previous` to `current`.
fn next_follow(
    previous: ScrollSample,
    current: ScrollSample,
    following: bool,
    forced: bool,
) -> bool {
    let offset_delta = current.offset - previous.offset;
    let content_resized = (current.max_offset - previous.max_offset).abs() > SCROLL_DELTA_EPSILON;

    if forced || (content_resized && previous.is_near_tail()) {
        return true;
    }
    if content_resized {
        return following;
    }

    if following {
        // Only a manual scroll toward older rows pauses following.
        offset_delta <= SCROLL_DELTA_EPSILON
    } else {
        offset_delta < -SCROLL_DELTA_EPSILON && current.is_near_tail()
    }
}

/// Keeps the transcript pinned to its newest row until the user scrolls away.
pub struct ScrollManager {
    scroll_handle: VirtualListScrollHandle,
    last_sample: ScrollSample,
    following: bool,
    forced: bool,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: VirtualListScrollHandle::new(),
            last_sample: ScrollSample::default(),
            following: true,
            forced: false,
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.scroll_handle
    }

    pub fn bounds(&self) -> Bounds<Pixels> {
        self.scroll_handle.bounds()
    }

    pub fn request_scroll_to_bottom(&mut self) {
        self.forced = true;
        self.following = true;
    }

    pub fn request_scroll_to_bottom_if_following(&mut self) {
        if self.following || self.last_sample.is_near_tail() {
            self.forced = true;
        }
    }

    pub fn update_follow_state(&mut self) {
        let current = self.sample();
        self.following = next_follow(self.last_sample, current, self.following, self.forced);
        self.last_sample = current;
    }

    pub fn apply_pending_scroll(&mut self) {
        if self.following || self.forced {
            let max_offset = self.scroll_handle.max_offset().height;
            let target_y = if max_offset > Pixels::ZERO {
                -max_offset
            } else {
                Pixels::ZERO
            };
            let current_x = self.scroll_handle.offset().x;
            self.scroll_handle.set_offset(point(current_x, target_y));
        }

        self.forced = false;
    }

    fn sample(&self) -> ScrollSample {
        ScrollSample {
            offset: f32::from(self.scroll_handle.offset().y),
            max_offset: f32::from(self.scroll_handle.max_offset().height),
        }
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset: f32, max_offset: f32) -> ScrollSample {
        ScrollSample { offset, max_offset }
    }

    #[test]
    fn scrolling_up_pauses_following() {
        assert!(!next_follow(at(-500., 500.), at(-300., 500.), true, false));
    }

    #[test]
    fn new_rows_keep_following_when_at_the_tail() {
        assert!(next_follow(at(-500., 500.), at(-500., 620.), false, false));
    }

    #[test]
    fn new_rows_do_not_yank_a_reader_scrolled_away() {
        assert!(!next_follow(at(-100., 500.), at(-100., 620.), false, false));
    }

    #[test]
    fn returning_to_the_tail_resumes_following() {
        assert!(next_follow(at(-300., 500.), at(-490., 500.), false, false));
        assert!(!next_follow(at(-100., 500.), at(-200., 500.), false, false));
    }

    #[test]
    fn forced_scroll_always_follows() {
        assert!(next_follow(at(-100., 500.), at(0., 500.), false, true));
    }
}
