use std::time::Duration;

/// Default bottom-proximity threshold, in percent.
pub const DEFAULT_BOTTOM_THRESHOLD_PCT: f64 = 30.0;

/// Fallback delay between a feed update arriving and its content height
/// becoming measurable, for hosts without an explicit content-measured
/// signal. The core never sleeps itself; callers own the timing.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Measured geometry of the message list viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Scroll offset from the top of the content, in pixels.
    pub scroll_top: f64,
    /// Total content height, in pixels.
    pub scroll_height: f64,
    /// Visible height, in pixels.
    pub client_height: f64,
}

/// Instruction for the presentation layer after a feed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollInstruction {
    /// Pin the scroll offset to the new bottom.
    PinToBottom,
    /// Leave the user's reading position alone.
    PreservePosition,
}

/// Whether the viewport is within `threshold_pct` of the bottom.
///
/// Replicates `100 * scroll_top / (scroll_height - client_height)`; content
/// that does not overflow maps to 0% instead of dividing by zero.
pub fn should_stick_to_bottom(viewport: Viewport, threshold_pct: f64) -> bool {
    let overflow = viewport.scroll_height - viewport.client_height;
    let percentage = if overflow > 0.0 {
        100.0 * viewport.scroll_top / overflow
    } else {
        0.0
    };
    percentage > threshold_pct
}

/// Decides whether incoming snapshots pin the view to the bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    threshold_pct: f64,
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self::new(DEFAULT_BOTTOM_THRESHOLD_PCT)
    }
}

impl ScrollAnchor {
    /// Create an anchor with a custom bottom-proximity threshold.
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }

    /// Decide the scroll behavior for a freshly arrived snapshot.
    ///
    /// `viewport` is `None` before the list has rendered once; initial and
    /// non-overflowing views pin to the bottom so the newest message shows.
    pub fn on_snapshot(&self, viewport: Option<Viewport>) -> ScrollInstruction {
        match viewport {
            Some(viewport) if !should_stick_to_bottom(viewport, self.threshold_pct) => {
                ScrollInstruction::PreservePosition
            }
            _ => ScrollInstruction::PinToBottom,
        }
    }
}

/// Captured geometry for restoring the reading position after a load-more.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadMoreAnchor {
    height_before: f64,
    offset_before: f64,
}

impl LoadMoreAnchor {
    /// Snapshot the pre-fetch geometry.
    pub fn capture(viewport: Viewport) -> Self {
        Self {
            height_before: viewport.scroll_height,
            offset_before: viewport.scroll_top,
        }
    }

    /// Corrective scroll offset once the prepended content is measurable:
    /// the content height growth added to the previous offset, keeping the
    /// previously visible message anchored.
    pub fn corrected_offset(&self, new_scroll_height: f64) -> f64 {
        self.offset_before + (new_scroll_height - self.height_before).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(scroll_top: f64, scroll_height: f64, client_height: f64) -> Viewport {
        Viewport {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    #[test]
    fn top_of_history_does_not_stick() {
        assert!(!should_stick_to_bottom(
            viewport(0.0, 1000.0, 500.0),
            DEFAULT_BOTTOM_THRESHOLD_PCT
        ));
    }

    #[test]
    fn near_bottom_sticks() {
        assert!(should_stick_to_bottom(
            viewport(800.0, 1000.0, 500.0),
            DEFAULT_BOTTOM_THRESHOLD_PCT
        ));
    }

    #[test]
    fn no_overflow_never_divides_by_zero() {
        assert!(!should_stick_to_bottom(
            viewport(0.0, 500.0, 500.0),
            DEFAULT_BOTTOM_THRESHOLD_PCT
        ));
        assert!(!should_stick_to_bottom(
            viewport(0.0, 300.0, 500.0),
            DEFAULT_BOTTOM_THRESHOLD_PCT
        ));
    }

    #[test]
    fn initial_snapshot_pins_to_bottom() {
        let anchor = ScrollAnchor::default();
        assert_eq!(anchor.on_snapshot(None), ScrollInstruction::PinToBottom);
    }

    #[test]
    fn reading_position_up_the_history_is_preserved() {
        let anchor = ScrollAnchor::default();
        assert_eq!(
            anchor.on_snapshot(Some(viewport(0.0, 1000.0, 500.0))),
            ScrollInstruction::PreservePosition
        );
        assert_eq!(
            anchor.on_snapshot(Some(viewport(800.0, 1000.0, 500.0))),
            ScrollInstruction::PinToBottom
        );
    }

    #[test]
    fn load_more_correction_adds_height_growth_to_previous_offset() {
        let anchor = LoadMoreAnchor::capture(viewport(120.0, 1000.0, 500.0));
        assert_eq!(anchor.corrected_offset(1600.0), 720.0);
    }

    #[test]
    fn load_more_correction_ignores_shrinking_content() {
        let anchor = LoadMoreAnchor::capture(viewport(120.0, 1000.0, 500.0));
        assert_eq!(anchor.corrected_offset(900.0), 120.0);
    }
}
