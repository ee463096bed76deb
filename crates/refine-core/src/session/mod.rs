//! Session domain module.
//!
//! - `token`: token minting and validation (`SessionToken`, `TokenAuthority`)
//! - `Session`: one overlay lifetime with its geometry

mod token;

pub use token::{SessionToken, TokenAuthority, TokenSource, create_token, validate};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overlay geometry in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Visible area of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

impl FrameMetrics {
    /// Default placement: right half of the viewport, 24px margins.
    pub fn initial(viewport: Viewport, min_width: i32, min_height: i32) -> Self {
        let width = (viewport.width / 3).max(min_width);
        let height = (viewport.height / 2).max(min_height);
        Self {
            left: viewport.width - width - 24,
            top: 24,
            width,
            height,
        }
        .clamped(viewport, min_width, min_height)
    }

    pub fn moved_to(self, left: i32, top: i32) -> Self {
        Self { left, top, ..self }
    }

    pub fn resized_to(self, width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }

    /// Enforces the minimum size and keeps the frame inside the viewport.
    pub fn clamped(self, viewport: Viewport, min_width: i32, min_height: i32) -> Self {
        let width = self.width.max(min_width).min(viewport.width.max(min_width));
        let height = self
            .height
            .max(min_height)
            .min(viewport.height.max(min_height));
        let left = self.left.clamp(0, (viewport.width - width).max(0));
        let top = self.top.clamp(0, (viewport.height - height).max(0));
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// One overlay lifetime: created on open, destroyed on close.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    /// Last known overlay geometry; authoritative on the content side.
    pub frame: FrameMetrics,
    pub opened_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SessionToken, frame: FrameMetrics) -> Self {
        Self {
            token,
            frame,
            opened_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_frame_fits_viewport() {
        let viewport = Viewport::default();
        let frame = FrameMetrics::initial(viewport, 320, 200);
        assert!(frame.left >= 0 && frame.left + frame.width <= viewport.width);
        assert!(frame.top >= 0 && frame.top + frame.height <= viewport.height);
    }

    #[test]
    fn test_clamp_enforces_minimum_and_bounds() {
        let viewport = Viewport {
            width: 1000,
            height: 600,
        };
        let frame = FrameMetrics {
            left: 900,
            top: -50,
            width: 100,
            height: 5000,
        }
        .clamped(viewport, 320, 200);

        assert_eq!(
            frame,
            FrameMetrics {
                left: 680,
                top: 0,
                width: 320,
                height: 600,
            }
        );
    }
}
