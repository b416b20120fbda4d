//! Touch event encoding for the companion agent's control socket.
//!
//! Every event is a fixed 32-byte big-endian record. The agent never replies
//! after its readiness byte, so this module only encodes.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Control message type for an injected touch event.
pub const INJECT_TOUCH_EVENT: u8 = 0x02;

/// Pointer id the agent treats as a generic finger.
pub const POINTER_ID: u64 = 0x1234_5678_8765_4321;

pub const MAX_PRESSURE: u16 = 0xffff;

/// Primary button, used for both the action button and the button state.
pub const BUTTON_PRIMARY: u32 = 0x0000_0001;

/// Encoded length of one touch event.
pub const TOUCH_EVENT_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TouchAction {
    Down = 0,
    Up = 1,
}

/// Device screen size in pixels, as reported to the agent in every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u16,
    pub height: u16,
}

impl ScreenSize {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Size of a captured screenshot, saturating at `u16::MAX`.
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(saturate(width), saturate(height))
    }
}

impl std::fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub x: u16,
    pub y: u16,
    pub screen: ScreenSize,
}

impl TouchEvent {
    /// Build an event at a screen point. Coordinates past `u16::MAX` saturate.
    pub fn at(action: TouchAction, point: Point, screen: ScreenSize) -> Self {
        Self {
            action,
            x: saturate(point.x),
            y: saturate(point.y),
            screen,
        }
    }

    /// Serialize to the wire record.
    ///
    /// | Offset | Field |
    /// |-------:|-------|
    /// | 0 | message type |
    /// | 1 | action |
    /// | 2..10 | pointer id |
    /// | 10..14 | x (32-bit) |
    /// | 14..18 | y (32-bit) |
    /// | 18..20 | screen width |
    /// | 20..22 | screen height |
    /// | 22..24 | pressure |
    /// | 24..28 | action button |
    /// | 28..32 | buttons |
    pub fn encode(&self) -> [u8; TOUCH_EVENT_LEN] {
        let mut buf = [0u8; TOUCH_EVENT_LEN];
        buf[0] = INJECT_TOUCH_EVENT;
        buf[1] = self.action as u8;
        buf[2..10].copy_from_slice(&POINTER_ID.to_be_bytes());
        buf[10..14].copy_from_slice(&u32::from(self.x).to_be_bytes());
        buf[14..18].copy_from_slice(&u32::from(self.y).to_be_bytes());
        buf[18..20].copy_from_slice(&self.screen.width.to_be_bytes());
        buf[20..22].copy_from_slice(&self.screen.height.to_be_bytes());
        buf[22..24].copy_from_slice(&MAX_PRESSURE.to_be_bytes());
        buf[24..28].copy_from_slice(&BUTTON_PRIMARY.to_be_bytes());
        buf[28..32].copy_from_slice(&BUTTON_PRIMARY.to_be_bytes());
        buf
    }
}

/// Encode a tap as its touch-down and touch-up records.
///
/// Returns (down_record, up_record).
pub fn encode_tap(point: Point, screen: ScreenSize) -> ([u8; TOUCH_EVENT_LEN], [u8; TOUCH_EVENT_LEN]) {
    let down = TouchEvent::at(TouchAction::Down, point, screen).encode();
    let up = TouchEvent::at(TouchAction::Up, point, screen).encode();
    (down, up)
}

fn saturate(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
