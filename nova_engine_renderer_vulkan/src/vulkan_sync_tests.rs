//! Unit tests for frame cursor cycling

use crate::vulkan_sync::{FrameCursor, DEFAULT_FRAMES_IN_FLIGHT};

#[test]
fn test_cursor_starts_at_zero() {
    let cursor = FrameCursor::new(DEFAULT_FRAMES_IN_FLIGHT);
    assert_eq!(cursor.current(), 0);
    assert_eq!(cursor.frame_count(), DEFAULT_FRAMES_IN_FLIGHT);
}

#[test]
fn test_cursor_cycles_through_all_slots() {
    let mut cursor = FrameCursor::new(3);
    let mut visited = Vec::new();
    for _ in 0..6 {
        visited.push(cursor.current());
        cursor.advance();
    }
    assert_eq!(visited, vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn test_cursor_single_slot_stays_put() {
    let mut cursor = FrameCursor::new(1);
    cursor.advance();
    cursor.advance();
    assert_eq!(cursor.current(), 0);
}

#[test]
fn test_cursor_never_leaves_range() {
    let mut cursor = FrameCursor::new(4);
    for _ in 0..100 {
        assert!(cursor.current() < cursor.frame_count());
        cursor.advance();
    }
}
