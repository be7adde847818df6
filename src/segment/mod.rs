//! Segment generation module.
//!
//! Converts planner blocks into fixed-duration execution segments for
//! the pulse scheduler.

mod generator;

pub use generator::{
    FillStatus, OverrideState, Segment, SegmentGenerator, SegmentQueue, SEGMENT_CAPACITY,
    SEGMENT_SECONDS,
};
