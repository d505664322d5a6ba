//! Turns folders of timestamped camera stills into one video per
//! `(device, channel, sequence, date)` segment, appending new stills on every
//! pass and moving the originals into a dated backup tree.

pub mod annotation;
pub mod pipeline;
pub mod relocation;
pub mod segment;
pub mod shared;
pub mod video;
