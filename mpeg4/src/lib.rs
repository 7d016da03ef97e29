//! ISO base media file format support for HEVC: decoder configuration records, atom reading and
//! writing, and fragmented MP4 output.

pub mod atom;
pub use atom::*;

pub mod error;
pub use error::*;

pub mod fragment;
pub use fragment::*;

pub mod fragmented;
pub use fragmented::*;

pub mod hvcc;
pub use hvcc::*;
