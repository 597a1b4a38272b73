//! Widget pipeline: normalization, collaborators and render coordination.

pub mod defaults;
pub mod normalize;
pub mod popular;
pub mod query;
pub mod render;
pub mod thumbnails;
pub mod widget;
