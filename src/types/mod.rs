mod resolution;
mod stream;

pub use resolution::Resolution;
pub use stream::{PlaylistContext, Resolved, StreamDescriptor, VideoRef};
