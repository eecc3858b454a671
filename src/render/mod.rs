pub mod framebuffer;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use framebuffer::FrameBuffer;
pub use skeleton::{Canvas, RenderStyle, SkeletonRenderer, SKELETON_CONNECTIONS};
#[cfg(feature = "desktop")]
pub use window::OverlayWindow;
