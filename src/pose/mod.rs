pub mod detector;
pub mod keypoint;
pub mod normalize;
pub mod preprocess;

pub use detector::{ModelLoader, MoveNet, MoveNetLoader, PoseModel};
pub use keypoint::{Keypoint, KeypointName, ModelSpace, Normalized, Pose};
pub use normalize::normalize;
pub use preprocess::{preprocess_for_movenet, MOVENET_INPUT_SIZE};
