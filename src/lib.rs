#[macro_use]
mod named_enum;

pub mod camera;
pub mod config;
pub mod data_value;
pub mod error;
pub mod light;
pub mod mesh;
pub mod model_cache;
pub mod object;
pub mod scene;
pub mod scene_object;
pub mod shader;
pub mod wire;
pub mod world_object;

pub use scene_common::{AssetDocument, DocumentFormat, Pose};
