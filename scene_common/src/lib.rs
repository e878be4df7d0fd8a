pub mod document;
pub mod hash;
pub mod property;
pub mod transform;
pub mod wire;

pub use document::{AssetDocument, AssetTypeId, DocumentAsset, DocumentError, DocumentFormat};
pub use hash::{hash_combine, hash_str, ContentHash, HashError, HASH_BYTE_WIDTH};
pub use property::{Element, FromProperty, Property, PropertyError};
pub use transform::Pose;
