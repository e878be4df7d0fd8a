use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::property::Element;

pub type AssetTypeId = &'static str;

/// Prefix of every binary document.
pub const BINARY_MAGIC: &[u8; 4] = b"SKPT";

/// A persisted type with its own document identity.
pub trait DocumentAsset {
    fn id() -> AssetTypeId
    where
        Self: Sized;
    fn version() -> u32
    where
        Self: Sized;
}

/// The two encodings of the same document schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    #[default]
    Binary,
    Ascii,
}

impl DocumentFormat {
    /// Lookup order when a document may exist in either encoding.
    pub const ALL: [DocumentFormat; 2] = [DocumentFormat::Binary, DocumentFormat::Ascii];

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Binary => "bin",
            DocumentFormat::Ascii => "ascii",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == extension)
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("binary document encoding failed: {0}")]
    Binary(#[from] bincode::Error),
    #[error("ascii document encoding failed: {0}")]
    Ascii(#[from] serde_json::Error),
    #[error("binary document is missing its header")]
    BadMagic,
    #[error("expected asset type {expected:?}, found {actual:?}")]
    WrongAssetType { expected: String, actual: String },
    #[error("document version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// A versioned property tree with an asset type identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetDocument {
    pub asset_type: String,
    pub version: u32,
    pub root: Element,
}

impl AssetDocument {
    pub fn new(asset_type: impl Into<String>, version: u32) -> Self {
        Self {
            asset_type: asset_type.into(),
            version,
            root: Element::new(),
        }
    }

    pub fn for_asset<T: DocumentAsset>() -> Self {
        Self::new(T::id(), T::version())
    }

    /// Fails unless the document was written for `T` by a version this build understands.
    pub fn check<T: DocumentAsset>(&self) -> Result<(), DocumentError> {
        if self.asset_type != T::id() {
            return Err(DocumentError::WrongAssetType {
                expected: T::id().to_string(),
                actual: self.asset_type.clone(),
            });
        }
        if self.version > T::version() {
            return Err(DocumentError::UnsupportedVersion {
                found: self.version,
                supported: T::version(),
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self, format: DocumentFormat) -> Result<Vec<u8>, DocumentError> {
        match format {
            DocumentFormat::Binary => {
                let mut bytes = BINARY_MAGIC.to_vec();
                bincode::serialize_into(&mut bytes, self)?;
                Ok(bytes)
            }
            DocumentFormat::Ascii => Ok(serde_json::to_vec_pretty(self)?),
        }
    }

    pub fn from_bytes(bytes: &[u8], format: DocumentFormat) -> Result<Self, DocumentError> {
        match format {
            DocumentFormat::Binary => {
                let body = bytes
                    .strip_prefix(BINARY_MAGIC.as_slice())
                    .ok_or(DocumentError::BadMagic)?;
                Ok(bincode::deserialize(body)?)
            }
            DocumentFormat::Ascii => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// Picks the encoding from the header.
    pub fn detect_format(bytes: &[u8]) -> DocumentFormat {
        if bytes.starts_with(BINARY_MAGIC) {
            DocumentFormat::Binary
        } else {
            DocumentFormat::Ascii
        }
    }

    pub fn save(&self, path: impl AsRef<Path>, format: DocumentFormat) -> Result<(), DocumentError> {
        fs::write(path, self.to_bytes(format)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, Self::detect_format(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    struct TestAsset;
    impl DocumentAsset for TestAsset {
        fn id() -> AssetTypeId {
            "TEST"
        }
        fn version() -> u32 {
            2
        }
    }

    fn sample() -> AssetDocument {
        let mut document = AssetDocument::for_asset::<TestAsset>();
        document
            .root
            .insert("name", "sample")
            .insert("values", vec![1.5f32, -2.0, 0.1])
            .insert("nothing", Property::Nil)
            .insert("count", 42u64);
        document
    }

    #[test]
    fn both_encodings_round_trip() {
        let document = sample();
        for format in DocumentFormat::ALL {
            let bytes = document.to_bytes(format).unwrap();
            assert_eq!(AssetDocument::detect_format(&bytes), format);
            assert_eq!(AssetDocument::from_bytes(&bytes, format).unwrap(), document);
        }
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.ascii");
        sample().save(&path, DocumentFormat::Ascii).unwrap();
        let loaded = AssetDocument::load(&path).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn binary_requires_magic() {
        let document = sample();
        let bytes = document.to_bytes(DocumentFormat::Binary).unwrap();
        assert!(matches!(
            AssetDocument::from_bytes(&bytes[4..], DocumentFormat::Binary),
            Err(DocumentError::BadMagic)
        ));
    }

    #[test]
    fn check_rejects_other_types_and_newer_versions() {
        let mut document = sample();
        assert!(document.check::<TestAsset>().is_ok());

        document.version = 3;
        assert!(matches!(
            document.check::<TestAsset>(),
            Err(DocumentError::UnsupportedVersion {
                found: 3,
                supported: 2
            })
        ));

        document.asset_type = "OTHER".into();
        assert!(matches!(
            document.check::<TestAsset>(),
            Err(DocumentError::WrongAssetType { .. })
        ));
    }

    #[test]
    fn extensions() {
        assert_eq!(DocumentFormat::Binary.extension(), "bin");
        assert_eq!(DocumentFormat::from_extension("ascii"), Some(DocumentFormat::Ascii));
        assert_eq!(DocumentFormat::from_extension("json"), None);
    }
}
