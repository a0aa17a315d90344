use std::io::Read;
use std::path::{Path, PathBuf};

use image::DynamicImage;

/// A raw image input, before decoding.
///
/// Every variant may carry an identifier which ends up on the normalized image and
/// on any decoding error.
pub enum ImageSource {
    /// Encoded bytes, e.g. the body of an uploaded file.
    Bytes {
        /// Identifier of the input, usually the uploaded file name.
        name: Option<String>,
        /// The encoded image.
        data: Vec<u8>,
    },
    /// A file on disk. The file name is used as identifier.
    Path(PathBuf),
    /// A readable stream holding an encoded image.
    Reader {
        /// Identifier of the input.
        name: Option<String>,
        /// The stream to read the encoded image from.
        reader: Box<dyn Read + Send>,
    },
    /// An image that was already decoded by the caller.
    Decoded {
        /// Identifier of the input.
        name: Option<String>,
        /// The decoded image, in any color mode.
        image: DynamicImage,
    },
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Bytes { name, data } => f
                .debug_struct("Bytes")
                .field("name", name)
                .field("len", &data.len())
                .finish(),
            ImageSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageSource::Reader { name, .. } => {
                f.debug_struct("Reader").field("name", name).finish()
            }
            ImageSource::Decoded { name, image } => f
                .debug_struct("Decoded")
                .field("name", name)
                .field("width", &image.width())
                .field("height", &image.height())
                .finish(),
        }
    }
}

impl ImageSource {
    /// Encoded bytes with an identifier.
    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        ImageSource::Bytes {
            name: Some(name.into()),
            data: data.into(),
        }
    }

    /// Encoded bytes without an identifier.
    pub fn anonymous_bytes(data: impl Into<Vec<u8>>) -> Self {
        ImageSource::Bytes {
            name: None,
            data: data.into(),
        }
    }

    /// A file on disk.
    pub fn path(path: impl AsRef<Path>) -> Self {
        ImageSource::Path(path.as_ref().to_path_buf())
    }

    /// A readable stream.
    pub fn reader(name: Option<String>, reader: impl Read + Send + 'static) -> Self {
        ImageSource::Reader {
            name,
            reader: Box::new(reader),
        }
    }

    /// An already decoded image.
    pub fn decoded(name: Option<String>, image: DynamicImage) -> Self {
        ImageSource::Decoded { name, image }
    }

    /// The identifier of this input, if any.
    ///
    /// For [`ImageSource::Path`] this is the file name component of the path.
    pub fn name(&self) -> Option<String> {
        match self {
            ImageSource::Bytes { name, .. }
            | ImageSource::Reader { name, .. }
            | ImageSource::Decoded { name, .. } => name.clone(),
            ImageSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}
