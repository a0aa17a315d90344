use crate::image::ImageSize;

/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Error to open or read the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to decode the image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// The decoded image has no pixels.
    #[error("Image has no pixels: {0}")]
    EmptyImage(ImageSize),

    /// The image size overflows the pixel buffer or the raster dimensions.
    #[error("Image is too large: {0}")]
    ImageTooLarge(ImageSize),

    /// Error when the pixel buffer and the image size disagree.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),
}

/// An input that could not be turned into an RGB image.
///
/// Carries the identifier of the input (usually the uploaded file name) so that
/// callers can report which item of a batch was rejected.
#[derive(thiserror::Error, Debug)]
#[error("Unsupported image: {}", .name.as_deref().unwrap_or("<unnamed>"))]
pub struct InvalidImage {
    /// Identifier of the rejected input, if it had one.
    pub name: Option<String>,
    /// The underlying decoding failure.
    #[source]
    pub source: IoError,
}

impl InvalidImage {
    /// Attach an identifier to a decoding failure.
    pub fn new(name: Option<String>, source: IoError) -> Self {
        Self { name, source }
    }
}
