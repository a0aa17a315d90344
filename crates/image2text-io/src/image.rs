use image::RgbImage;

use crate::error::IoError;

/// Image size in pixels
///
/// A struct to represent the size of an image in pixels.
///
/// # Examples
///
/// ```
/// use image2text_io::ImageSize;
///
/// let image_size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(image_size.width, 10);
/// assert_eq!(image_size.height, 20);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

impl ImageSize {
    /// Whether the size covers no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A successfully decoded, 3-channel RGB8 image.
///
/// The pixel data is stored interleaved with shape (H, W, 3). Instances are only
/// produced by the normalizer or by [`NormalizedImage::new`], both of which
/// validate the buffer length, so every value is a usable raster.
#[derive(Clone)]
pub struct NormalizedImage {
    image: RgbImage,
    name: Option<String>,
}

impl std::fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("size", &self.size())
            .field("name", &self.name)
            .finish()
    }
}

impl NormalizedImage {
    /// Create a new image from interleaved RGB8 pixel data.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `data` - The pixel data of the image, `width * height * 3` bytes.
    /// * `name` - An optional identifier of the image origin.
    ///
    /// # Errors
    ///
    /// If the length of the pixel data does not match the image size, or the size
    /// is empty, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use image2text_io::{ImageSize, NormalizedImage};
    ///
    /// let image = NormalizedImage::new(
    ///     ImageSize { width: 10, height: 20 },
    ///     vec![0u8; 10 * 20 * 3],
    ///     Some("blank.png".to_string()),
    /// ).unwrap();
    ///
    /// assert_eq!(image.width(), 10);
    /// assert_eq!(image.height(), 20);
    /// assert_eq!(image.num_channels(), 3);
    /// ```
    pub fn new(size: ImageSize, data: Vec<u8>, name: Option<String>) -> Result<Self, IoError> {
        let expected = size
            .width
            .checked_mul(size.height)
            .and_then(|n| n.checked_mul(3));
        let (Some(expected), Ok(width), Ok(height)) = (
            expected,
            u32::try_from(size.width),
            u32::try_from(size.height),
        ) else {
            return Err(IoError::ImageTooLarge(size));
        };
        if data.len() != expected {
            return Err(IoError::InvalidChannelShape(data.len(), expected));
        }

        let image = RgbImage::from_raw(width, height, data)
            .ok_or(IoError::InvalidChannelShape(expected, expected))?;

        Self::from_rgb8(image, name)
    }

    /// Wrap an already converted RGB8 buffer.
    pub fn from_rgb8(image: RgbImage, name: Option<String>) -> Result<Self, IoError> {
        let size = ImageSize {
            width: image.width() as usize,
            height: image.height() as usize,
        };
        if size.is_empty() {
            return Err(IoError::EmptyImage(size));
        }
        Ok(Self { image, name })
    }

    /// The size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width: self.image.width() as usize,
            height: self.image.height() as usize,
        }
    }

    /// The width of the image in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.image.width() as usize
    }

    /// The height of the image in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.image.height() as usize
    }

    /// Always 3.
    #[inline]
    pub fn num_channels(&self) -> usize {
        3
    }

    /// The interleaved pixel data.
    pub fn as_slice(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Borrow the underlying `image` buffer, e.g. for resizing in a backend.
    pub fn as_rgb8(&self) -> &RgbImage {
        &self.image
    }

    /// The identifier of the input this image was decoded from.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Read a single pixel as `[r, g, b]`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(self.image.get_pixel(x as u32, y as u32).0)
    }
}
