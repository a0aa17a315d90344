use std::{io::Read, path::Path};

use image::{DynamicImage, RgbImage};

use crate::{
    error::{InvalidImage, IoError},
    image::NormalizedImage,
    source::ImageSource,
};

/// Decodes any supported image into a [`NormalizedImage`].
///
/// The format is detected from the content. Whatever the source color mode is
/// (grayscale, palette, RGBA, 16 bit), the result is 8-bit RGB. An alpha channel is
/// dropped, it is not composited over a background.
///
/// # Arguments
///
/// * `source` - The raw input.
///
/// # Returns
///
/// The normalized image, carrying the identifier of the source.
///
/// # Errors
///
/// Fails with [`InvalidImage`] holding the source identifier when the input cannot
/// be read or decoded.
///
/// # Example
///
/// ```
/// use image2text_io::{normalize, ImageSource};
///
/// let res = normalize(ImageSource::bytes("broken.png", vec![0u8, 1, 2, 3]));
/// assert_eq!(res.unwrap_err().name.as_deref(), Some("broken.png"));
/// ```
pub fn normalize(source: ImageSource) -> Result<NormalizedImage, InvalidImage> {
    let name = source.name();

    let decoded = match source {
        ImageSource::Bytes { data, .. } => decode_rgb8(&data),
        ImageSource::Path(path) => read_rgb8(&path),
        ImageSource::Reader { mut reader, .. } => {
            let mut data = Vec::new();
            match reader.read_to_end(&mut data) {
                Ok(_) => decode_rgb8(&data),
                Err(e) => Err(IoError::FileError(e)),
            }
        }
        ImageSource::Decoded { image, .. } => Ok(to_rgb8(image)),
    };

    decoded
        .and_then(|rgb| NormalizedImage::from_rgb8(rgb, name.clone()))
        .map_err(|e| {
            log::debug!("rejecting image {name:?}: {e}");
            InvalidImage::new(name, e)
        })
}

/// Decodes an encoded image held in memory into an RGB8 buffer.
///
/// # Arguments
///
/// * `data` - The encoded image (PNG, JPEG, WebP, GIF, BMP, TIFF).
pub fn decode_rgb8(data: &[u8]) -> Result<RgbImage, IoError> {
    let img = image::load_from_memory(data)?;
    Ok(to_rgb8(img))
}

/// Reads an image file from disk into an RGB8 buffer.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
pub fn read_rgb8(file_path: impl AsRef<Path>) -> Result<RgbImage, IoError> {
    let file_path = file_path.as_ref();

    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let mut data = Vec::new();
    std::fs::File::open(file_path)?.read_to_end(&mut data)?;

    decode_rgb8(&data)
}

// NOTE: the image crate drops the alpha channel in the Rgba -> Rgb conversion and
// expands luma to the three channels.
fn to_rgb8(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.into_rgb8(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    use super::{decode_rgb8, normalize, read_rgb8};
    use crate::{error::IoError, source::ImageSource};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).expect("encode test image");
        buf.into_inner()
    }

    #[test]
    fn decode_png_rgb() -> Result<(), IoError> {
        let img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let rgb = decode_rgb8(&data)?;
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(3, 2).0, [10, 20, 30]);
        Ok(())
    }

    #[test]
    fn grayscale_is_expanded() -> Result<(), IoError> {
        let img = GrayImage::from_pixel(2, 2, Luma([77]));
        let data = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);
        let rgb = decode_rgb8(&data)?;
        assert_eq!(rgb.get_pixel(0, 0).0, [77, 77, 77]);
        Ok(())
    }

    #[test]
    fn alpha_is_dropped_not_blended() -> Result<(), IoError> {
        let img = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 50, 0]));
        let data = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let rgb = decode_rgb8(&data)?;
        assert_eq!(rgb.get_pixel(1, 1).0, [200, 100, 50]);
        Ok(())
    }

    #[test]
    fn format_detected_from_content() {
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 128, 255]));
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let res = normalize(ImageSource::bytes("actually_a_jpeg.png", data));
        let image = res.expect("jpeg should decode");
        assert_eq!(image.width(), 8);
        assert_eq!(image.name(), Some("actually_a_jpeg.png"));
    }

    #[test]
    fn corrupted_bytes_keep_the_identifier() {
        let err = normalize(ImageSource::bytes("corrupt.jpg", b"not an image".to_vec()))
            .expect_err("garbage must not decode");
        assert_eq!(err.name.as_deref(), Some("corrupt.jpg"));
        assert!(matches!(err.source, IoError::ImageDecodeError(_)));
        assert_eq!(err.to_string(), "Unsupported image: corrupt.jpg");
    }

    #[test]
    fn missing_file() {
        let res = read_rgb8("/definitely/not/here.png");
        assert!(matches!(res, Err(IoError::FileDoesNotExist(_))));

        let err = normalize(ImageSource::path("/definitely/not/here.png")).unwrap_err();
        assert_eq!(err.name.as_deref(), Some("here.png"));
    }

    #[test]
    fn normalize_from_reader() {
        let img = RgbImage::from_pixel(3, 5, Rgb([1, 2, 3]));
        let data = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let image = normalize(ImageSource::reader(None, Cursor::new(data))).unwrap();
        assert_eq!((image.width(), image.height()), (3, 5));
        assert_eq!(image.name(), None);
    }

    #[test]
    fn normalize_decoded_rgba() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([9, 8, 7, 128]));
        let image = normalize(ImageSource::decoded(
            Some("mem".into()),
            DynamicImage::ImageRgba8(img),
        ))
        .unwrap();
        assert_eq!(image.pixel(0, 0), Some([9, 8, 7]));
    }
}
