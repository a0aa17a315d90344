use std::{collections::HashSet, path::PathBuf};

use candle_core::{DType, Device, Tensor};
use hf_hub::api::sync::ApiRepo;
use image::{imageops, imageops::FilterType, RgbImage};

use crate::{
    error::VlmError,
    identity::{DeviceSelector, Precision},
};

/// Resolve the weight files of a repository, sharded or not.
pub fn hub_load_safetensors(repo: &ApiRepo) -> Result<Vec<PathBuf>, VlmError> {
    let index_file = match repo.get("model.safetensors.index.json") {
        Ok(file) => file,
        // single file checkpoints have no index
        Err(e) => {
            log::debug!("no weight index ({e}), falling back to model.safetensors");
            return Ok(vec![repo.get("model.safetensors")?]);
        }
    };

    let json: serde_json::Value = serde_json::from_reader(std::fs::File::open(&index_file)?)
        .map_err(|e| VlmError::InvalidWeightIndex(e.to_string()))?;
    let weight_map = json
        .get("weight_map")
        .and_then(|map| map.as_object())
        .ok_or_else(|| {
            VlmError::InvalidWeightIndex(format!("no weight map in {}", index_file.display()))
        })?;

    let safetensors_files = weight_map
        .values()
        .filter_map(|value| value.as_str())
        .map(str::to_owned)
        .collect::<HashSet<_>>();

    safetensors_files
        .iter()
        .map(|file| repo.get(file).map_err(VlmError::from))
        .collect()
}

/// Open the requested device, or the best available one.
pub fn select_device(selector: Option<DeviceSelector>) -> Result<Device, VlmError> {
    let unavailable = |device: DeviceSelector, e: candle_core::Error| VlmError::DeviceUnavailable {
        device: device.to_string(),
        reason: e.to_string(),
    };

    match selector {
        Some(DeviceSelector::Cpu) => Ok(Device::Cpu),
        Some(device @ DeviceSelector::Cuda(ordinal)) => {
            Device::new_cuda(ordinal).map_err(|e| unavailable(device, e))
        }
        Some(device @ DeviceSelector::Metal(ordinal)) => {
            Device::new_metal(ordinal).map_err(|e| unavailable(device, e))
        }
        None => {
            if candle_core::utils::cuda_is_available() {
                match Device::new_cuda(0) {
                    Ok(device) => return Ok(device),
                    Err(e) => log::warn!("CUDA not available, defaulting to CPU: {e}"),
                }
            } else if candle_core::utils::metal_is_available() {
                match Device::new_metal(0) {
                    Ok(device) => return Ok(device),
                    Err(e) => log::warn!("Metal not available, defaulting to CPU: {e}"),
                }
            }
            Ok(Device::Cpu)
        }
    }
}

/// The forced precision, or BF16 on accelerators and F32 on the CPU.
pub fn select_dtype(precision: Option<Precision>, device: &Device) -> DType {
    match precision {
        Some(Precision::F32) => DType::F32,
        Some(Precision::F16) => DType::F16,
        Some(Precision::BF16) => DType::BF16,
        None if device.is_cpu() => DType::F32,
        None => DType::BF16,
    }
}

/// Fit one or more images into a single `size` x `size` input.
///
/// Several images are resized to square tiles, placed left to right in input order
/// and the strip is resized back to the model input size.
pub fn compose_input_image(images: &[&RgbImage], size: u32) -> RgbImage {
    if let [single] = images {
        return imageops::resize(*single, size, size, FilterType::Triangle);
    }

    let mut canvas = RgbImage::new(size * images.len() as u32, size);
    for (i, img) in images.iter().enumerate() {
        let tile = imageops::resize(*img, size, size, FilterType::Triangle);
        imageops::replace(&mut canvas, &tile, i as i64 * size as i64, 0);
    }
    imageops::resize(&canvas, size, size, FilterType::Triangle)
}

/// Convert an RGB8 image to a `[1, 3, H, W]` tensor scaled to `[-1, 1]`.
pub fn image_to_tensor(
    image: &RgbImage,
    device: &Device,
    dtype: DType,
) -> Result<Tensor, VlmError> {
    let (width, height) = image.dimensions();
    let image_t = Tensor::from_raw_buffer(
        image.as_raw(),
        DType::U8,
        &[height as usize, width as usize, 3],
        device,
    )?
    .to_dtype(dtype)?
    .permute((2, 0, 1))?
    .affine(2. / 255., -1.)?
    .unsqueeze(0)?;
    Ok(image_t)
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use image::{Rgb, RgbImage};

    use super::{compose_input_image, image_to_tensor, select_device, select_dtype};
    use crate::{
        error::VlmError,
        identity::{DeviceSelector, Precision},
    };

    #[test]
    fn single_image_is_resized() {
        let img = RgbImage::from_pixel(40, 10, Rgb([5, 6, 7]));
        let out = compose_input_image(&[&img], 16);
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.get_pixel(8, 8).0, [5, 6, 7]);
    }

    #[test]
    fn images_are_tiled_left_to_right() {
        let red = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
        let blue = RgbImage::from_pixel(8, 8, Rgb([0, 0, 255]));
        let out = compose_input_image(&[&red, &blue], 32);
        assert_eq!(out.dimensions(), (32, 32));
        assert_eq!(out.get_pixel(2, 16).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(29, 16).0, [0, 0, 255]);
    }

    #[test]
    fn tensor_is_scaled() -> Result<(), VlmError> {
        let img = RgbImage::from_pixel(4, 2, Rgb([255, 0, 255]));
        let t = image_to_tensor(&img, &Device::Cpu, DType::F32)?;
        assert_eq!(t.dims(), &[1, 3, 2, 4]);
        let values = t.flatten_all()?.to_vec1::<f32>()?;
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!((values[8] + 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn cpu_defaults_to_f32() -> Result<(), VlmError> {
        let device = select_device(Some(DeviceSelector::Cpu))?;
        assert!(device.is_cpu());
        assert_eq!(select_dtype(None, &device), DType::F32);
        assert_eq!(select_dtype(Some(Precision::BF16), &device), DType::BF16);
        Ok(())
    }
}
