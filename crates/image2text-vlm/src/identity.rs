use std::{fmt, str::FromStr};

use crate::error::VlmError;

/// An opaque model identifier, e.g. a Hugging Face repository id.
///
/// Any string is accepted here; only loading the backend tells whether it names a
/// usable model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(String);

impl ModelId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A forced compute device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceSelector {
    /// General purpose compute.
    Cpu,
    /// A CUDA device by ordinal.
    Cuda(usize),
    /// A Metal device by ordinal.
    Metal(usize),
}

impl DeviceSelector {
    /// Parse a device preference where `auto` (or an empty string) means no forced device.
    ///
    /// # Example
    ///
    /// ```
    /// use image2text_vlm::DeviceSelector;
    ///
    /// assert_eq!(DeviceSelector::parse_preference("auto").unwrap(), None);
    /// assert_eq!(DeviceSelector::parse_preference("cuda:1").unwrap(), Some(DeviceSelector::Cuda(1)));
    /// ```
    pub fn parse_preference(s: &str) -> Result<Option<Self>, VlmError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

fn parse_ordinal(s: &str, raw: &str) -> Result<usize, VlmError> {
    s.parse()
        .map_err(|_| VlmError::InvalidDevice(raw.to_string()))
}

impl FromStr for DeviceSelector {
    type Err = VlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "cpu" => Ok(DeviceSelector::Cpu),
            "cuda" | "gpu" => Ok(DeviceSelector::Cuda(0)),
            "metal" | "mps" => Ok(DeviceSelector::Metal(0)),
            other => {
                if let Some(ordinal) = other.strip_prefix("cuda:") {
                    Ok(DeviceSelector::Cuda(parse_ordinal(ordinal, s)?))
                } else if let Some(ordinal) = other.strip_prefix("metal:") {
                    Ok(DeviceSelector::Metal(parse_ordinal(ordinal, s)?))
                } else if let Ok(ordinal) = other.parse::<usize>() {
                    Ok(DeviceSelector::Cuda(ordinal))
                } else {
                    Err(VlmError::InvalidDevice(s.to_string()))
                }
            }
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Cpu => write!(f, "cpu"),
            DeviceSelector::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            DeviceSelector::Metal(ordinal) => write!(f, "metal:{ordinal}"),
        }
    }
}

/// Numeric precision of the model weights and activations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Precision {
    /// 32-bit float.
    F32,
    /// 16-bit float.
    F16,
    /// 16-bit brain float.
    BF16,
}

impl FromStr for Precision {
    type Err = VlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f32" | "float32" | "fp32" => Ok(Precision::F32),
            "f16" | "float16" | "fp16" | "half" => Ok(Precision::F16),
            "bf16" | "bfloat16" => Ok(Precision::BF16),
            _ => Err(VlmError::InvalidPrecision(s.to_string())),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
            Precision::BF16 => "bf16",
        };
        f.write_str(s)
    }
}

/// Which loaded model serves a request.
///
/// Immutable: a different model, device or precision is a different identity and
/// needs a different backend instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendIdentity {
    model: ModelId,
    device: Option<DeviceSelector>,
    precision: Option<Precision>,
}

impl BackendIdentity {
    /// The given model, letting the backend choose device and precision.
    pub fn new(model: impl Into<ModelId>) -> Self {
        Self {
            model: model.into(),
            device: None,
            precision: None,
        }
    }

    /// Pin the identity to a device (`None` lets the backend choose).
    pub fn with_device(mut self, device: Option<DeviceSelector>) -> Self {
        self.device = device;
        self
    }

    /// Force a precision (`None` lets the backend choose).
    pub fn with_precision(mut self, precision: Option<Precision>) -> Self {
        self.precision = precision;
        self
    }

    /// The model identifier.
    pub fn model(&self) -> &ModelId {
        &self.model
    }

    /// The forced device, if any.
    pub fn device(&self) -> Option<DeviceSelector> {
        self.device
    }

    /// The forced precision, if any.
    pub fn precision(&self) -> Option<Precision> {
        self.precision
    }
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.model)?;
        if let Some(device) = self.device {
            write!(f, " on {device}")?;
        }
        if let Some(precision) = self.precision {
            write!(f, " as {precision}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{BackendIdentity, DeviceSelector, Precision};
    use crate::error::VlmError;

    #[test]
    fn parse_device() -> Result<(), VlmError> {
        assert_eq!("cpu".parse::<DeviceSelector>()?, DeviceSelector::Cpu);
        assert_eq!("CUDA".parse::<DeviceSelector>()?, DeviceSelector::Cuda(0));
        assert_eq!("cuda:2".parse::<DeviceSelector>()?, DeviceSelector::Cuda(2));
        assert_eq!("1".parse::<DeviceSelector>()?, DeviceSelector::Cuda(1));
        assert_eq!("metal".parse::<DeviceSelector>()?, DeviceSelector::Metal(0));
        assert!("tpu".parse::<DeviceSelector>().is_err());
        assert!("cuda:x".parse::<DeviceSelector>().is_err());
        assert_eq!(DeviceSelector::parse_preference(" Auto ")?, None);
        Ok(())
    }

    #[test]
    fn parse_precision() -> Result<(), VlmError> {
        assert_eq!("bfloat16".parse::<Precision>()?, Precision::BF16);
        assert_eq!("float16".parse::<Precision>()?, Precision::F16);
        assert_eq!("F32".parse::<Precision>()?, Precision::F32);
        assert!("int4".parse::<Precision>().is_err());
        Ok(())
    }

    #[test]
    fn identities_are_distinct_keys() {
        let base = BackendIdentity::new("google/paligemma-3b-mix-224");
        let on_cpu = base.clone().with_device(Some(DeviceSelector::Cpu));
        let half = base.clone().with_precision(Some(Precision::F16));

        let keys: HashSet<_> = [base.clone(), on_cpu.clone(), half, base.clone()]
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(on_cpu.to_string(), "google/paligemma-3b-mix-224 on cpu");
        assert_eq!(base.device(), None);
    }
}
