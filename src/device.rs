// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Execution device selection for ONNX Runtime.
use std::fmt;
use std::str::FromStr;

/// Hardware device the network runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// CPU (always available).
    #[default]
    Cpu,
    /// CUDA for NVIDIA GPUs, with device index.
    Cuda(usize),
    /// `TensorRT` for NVIDIA GPUs, with device index.
    TensorRt(usize),
    /// `CoreML` on Apple platforms.
    CoreMl,
    /// `OpenVINO` for Intel hardware.
    OpenVino,
}

impl Device {
    /// Cargo feature that enables this device's execution provider, if any.
    #[must_use]
    pub const fn feature(&self) -> Option<&'static str> {
        match self {
            Self::Cpu => None,
            Self::Cuda(_) => Some("cuda"),
            Self::TensorRt(_) => Some("tensorrt"),
            Self::CoreMl => Some("coreml"),
            Self::OpenVino => Some("openvino"),
        }
    }

    /// Whether this build can register the device's execution provider.
    #[must_use]
    pub const fn is_compiled(&self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Cuda(_) => cfg!(feature = "cuda"),
            Self::TensorRt(_) => cfg!(feature = "tensorrt"),
            Self::CoreMl => cfg!(feature = "coreml"),
            Self::OpenVino => cfg!(feature = "openvino"),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::TensorRt(i) => write!(f, "tensorrt:{i}"),
            Self::CoreMl => write!(f, "coreml"),
            Self::OpenVino => write!(f, "openvino"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            "coreml" | "mps" => Ok(Self::CoreMl),
            "openvino" => Ok(Self::OpenVino),
            _ => {
                if let Some(rest) = s.strip_prefix("cuda") {
                    parse_device_index(rest).map(Self::Cuda)
                } else if let Some(rest) = s.strip_prefix("tensorrt") {
                    parse_device_index(rest).map(Self::TensorRt)
                } else if let Ok(index) = s.parse::<usize>() {
                    Ok(Self::Cuda(index))
                } else {
                    Err(format!("Unknown device: {s}"))
                }
            }
        }
    }
}

/// Parse a device index suffix such as `""`, `":0"` or `":1"`.
fn parse_device_index(s: &str) -> Result<usize, String> {
    if s.is_empty() {
        return Ok(0);
    }
    s.strip_prefix(':')
        .and_then(|index| index.parse::<usize>().ok())
        .ok_or_else(|| format!("Invalid device index: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("CUDA").unwrap(), Device::Cuda(0));
        assert_eq!(Device::from_str("cuda:1").unwrap(), Device::Cuda(1));
        assert_eq!(Device::from_str("0").unwrap(), Device::Cuda(0));
        assert_eq!(Device::from_str("tensorrt:2").unwrap(), Device::TensorRt(2));
        assert_eq!(Device::from_str("mps").unwrap(), Device::CoreMl);
        assert_eq!(Device::from_str("openvino").unwrap(), Device::OpenVino);
        assert!(Device::from_str("cuda:x").is_err());
        assert!(Device::from_str("tpu").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for device in [Device::Cpu, Device::Cuda(3), Device::TensorRt(0), Device::CoreMl, Device::OpenVino] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }

    #[test]
    fn test_cpu_always_compiled() {
        assert!(Device::Cpu.is_compiled());
        assert_eq!(Device::Cpu.feature(), None);
        assert_eq!(Device::Cuda(0).feature(), Some("cuda"));
    }
}
