// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

use crate::device::Device;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(name = "simplepose", author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r"Examples:
    simplepose predict --model simplepose_resnet18_coco.onnx --source person.jpg
    simplepose predict -m simplepose_resnet50b_coco.onnx -s people/ --batch 4 --save
    simplepose predict -m model.onnx -s 'people/*.png' --imgsz 384,288 --conf 0.3
    simplepose predict -m model.onnx -s person.jpg --heatmap
    simplepose predict -m model.onnx -s person.jpg --device cuda:0 --half")]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate keypoints on an image, directory, or glob of images
    Predict(PredictArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredictArgs {
    /// Path to ONNX model file
    #[arg(short, long)]
    pub model: String,

    /// Input source (image, directory, or glob)
    #[arg(short, long)]
    pub source: String,

    /// Network input size as H or H,W (defaults to model metadata)
    #[arg(long, value_parser = parse_imgsz)]
    pub imgsz: Option<(usize, usize)>,

    /// Expected number of keypoints (defaults to model metadata)
    #[arg(long)]
    pub keypoints: Option<usize>,

    /// Return raw heatmaps instead of decoded keypoints
    #[arg(long, default_value_t = false)]
    pub heatmap: bool,

    /// Keypoint score threshold for summaries and annotations
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// Batch size for inference
    #[arg(long, default_value_t = 1)]
    pub batch: usize,

    /// Feed the network FP16 input
    #[arg(long, default_value_t = false)]
    pub half: bool,

    /// Device to use (cpu, cuda:0, tensorrt:0, coreml, openvino)
    #[arg(long)]
    pub device: Option<Device>,

    /// Save annotated images to runs/pose/predict
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Parse `256` or `256,192` into (height, width).
fn parse_imgsz(s: &str) -> Result<(usize, usize), String> {
    let parts: Vec<&str> = s.split([',', 'x']).map(str::trim).collect();
    let parse = |v: &str| {
        v.parse::<usize>()
            .map_err(|_| format!("invalid image size '{s}', expected H or H,W"))
    };
    match parts.as_slice() {
        [size] => parse(size).map(|n| (n, n)),
        [h, w] => Ok((parse(h)?, parse(w)?)),
        _ => Err(format!("invalid image size '{s}', expected H or H,W")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_args_defaults() {
        let args = Cli::parse_from(["simplepose", "predict", "--model", "pose.onnx", "--source", "a.jpg"]);
        let Commands::Predict(predict_args) = args.command;
        assert_eq!(predict_args.model, "pose.onnx");
        assert_eq!(predict_args.source, "a.jpg");
        assert!((predict_args.conf - 0.25).abs() < f32::EPSILON);
        assert_eq!(predict_args.batch, 1);
        assert!(predict_args.imgsz.is_none());
        assert!(!predict_args.heatmap);
        assert!(!predict_args.half);
        assert!(predict_args.verbose);
        assert!(predict_args.device.is_none());
    }

    #[test]
    fn test_predict_args_custom() {
        let args = Cli::parse_from([
            "simplepose",
            "predict",
            "-m",
            "custom.onnx",
            "-s",
            "people/",
            "--imgsz",
            "384,288",
            "--keypoints",
            "21",
            "--heatmap",
            "--device",
            "cuda:1",
            "--verbose",
            "false",
        ]);
        let Commands::Predict(predict_args) = args.command;
        assert_eq!(predict_args.imgsz, Some((384, 288)));
        assert_eq!(predict_args.keypoints, Some(21));
        assert!(predict_args.heatmap);
        assert_eq!(predict_args.device, Some(Device::Cuda(1)));
        assert!(!predict_args.verbose);
    }

    #[test]
    fn test_parse_imgsz() {
        assert_eq!(parse_imgsz("256"), Ok((256, 256)));
        assert_eq!(parse_imgsz("256, 192"), Ok((256, 192)));
        assert_eq!(parse_imgsz("256x192"), Ok((256, 192)));
        assert!(parse_imgsz("a,b").is_err());
        assert!(parse_imgsz("1,2,3").is_err());
    }
}
