use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Directory for uploaded and processed videos (defaults to the OS temp dir)
    #[arg(long, env = "PARKWATCH_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Detection model file
    #[arg(long = "model", env = "PARKWATCH_MODEL", default_value = "models/best.onnx")]
    pub model_path: PathBuf,

    /// Parking slot layout (JSON list of slot polygons)
    #[arg(long = "layout", env = "PARKWATCH_LAYOUT", default_value = "output.json")]
    pub layout_path: PathBuf,

    /// Minimum detection confidence
    #[arg(long, default_value_t = 0.25)]
    pub min_conf: f32,

    /// Only count detections of these classes (comma separated, empty = all)
    #[arg(long, value_delimiter = ',')]
    pub classes: Vec<String>,

    /// Labels of the model outputs in order (comma separated, empty = COCO-80)
    #[arg(long, env = "PARKWATCH_CLASS_NAMES", value_delimiter = ',')]
    pub class_names: Vec<String>,

    /// FourCC of the output codec
    #[arg(long, default_value = "mp4v")]
    pub fourcc: String,

    /// Maximum accepted upload size in megabytes
    #[arg(long, default_value_t = 1024)]
    pub max_upload_mb: usize,

    /// Fail instead of returning zero stats when no frame can be decoded
    #[arg(long)]
    pub reject_empty_input: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn resolved_upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["parkwatch"]).unwrap();
        assert_eq!(args.port, 5000);
        assert_eq!(args.fourcc, "mp4v");
        assert!(args.classes.is_empty());
        assert!(!args.reject_empty_input);
    }

    #[test]
    fn test_classes_are_comma_separated() {
        let args = Args::try_parse_from(["parkwatch", "--classes", "car,truck"]).unwrap();
        assert_eq!(args.classes, vec!["car".to_string(), "truck".to_string()]);
    }

    #[test]
    fn test_custom_class_names() {
        let args = Args::try_parse_from([
            "parkwatch",
            "--class-names",
            "space-empty,space-occupied",
            "--classes",
            "space-occupied",
        ])
        .unwrap();
        assert_eq!(args.class_names, vec!["space-empty", "space-occupied"]);
        assert_eq!(args.classes, vec!["space-occupied"]);
    }
}
