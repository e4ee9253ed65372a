use blockpick::{BlockDetector, CameraIntrinsics, SessionConfig};
use image::ImageReader;
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image.png> [session.json] [out.json]", args[0]);
        std::process::exit(2);
    }

    let image = ImageReader::open(&args[1])?.decode()?.to_rgb8();
    let (w, h) = image.dimensions();

    let detector = match args.get(2) {
        Some(path) => SessionConfig::from_json_file(Path::new(path))?.build_detector()?,
        // Example focal length; replace with the camera's calibrated value.
        None => BlockDetector::default().with_intrinsics(CameraIntrinsics::centered(600.0, w, h)),
    };
    let result = detector.detect(&image);

    println!(
        "Detected {} blocks (calibrated: {}).",
        result.blocks.len(),
        result.calibrated
    );
    for b in &result.blocks {
        println!(
            "  {:<7} center=({:.1}, {:.1}) long={:.1}px distance={:.2}",
            b.color, b.center[0], b.center[1], b.long_side, b.distance
        );
    }

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&result.targets())?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
