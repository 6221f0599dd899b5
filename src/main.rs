use anyhow::Error;
use image::{Rgb, RgbImage};

use deepfake_detector::{Classifier, Settings, Verdict, logging};

const SYNTHETIC_SIZE: u32 = 224;
const SYNTHETIC_COLOR: [u8; 3] = [100, 150, 200];

fn main() {
    logging::init();

    let settings = Settings::default();
    println!("Loading model: {}", settings.source);
    let classifier = match Classifier::load(&settings) {
        Ok(classifier) => classifier,
        Err(e) => return report(Error::new(e)),
    };

    println!("Creating test image...");
    let image = RgbImage::from_pixel(SYNTHETIC_SIZE, SYNTHETIC_SIZE, Rgb(SYNTHETIC_COLOR));
    println!("\nTesting with synthetic image (should show low real score)...");

    match classifier.classify(image) {
        Ok(prediction) => {
            println!("Result: {prediction}");
            println!("{}", Verdict::from_prediction(&prediction));

            println!("\n{}", "=".repeat(60));
            println!("MODEL IS WORKING!");
            println!("{}", "=".repeat(60));
        }
        Err(e) => {
            log::error!("{} failure", e.kind().as_str());
            report(Error::new(e));
        }
    }
}

/// Prints the error, then its full cause chain (and backtrace, if captured).
fn report(err: Error) {
    println!("Error: {err}");
    eprintln!("{err:?}");
}
