use std::fs;
use std::path::PathBuf;
use std::process::Command;

use image::{ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object};
use swift_compress::page_geometry;

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_swift-compress"))
}

fn write_png(path: &std::path::Path) {
    let img = RgbImage::from_fn(90, 60, |x, y| Rgb([(x * 3) as u8, (y * 4) as u8, 50]));
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

fn write_pdf(path: &std::path::Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 500.into(), 700.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[test]
fn test_cli_fits_batch_of_images() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let first = dir.path().join("first.png");
    let second = dir.path().join("second.png");
    write_png(&first);
    write_png(&second);

    let status = Command::new(binary())
        .arg("image")
        .arg(&first)
        .arg(&second)
        .args(["--target-kb", "50"])
        .arg("--out-dir")
        .arg(&out)
        .status()
        .expect("Failed to run binary");
    assert!(status.success());

    for stem in ["first", "second"] {
        let output = out.join(format!("{}-swift-optimized-50kb.jpg", stem));
        let bytes = fs::read(&output).expect("missing output");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}

#[test]
fn test_cli_reports_unreadable_image() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.png");
    fs::write(&bogus, b"not really a png").unwrap();

    let status = Command::new(binary())
        .arg("image")
        .arg(&bogus)
        .status()
        .expect("Failed to run binary");
    assert!(!status.success());
}

#[test]
fn test_cli_scales_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(&input);

    let status = Command::new(binary())
        .arg("pdf")
        .arg(&input)
        .arg(&output)
        .args(["--scale", "0.5"])
        .status()
        .expect("Failed to run binary");
    assert!(status.success());

    let pages = page_geometry(&fs::read(&output).unwrap()).unwrap();
    assert_eq!(pages.len(), 1);
    assert!((pages[0].width - 250.0).abs() < 0.01);
    assert!((pages[0].height - 350.0).abs() < 0.01);
}

#[test]
fn test_cli_pdf_default_output_name() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    write_pdf(&input);

    let status = Command::new(binary())
        .arg("pdf")
        .arg(&input)
        .status()
        .expect("Failed to run binary");
    assert!(status.success());
    assert!(dir.path().join("compressed-document-75pct.pdf").exists());
}
