use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};

/// Helper function to run qrbrand with arguments
fn run_qrbrand(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qrbrand"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to spawn qrbrand")
}

/// Helper function returning stdout of a successful run
fn export_stdout(args: &[&str]) -> Vec<u8> {
    let output = run_qrbrand(args);
    assert!(
        output.status.success(),
        "qrbrand failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output.stdout
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

/// Write a config keeping assets inside `dir`
fn write_config(dir: &Path, extra: &str) -> String {
    let storage = dir.join("storage");
    let path = dir.join("qrbrand.toml");
    fs::write(
        &path,
        format!("{}\n[assets]\ndir = '{}'\n", extra, storage.display()),
    )
    .unwrap();
    path.display().to_string()
}

fn write_logo(dir: &Path) -> String {
    let path = dir.join("logo.png");
    RgbaImage::from_pixel(64, 32, Rgba([20, 60, 200, 255]))
        .save(&path)
        .unwrap();
    path.display().to_string()
}

#[test]
fn test_png_to_stdout() {
    let bytes = export_stdout(&["export", "example.com", "--stdout"]);
    assert!(is_valid_png(&bytes), "Output is not a valid PNG");

    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (840, 840));
}

#[test]
fn test_svg_to_stdout() {
    let bytes = export_stdout(&[
        "export",
        "Hello there",
        "--type",
        "text",
        "--format",
        "svg",
        "--module-style",
        "dots",
        "--company",
        "Acme",
        "--stdout",
    ]);
    let svg = String::from_utf8(bytes).unwrap();
    assert!(svg.starts_with("<?xml"));
    assert!(svg.contains("viewBox=\"0 0 840 "));
    assert!(svg.contains(">Acme</text>"));
}

#[test]
fn test_eps_to_stdout() {
    let bytes = export_stdout(&["export", "+1 555 0100", "--type", "phone", "--format", "eps", "--stdout"]);
    let eps = String::from_utf8(bytes).unwrap();
    assert!(eps.starts_with("%!PS-Adobe-3.0 EPSF-3.0"));
}

#[test]
fn test_custom_size() {
    let bytes = export_stdout(&["export", "example.com", "--size", "400", "--layout", "sides", "--stdout"]);
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (400 + 600 + 80, 480));
}

#[test]
fn test_export_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let output = run_qrbrand(&[
        "export",
        "example.com",
        "--company",
        "Acme Corp",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let printed = String::from_utf8(output.stdout).unwrap();
    let path = Path::new(printed.trim());
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("acme_corp_qrcode_url_standard_"), "{}", name);
    assert!(name.ends_with(".png"));
    assert!(is_valid_png(&fs::read(path).unwrap()));
}

#[test]
fn test_logo_upload_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let logo = write_logo(dir.path());

    let bytes = export_stdout(&[
        "export",
        "example.com",
        "--config",
        &config,
        "--logo",
        &logo,
        "--logo-size",
        "30",
        "--stdout",
    ]);
    assert!(is_valid_png(&bytes));

    // stacked logo band above the symbol
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!(img.width(), 840);
    assert_eq!(img.height(), 20 + 120 + 800 + 20);

    let stored = fs::read_dir(dir.path().join("storage").join("logos")).unwrap().count();
    assert_eq!(stored, 1);
}

#[test]
fn test_raster_disabled_substitutes_svg() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[raster]\nenabled = false\n");

    let bytes = export_stdout(&["export", "example.com", "--config", &config, "--stdout"]);
    assert!(bytes.starts_with(b"<?xml"));
}

#[test]
fn test_pdf_without_assembler_returns_image() {
    let bytes = export_stdout(&["export", "example.com", "--format", "pdf", "--stdout"]);
    assert!(is_valid_png(&bytes));
}

#[test]
fn test_invalid_color_fails() {
    let output = run_qrbrand(&["export", "example.com", "--color", "#12345", "--stdout"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("border_color"), "{}", stderr);
}

#[test]
fn test_empty_content_fails() {
    let output = run_qrbrand(&["export", "   ", "--stdout"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_style_file() {
    let dir = tempfile::tempdir().unwrap();
    let style = dir.path().join("style.json");
    fs::write(
        &style,
        r##"{"border_color": "#ff0000", "layout": "sides", "company_text": "Acme"}"##,
    )
    .unwrap();

    let bytes = export_stdout(&[
        "export",
        "example.com",
        "--style",
        style.to_str().unwrap(),
        "--color",
        "blue",
        "--format",
        "svg",
        "--stdout",
    ]);
    let svg = String::from_utf8(bytes).unwrap();
    assert!(svg.contains("fill=\"#0000ff\""));
    assert!(svg.contains("width=\"1480\""));
}

#[test]
fn test_sweep_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let output = run_qrbrand(&["sweep", "--config", &config]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("removed 0"));
}
