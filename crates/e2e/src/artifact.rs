//! Screenshot artifact checks and baseline comparison

use image::{GenericImageView, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::spec::Viewport;

/// Per-channel difference tolerated before a pixel counts as changed
const TOLERANCE: i32 = 5;

/// What a successful run left on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub sha256: String,
    #[serde(default)]
    pub baseline: Option<BaselineDiff>,
}

/// Result of comparing a screenshot with its baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineDiff {
    pub baseline_path: PathBuf,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
}

/// Remove a screenshot and its diff image left over from an earlier run
pub fn clear_stale(path: &Path) -> E2eResult<()> {
    for stale in [path.to_path_buf(), diff_path(path)] {
        if stale.exists() {
            debug!("Removing stale artifact {}", stale.display());
            std::fs::remove_file(&stale)?;
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Check a full-page screenshot: it exists, decodes, and covers at least the viewport
pub fn inspect(path: &Path, viewport: Viewport) -> E2eResult<ArtifactRecord> {
    if !path.exists() {
        return Err(E2eError::Artifact(format!(
            "screenshot not found: {}",
            path.display()
        )));
    }

    let data = std::fs::read(path)?;
    let img = image::load_from_memory(&data)?;
    let (width, height) = img.dimensions();

    if width < viewport.width || height < viewport.height {
        return Err(E2eError::Artifact(format!(
            "{} is {}x{}, expected at least {}x{}",
            path.display(),
            width,
            height,
            viewport.width,
            viewport.height
        )));
    }

    Ok(ArtifactRecord {
        path: path.to_path_buf(),
        width,
        height,
        bytes: data.len() as u64,
        sha256: hash_bytes(&data),
        baseline: None,
    })
}

/// Diff `actual` against `baseline`
///
/// A diff image is written next to `actual` only when the difference exceeds
/// `threshold`.
pub fn compare(actual: &Path, baseline: &Path, threshold: f64) -> E2eResult<BaselineDiff> {
    let actual_img = image::open(actual)?;
    let baseline_img = image::open(baseline)?;

    let (width, height) = actual_img.dimensions();
    let total_pixels = (width as u64) * (height as u64);

    if std::fs::read(actual)? == std::fs::read(baseline)? {
        debug!("Screenshots match exactly");
        return Ok(BaselineDiff {
            baseline_path: baseline.to_path_buf(),
            matches: true,
            diff_percent: 0.0,
            diff_pixels: 0,
            total_pixels,
            diff_image_path: None,
        });
    }

    if actual_img.dimensions() != baseline_img.dimensions() {
        warn!(
            "Screenshot dimensions differ: actual {:?} vs baseline {:?}",
            actual_img.dimensions(),
            baseline_img.dimensions()
        );
    }

    let actual_rgba = actual_img.to_rgba8();
    let baseline_rgba = baseline_img.to_rgba8();
    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let actual_pixel = actual_rgba.get_pixel(x, y);
            let differs = if x < baseline_rgba.width() && y < baseline_rgba.height() {
                pixels_differ(actual_pixel, baseline_rgba.get_pixel(x, y))
            } else {
                // Outside the baseline counts as changed
                true
            };

            if differs {
                diff_pixels += 1;
                diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            } else {
                let gray = actual_pixel.to_luma().0[0] / 3;
                diff_img.put_pixel(x, y, image::Rgba([gray, gray, gray, 255]));
            }
        }
    }

    let diff_percent = if total_pixels > 0 {
        (diff_pixels as f64 / total_pixels as f64) * 100.0
    } else {
        0.0
    };
    let matches = diff_percent <= threshold;

    let diff_image_path = if !matches {
        let path = diff_path(actual);
        diff_img.save(&path)?;
        info!("Diff image saved to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(BaselineDiff {
        baseline_path: baseline.to_path_buf(),
        matches,
        diff_percent,
        diff_pixels,
        total_pixels,
        diff_image_path,
    })
}

fn diff_path(actual: &Path) -> PathBuf {
    let stem = actual
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "screenshot".to_string());
    actual.with_file_name(format!("{}.diff.png", stem))
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > TOLERANCE)
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
        let img = RgbaImage::from_pixel(width, height, image::Rgba(color));
        img.save(path).unwrap();
    }

    #[test]
    fn test_inspect_full_page_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        write_png(&path, 1280, 900, [255, 255, 255, 255]);

        let record = inspect(&path, Viewport::default()).unwrap();
        assert_eq!(record.width, 1280);
        assert_eq!(record.height, 900);
        assert_eq!(record.sha256.len(), 64);
        assert!(record.bytes > 0);
    }

    #[test]
    fn test_inspect_rejects_wrong_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrow.png");
        write_png(&path, 800, 720, [0, 0, 0, 255]);
        assert!(matches!(inspect(&path, Viewport::default()), Err(E2eError::Artifact(_))));
    }

    #[test]
    fn test_inspect_accepts_horizontal_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 1500, 720, [255, 255, 255, 255]);

        let record = inspect(&path, Viewport::default()).unwrap();
        assert_eq!(record.width, 1500);
    }

    #[test]
    fn test_inspect_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect(&dir.path().join("none.png"), Viewport::default()).unwrap_err();
        assert!(err.to_string().contains("screenshot not found"));
    }

    #[test]
    fn test_clear_stale_removes_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screenshots/old.png");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"old").unwrap();

        clear_stale(&path).unwrap();
        assert!(!path.exists());
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_clear_stale_removes_old_diff_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reservation-confirmed.png");
        let diff = dir.path().join("reservation-confirmed.diff.png");
        std::fs::write(&diff, b"old diff").unwrap();

        clear_stale(&path).unwrap();
        assert!(!diff.exists());
    }

    #[test]
    fn test_compare_within_threshold_writes_no_diff_image() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("baseline.png");
        let actual = dir.path().join("actual.png");
        write_png(&baseline, 100, 10, [10, 20, 30, 255]);

        let mut img = RgbaImage::from_pixel(100, 10, image::Rgba([10, 20, 30, 255]));
        img.put_pixel(0, 0, image::Rgba([200, 0, 0, 255]));
        img.save(&actual).unwrap();

        let diff = compare(&actual, &baseline, 0.5).unwrap();
        assert!(diff.matches);
        assert_eq!(diff.diff_pixels, 1);
        assert!(diff.diff_image_path.is_none());
        assert!(!dir.path().join("actual.diff.png").exists());

        let pngs = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(pngs, 2);
    }

    #[test]
    fn test_compare_identical_and_changed() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("baseline.png");
        let same = dir.path().join("same.png");
        write_png(&baseline, 10, 10, [10, 20, 30, 255]);
        write_png(&same, 10, 10, [12, 22, 32, 255]);

        let diff = compare(&same, &baseline, 0.5).unwrap();
        assert!(diff.matches);
        assert_eq!(diff.diff_pixels, 0);
        assert!(diff.diff_image_path.is_none());

        let changed = dir.path().join("changed.png");
        let mut img = RgbaImage::from_pixel(10, 10, image::Rgba([10, 20, 30, 255]));
        for x in 0..10 {
            img.put_pixel(x, 0, image::Rgba([200, 0, 0, 255]));
        }
        img.save(&changed).unwrap();

        let diff = compare(&changed, &baseline, 0.5).unwrap();
        assert!(!diff.matches);
        assert_eq!(diff.diff_pixels, 10);
        assert!((diff.diff_percent - 10.0).abs() < 1e-9);
        assert!(diff.diff_image_path.unwrap().exists());
    }
}
