//! Copy allow-listed model files into the app's assets directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use nirvana_assets_shared::{AssetsError, Result};

/// Copy every regular file directly inside `source` whose name ends in
/// `.<ext>` for one of `extensions` into `assets_dir`.
///
/// `assets_dir` is created first. Matching is case-sensitive and
/// subdirectories are not descended into. Returns the copied destinations
/// in name order.
#[instrument(skip_all, fields(source = %source.display(), assets = %assets_dir.display()))]
pub fn copy_model_assets(
    source: &Path,
    assets_dir: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(assets_dir).map_err(|e| AssetsError::io(assets_dir, e))?;

    let suffixes: Vec<String> = extensions.iter().map(|ext| format!(".{ext}")).collect();

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(source).map_err(|e| AssetsError::io(source, e))? {
        let path = entry.map_err(|e| AssetsError::io(source, e))?.path();
        if path.is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut copied = Vec::new();
    for path in candidates {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!(path = %path.display(), "skipping non-UTF-8 file name");
            continue;
        };
        if !suffixes.iter().any(|suffix| name.ends_with(suffix.as_str())) {
            debug!(file = name, "extension not allow-listed, skipping");
            continue;
        }

        let dest = assets_dir.join(name);
        std::fs::copy(&path, &dest).map_err(|e| AssetsError::io(&dest, e))?;
        info!(file = name, dest = %dest.display(), "copied model file");
        copied.push(dest);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nirvana-assets-{label}-{}", uuid::Uuid::now_v7()))
    }

    fn allow_list() -> Vec<String> {
        vec!["tflite".into(), "txt".into()]
    }

    #[test]
    fn copies_only_allow_listed_extensions() {
        let root = scratch_dir("copy");
        let source = root.join("cache");
        std::fs::create_dir_all(source.join("variables")).unwrap();
        std::fs::write(source.join("1.tflite"), b"TFL3").unwrap();
        std::fs::write(source.join("labels.txt"), "apple_pie\nbaby_back_ribs\n").unwrap();
        std::fs::write(source.join("saved_model.pb"), b"pb").unwrap();
        std::fs::write(source.join("NOTES.TXT"), "upper-case").unwrap();
        std::fs::write(source.join("variables/inner.txt"), "nested").unwrap();

        let assets = root.join("app/src/main/assets");
        let copied = copy_model_assets(&source, &assets, &allow_list()).unwrap();

        assert_eq!(copied, vec![assets.join("1.tflite"), assets.join("labels.txt")]);
        assert_eq!(std::fs::read(assets.join("1.tflite")).unwrap(), b"TFL3");
        assert!(!assets.join("saved_model.pb").exists());
        assert!(!assets.join("NOTES.TXT").exists());
        assert!(!assets.join("inner.txt").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn creates_missing_assets_dir_even_with_nothing_to_copy() {
        let root = scratch_dir("empty");
        let source = root.join("cache");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("model.onnx"), b"onnx").unwrap();

        let assets = root.join("assets");
        let copied = copy_model_assets(&source, &assets, &allow_list()).unwrap();

        assert!(copied.is_empty());
        assert!(assets.is_dir());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_source_is_io_error() {
        let root = scratch_dir("missing");
        let err = copy_model_assets(&root.join("nope"), &root.join("assets"), &allow_list())
            .unwrap_err();
        assert!(matches!(err, AssetsError::Io { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }
}
