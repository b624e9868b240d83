use std::path::{Path, PathBuf};

/// `dir/name.ext` with `suffix` appended to the stem: `dir/name<suffix>.ext`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(
            with_suffix(Path::new("out/volume.json"), "_seed7"),
            PathBuf::from("out/volume_seed7.json")
        );
    }

    #[test]
    fn suffix_without_extension() {
        assert_eq!(
            with_suffix(Path::new("volume"), "_seed1"),
            PathBuf::from("volume_seed1")
        );
    }
}
