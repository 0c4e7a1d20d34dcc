use super::types::{FileError, FileType};
use std::path::Path;

pub fn reader_from_filetype(path: &Path) -> Result<FileType, FileError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tif" | "tiff") => Ok(FileType::GeoTiff),
        _ => Err(FileError::UnknownFileType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_types() {
        assert!(reader_from_filetype(Path::new("Rrs_443.tif")).is_ok());
        assert!(reader_from_filetype(Path::new("Rrs_443.tiff")).is_ok());
        assert!(reader_from_filetype(Path::new("Rrs_443.nc")).is_err());
        assert!(reader_from_filetype(Path::new("Rrs_443")).is_err());
    }
}
