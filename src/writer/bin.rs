//! Flat memory image: every byte in `[0, boundary)`, words big-endian.

use crate::model::ProgramImage;
use std::fs;
use std::io;
use std::path::Path;

pub fn emit(image: &ProgramImage, address_size: u32, path: &Path) -> io::Result<()> {
    fs::write(path, image.flatten(address_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_writes_flat_image() {
        let image = ProgramImage {
            words: vec![(0, 0xDEAD_BEEF)],
            bytes: vec![(4, 7)],
            boundary: 5,
            ..ProgramImage::default()
        };
        let path = std::env::temp_dir().join(format!("moonvm-bin-{}.bin", std::process::id()));
        emit(&image, 4, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF, 7]);
        let _ = fs::remove_file(&path);
    }
}
