//! JSON output: the program image (loadable again by `run`) and run traces.

use crate::machine::Mutation;
use crate::model::ProgramImage;
use std::fs;
use std::io;
use std::path::Path;

pub fn emit_image(image: &ProgramImage, path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(image).map_err(io::Error::other)?;
    fs::write(path, json)
}

pub fn load_image(json: &str) -> serde_json::Result<ProgramImage> {
    serde_json::from_str(json)
}

pub fn emit_trace(history: &[Mutation], path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(history).map_err(io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolTable;

    #[test]
    fn test_image_json_shape() {
        let mut symbols = SymbolTable::new();
        symbols.insert("main", 0).unwrap();
        let image = ProgramImage {
            entry: Some(0),
            words: vec![(0, 42)],
            bytes: vec![],
            symbols,
            boundary: 4,
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["symbols"]["main"], 0);
        assert_eq!(json["words"][0][1], 42);

        let back = load_image(&json.to_string()).unwrap();
        assert_eq!(back, image);
    }
}
