use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::{ExtractError, Result};

pub const DOCUMENT_PART: &str = "word/document.xml";

/// An opened `.docx` package with every entry held in memory.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        Self::from_reader(f)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = zip::ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Raw bytes of `word/document.xml`. Every call hands out the same buffer, so the
    /// table pass and the checkbox pass can each parse it independently.
    pub fn document_xml(&self) -> Result<&[u8]> {
        self.part(DOCUMENT_PART)
            .ok_or_else(|| ExtractError::MissingPart(DOCUMENT_PART.to_string()))
    }
}
