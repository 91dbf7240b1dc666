//! Blob object
//!
//! Blobs store file content. They carry only the raw bytes, never a name or a mode (those live
//! in trees and the index). Content is not assumed to be UTF-8.
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::index::entry_mode::FileMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

/// Number of leading bytes inspected when deciding whether content is binary
pub const BINARY_SNIFF_SIZE: usize = 8000;

#[derive(Debug, Clone, new)]
pub struct Blob {
    content: Bytes,
    /// Mode of the file the blob was read from, if any
    stat: FileMode,
}

impl Blob {
    pub fn from_bytes(content: impl Into<Bytes>) -> Self {
        Self::new(content.into(), FileMode::default())
    }

    pub fn mode(&self) -> &FileMode {
        &self.stat
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    pub fn is_binary(&self) -> bool {
        is_binary(&self.content)
    }
}

/// Content is binary when a NUL byte appears within the sniffed prefix
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().take(BINARY_SNIFF_SIZE).any(|&b| b == 0)
}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(frame(self.object_type(), &self.content))
    }
}

impl Unpackable for Blob {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        // the header has already been read
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;

        Ok(Self::from_bytes(content))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.content).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blob_ids_match_git() {
        let blob = Blob::from_bytes(&b"hello\n"[..]);

        assert_eq!(
            blob.object_id().unwrap().as_ref(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn nul_in_sniffed_prefix_marks_binary() {
        assert!(is_binary(b"abc\0def"));
        assert!(!is_binary(b"plain text\n"));

        let mut late_nul = vec![b'a'; BINARY_SNIFF_SIZE];
        late_nul.push(0);
        assert!(!is_binary(&late_nul));
    }
}
