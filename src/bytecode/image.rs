use crate::bytecode::compile_error::CompileError;
use crate::bytecode::word::WORD_BYTES;

// =============================================================================
// CODE IMAGE - growable, word-addressed output buffer
// =============================================================================

/// Byte address of the running-size header word.
#[allow(dead_code)]
pub const SIZE_SLOT: u32 = 0;
/// Byte address of the most-recent-dictionary-header word (0 = none).
pub const DICT_HEAD_SLOT: u32 = 4;
/// Byte address of the `__main` entry-point word (0 until created).
pub const ENTRY_SLOT: u32 = 8;

/// The compiled image. All mutation funnels through [`CodeImage::emit`]
/// (append at the cursor) and [`CodeImage::patch`] (overwrite in place);
/// patches never extend the image or move the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeImage {
    words: Vec<u32>,
}

impl CodeImage {
    /// A fresh image holding only the three header slots. The size slot
    /// already accounts for them.
    pub fn new() -> Self {
        let mut image = CodeImage { words: vec![0; 3] };
        image.words[0] = image.here();
        image
    }

    /// Current append cursor, as a byte address.
    pub fn here(&self) -> u32 {
        self.words.len() as u32 * WORD_BYTES
    }

    /// Append one word at the cursor and return its address. Keeps the size
    /// slot equal to the image length in bytes.
    pub fn emit(&mut self, word: u32) -> u32 {
        let address = self.here();
        self.words.push(word);
        self.words[0] = self.here();
        address
    }

    /// Overwrite an already-allocated word in place.
    pub fn patch(&mut self, address: u32, word: u32) -> Result<(), CompileError> {
        if address % WORD_BYTES != 0 {
            return Err(CompileError::range(format!(
                "patch address {:#x} is not word aligned",
                address
            )));
        }
        if address >= self.here() {
            return Err(CompileError::range(format!(
                "patch address {:#x} is beyond the image cursor {:#x}",
                address,
                self.here()
            )));
        }
        self.words[(address / WORD_BYTES) as usize] = word;
        Ok(())
    }

    /// Read one word. `None` for unaligned or unallocated addresses.
    pub fn fetch(&self, address: u32) -> Option<u32> {
        if address % WORD_BYTES != 0 {
            return None;
        }
        self.words.get((address / WORD_BYTES) as usize).copied()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Serialize the image for the target loader. Little-endian throughout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * WORD_BYTES as usize);
        for word in &self.words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}

impl Default for CodeImage {
    fn default() -> Self {
        CodeImage::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_has_three_header_slots() {
        let image = CodeImage::new();
        assert_eq!(image.here(), 12);
        assert_eq!(image.fetch(SIZE_SLOT), Some(12));
        assert_eq!(image.fetch(DICT_HEAD_SLOT), Some(0));
        assert_eq!(image.fetch(ENTRY_SLOT), Some(0));
    }

    #[test]
    fn test_emit_advances_cursor_and_size_slot() {
        let mut image = CodeImage::new();
        let a = image.emit(0xAA);
        let b = image.emit(0xBB);
        assert_eq!(a, 12);
        assert_eq!(b, 16);
        assert_eq!(image.here(), 20);
        assert_eq!(image.fetch(SIZE_SLOT), Some(20));
    }

    #[test]
    fn test_patch_overwrites_without_moving_cursor() {
        let mut image = CodeImage::new();
        let a = image.emit(0);
        image.patch(a, 0x1234).unwrap();
        assert_eq!(image.fetch(a), Some(0x1234));
        assert_eq!(image.here(), 16);
        assert_eq!(image.fetch(SIZE_SLOT), Some(16));
    }

    #[test]
    fn test_patch_rejects_unaligned_address() {
        let mut image = CodeImage::new();
        image.emit(0);
        assert!(matches!(
            image.patch(13, 1),
            Err(CompileError::Range { .. })
        ));
    }

    #[test]
    fn test_patch_rejects_address_beyond_cursor() {
        let mut image = CodeImage::new();
        assert!(matches!(
            image.patch(image.here(), 1),
            Err(CompileError::Range { .. })
        ));
    }

    #[test]
    fn test_to_bytes_is_little_endian() {
        let mut image = CodeImage::new();
        image.emit(0x1122_3344);
        let bytes = image.to_bytes();
        assert_eq!(&bytes[12..16], &[0x44, 0x33, 0x22, 0x11]);
        // size slot leads the image
        assert_eq!(&bytes[0..4], &[16, 0, 0, 0]);
    }
}
