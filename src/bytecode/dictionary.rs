use crate::bytecode::compile_error::CompileError;
use crate::bytecode::encode::Encoder;
use crate::bytecode::image::{CodeImage, DICT_HEAD_SLOT, ENTRY_SLOT};
use crate::bytecode::word::{self, NAME_END, WORD_BYTES};

// =============================================================================
// DICTIONARY ENCODER - linked, named definition headers
// =============================================================================

/// Name of the definition whose execution address becomes the image's entry
/// point (header slot 2).
pub const MAIN_ENTRY_NAME: &str = "__main";

/// Chains headers most-recent-first through image slot 1. Entries are
/// immutable once written; there is no deletion.
pub struct DictionaryEncoder {
    last_header: u32,
}

impl DictionaryEncoder {
    pub fn new() -> Self {
        DictionaryEncoder { last_header: 0 }
    }

    /// Write the header for a new definition and return its execution
    /// address, the word immediately after the header.
    pub fn define(&mut self, encoder: &mut Encoder, name: &str) -> Result<u32, CompileError> {
        let header = encoder.compile_header(name, self.last_header)?;
        self.last_header = header;
        encoder.patch(DICT_HEAD_SLOT, header)?;
        let execution = encoder.here();
        if name == MAIN_ENTRY_NAME {
            encoder.patch(ENTRY_SLOT, execution)?;
        }
        Ok(execution)
    }
}

impl Default for DictionaryEncoder {
    fn default() -> Self {
        DictionaryEncoder::new()
    }
}

/// One decoded dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub name: String,
    pub header: u32,
    pub execution: u32,
}

/// Walk the dictionary chain from slot 1, most recent first. Fails on a
/// malformed chain (a link leaving the image or not strictly descending).
pub fn walk(image: &CodeImage) -> Result<Vec<DictionaryEntry>, CompileError> {
    let mut entries = Vec::new();
    let mut header = image
        .fetch(DICT_HEAD_SLOT)
        .ok_or_else(|| CompileError::structural("image has no dictionary slot"))?;
    while header != 0 {
        let link = image
            .fetch(header)
            .ok_or_else(|| CompileError::structural("dictionary link outside the image"))?;
        let mut name = String::new();
        let mut cursor = header + WORD_BYTES;
        loop {
            let chunk = image
                .fetch(cursor)
                .ok_or_else(|| CompileError::structural("dictionary name runs off the image"))?;
            name.push_str(&word::unpack_name_chunk(chunk));
            cursor += WORD_BYTES;
            if chunk & NAME_END != 0 {
                break;
            }
        }
        entries.push(DictionaryEntry {
            name,
            header,
            execution: cursor,
        });
        if link == 0 {
            break;
        }
        let previous = (header as i64 + link as i32 as i64) as u32;
        if previous >= header {
            return Err(CompileError::structural("dictionary chain does not descend"));
        }
        header = previous;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::primitives::PrimitiveRegistry;

    #[test]
    fn test_define_updates_slot_1_and_chains() {
        let registry = PrimitiveRegistry::new();
        let mut enc = Encoder::new(&registry);
        let mut dict = DictionaryEncoder::new();

        let first = dict.define(&mut enc, "one").unwrap();
        enc.compile_primitive(registry.return_op()).unwrap();
        let second = dict.define(&mut enc, "two").unwrap();
        enc.compile_primitive(registry.return_op()).unwrap();
        let third = dict.define(&mut enc, "three").unwrap();
        enc.compile_primitive(registry.return_op()).unwrap();

        let image = enc.into_image();
        let entries = walk(&image).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["three", "two", "one"]);
        assert_eq!(entries[0].execution, third);
        assert_eq!(entries[1].execution, second);
        assert_eq!(entries[2].execution, first);
        assert_eq!(image.fetch(DICT_HEAD_SLOT), Some(entries[0].header));
    }

    #[test]
    fn test_empty_dictionary_walks_to_nothing() {
        let image = CodeImage::new();
        assert_eq!(walk(&image).unwrap(), Vec::new());
    }

    #[test]
    fn test_main_definition_sets_entry_slot_once() {
        let registry = PrimitiveRegistry::new();
        let mut enc = Encoder::new(&registry);
        let mut dict = DictionaryEncoder::new();

        dict.define(&mut enc, "helper").unwrap();
        enc.compile_primitive(registry.return_op()).unwrap();
        assert_eq!(enc.image().fetch(ENTRY_SLOT), Some(0));

        let main = dict.define(&mut enc, MAIN_ENTRY_NAME).unwrap();
        assert_eq!(enc.image().fetch(ENTRY_SLOT), Some(main));
    }
}
