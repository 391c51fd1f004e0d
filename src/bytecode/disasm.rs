use std::collections::HashMap;
use std::fmt::Write;

use crate::bytecode::dictionary;
use crate::bytecode::image::CodeImage;
use crate::bytecode::word::{self, NAME_END, WORD_BYTES, Word};
use crate::lang::primitives::PrimitiveRegistry;

// =============================================================================
// DISASM - human-readable image listing
// =============================================================================

/// Print a listing of the whole image.
pub fn print_image(image: &CodeImage, registry: &PrimitiveRegistry) {
    print!("{}", listing(image, registry));
}

/// Render the image one word per line: address, raw word, decoded form.
pub fn listing(image: &CodeImage, registry: &PrimitiveRegistry) -> String {
    // map header addresses to names so header words are not misread as code
    let mut headers: HashMap<u32, String> = HashMap::new();
    if let Ok(entries) = dictionary::walk(image) {
        for entry in entries {
            headers.insert(entry.header, entry.name);
        }
    }

    let mut out = String::new();
    let mut in_name = false;
    let mut branch_displacement = false;
    for (index, &raw) in image.words().iter().enumerate() {
        let address = index as u32 * WORD_BYTES;
        let caption = match address {
            0 => "image size in bytes".to_string(),
            4 => "dictionary head".to_string(),
            8 => "entry point (__main)".to_string(),
            _ if in_name => {
                in_name = raw & NAME_END == 0;
                format!("name '{}'", word::unpack_name_chunk(raw))
            }
            _ if branch_displacement => {
                branch_displacement = false;
                let target = (address as i64 + WORD_BYTES as i64 + raw as i32 as i64) as u32;
                format!("-> {:08x}", target)
            }
            _ if headers.contains_key(&address) => {
                in_name = true;
                format!("header of '{}', link {}", headers[&address], raw as i32)
            }
            _ => match word::decode(raw) {
                Some(Word::Literal(n)) => format!("lit {}", n),
                Some(Word::Primitive(op)) => {
                    if op == registry.branch_op() || op == registry.branch_if_zero_op() {
                        branch_displacement = true;
                    }
                    registry
                        .name_of(op)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("prim {}?", op))
                }
                Some(call @ (Word::CallForward(_) | Word::CallBackward(_))) => {
                    match word::call_target(call, address + WORD_BYTES) {
                        Some(target) => format!("call {:08x}", target),
                        None => "call ?".to_string(),
                    }
                }
                None => "?".to_string(),
            },
        };
        let _ = writeln!(out, "{:08x}  {:08x}  {}", address, raw, caption);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::lang::word_stream::SourceStream;

    fn listing_of(source: &str) -> String {
        let registry = PrimitiveRegistry::new();
        let image = compile(&mut SourceStream::new(source), &registry).unwrap();
        listing(&image, &registry)
    }

    #[test]
    fn test_listing_shows_headers_and_primitives() {
        let text = listing_of(": double dup + ;");
        assert!(text.contains("header of 'double'"));
        assert!(text.contains("name 'doub'"));
        assert!(text.contains("  dup"));
        assert!(text.contains("  ;"));
    }

    #[test]
    fn test_listing_resolves_branch_targets() {
        let text = listing_of(": a if dup then drop ;");
        assert!(text.contains("$0br"));
        assert!(text.contains("-> "));
    }

    #[test]
    fn test_listing_has_one_line_per_word() {
        let registry = PrimitiveRegistry::new();
        let image = compile(&mut SourceStream::new("42"), &registry).unwrap();
        let text = listing(&image, &registry);
        assert_eq!(text.lines().count(), image.words().len());
        assert!(text.contains("lit 42"));
    }
}
