use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::dictionary;
use crate::bytecode::image::CodeImage;

// =============================================================================
// SYMBOLS - name -> execution address sidecar
// =============================================================================

/// Execution addresses of every dictionary entry, in creation order. Written
/// next to the image so tooling can label addresses without re-walking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMap {
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
}

impl SymbolMap {
    pub fn from_image(image: &CodeImage) -> Result<Self, CompileError> {
        let mut entries = dictionary::walk(image)?;
        entries.reverse(); // walk is most-recent-first
        Ok(SymbolMap {
            symbols: entries
                .into_iter()
                .map(|e| Symbol {
                    name: e.name,
                    address: e.execution,
                })
                .collect(),
        })
    }

    pub fn to_postcard(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    #[allow(dead_code)]
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::lang::primitives::PrimitiveRegistry;
    use crate::lang::word_stream::SourceStream;

    #[test]
    fn test_symbols_are_in_creation_order() {
        let registry = PrimitiveRegistry::new();
        let image =
            compile(&mut SourceStream::new(": a dup ; : b drop ;"), &registry).unwrap();
        let map = SymbolMap::from_image(&image).unwrap();
        assert_eq!(map.symbols[0].name, "a");
        assert_eq!(map.symbols[1].name, "b");
        // synthesized definitions follow the user's
        assert!(map.symbols.iter().any(|s| s.name == "|dup"));
    }

    #[test]
    fn test_postcard_round_trip() {
        let map = SymbolMap {
            symbols: vec![
                Symbol {
                    name: "double".to_string(),
                    address: 24,
                },
                Symbol {
                    name: "__main".to_string(),
                    address: 64,
                },
            ],
        };
        let bytes = map.to_postcard().unwrap();
        assert_eq!(SymbolMap::from_postcard(&bytes).unwrap(), map);
    }
}
