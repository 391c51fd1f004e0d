use crate::bytecode::compile_error::CompileError;
use crate::bytecode::image::CodeImage;
use crate::bytecode::word::WORD_BYTES;

// =============================================================================
// LABELS - bounded forward-label backpatcher
// =============================================================================

/// Number of labels available inside one definition scope.
pub const LABEL_COUNT: usize = 10;

/// Width of the branch offset field the patch writes into. The condition and
/// opcode bits above it are never touched.
const FIELD_MASK: u32 = 0x00FF_FFFF;

/// Numbered labels 0-9, scoped between successive definition markers. A label
/// may be referenced before it is defined; every reference is recorded and
/// patched when the scope is resolved at the next boundary.
pub struct LabelScope {
    addresses: [Option<u32>; LABEL_COUNT],
    references: Vec<(u8, u32)>,
}

#[allow(dead_code)]
impl LabelScope {
    pub fn new() -> Self {
        LabelScope {
            addresses: [None; LABEL_COUNT],
            references: Vec::new(),
        }
    }

    pub fn define(&mut self, label: u8, address: u32) -> Result<(), CompileError> {
        let slot = self.slot(label)?;
        if address % WORD_BYTES != 0 {
            return Err(CompileError::range(format!(
                "label address {:#x} is not word aligned",
                address
            )));
        }
        if self.addresses[slot].is_some() {
            return Err(CompileError::duplicate(format!(".{}", label)));
        }
        self.addresses[slot] = Some(address);
        Ok(())
    }

    /// Record a reference to `label` from the instruction at `address`.
    pub fn reference(&mut self, label: u8, address: u32) -> Result<(), CompileError> {
        self.slot(label)?;
        self.references.push((label, address));
        Ok(())
    }

    /// Patch every recorded reference and clear the scope. Every referenced
    /// label must be defined by now; an undefined one is fatal.
    pub fn resolve(&mut self, image: &mut CodeImage) -> Result<(), CompileError> {
        for &(label, site) in &self.references {
            let target = self.addresses[label as usize].ok_or_else(|| {
                CompileError::structural(format!("label {} referenced but never defined", label))
            })?;
            let displacement = (target as i64 - site as i64 - WORD_BYTES as i64) >> 2;
            let field = displacement as u32 & FIELD_MASK;
            let instruction = image.fetch(site).ok_or_else(|| {
                CompileError::range(format!("label reference at {:#x} outside the image", site))
            })?;
            image.patch(site, (instruction & !FIELD_MASK) | field)?;
        }
        self.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.addresses = [None; LABEL_COUNT];
        self.references.clear();
    }

    fn slot(&self, label: u8) -> Result<usize, CompileError> {
        if (label as usize) < LABEL_COUNT {
            Ok(label as usize)
        } else {
            Err(CompileError::range(format!(
                "labels are 0-9 only, got {}",
                label
            )))
        }
    }
}

impl Default for LabelScope {
    fn default() -> Self {
        LabelScope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_before_definition_is_patched() {
        let mut image = CodeImage::new();
        let site = image.emit(0x8100_0000); // conditional branch, offset unresolved
        image.emit(0);
        let target = image.emit(0);

        let mut labels = LabelScope::new();
        labels.reference(3, site).unwrap();
        labels.define(3, target).unwrap();
        labels.resolve(&mut image).unwrap();

        let expected = ((target as i64 - site as i64 - 4) >> 2) as u32 & 0x00FF_FFFF;
        assert_eq!(image.fetch(site), Some(0x8100_0000 | expected));
    }

    #[test]
    fn test_backward_reference_keeps_upper_bits() {
        let mut image = CodeImage::new();
        let target = image.emit(0);
        image.emit(0);
        let site = image.emit(0x8500_0000);

        let mut labels = LabelScope::new();
        labels.define(7, target).unwrap();
        labels.reference(7, site).unwrap();
        labels.resolve(&mut image).unwrap();

        let patched = image.fetch(site).unwrap();
        assert_eq!(patched & 0xFF00_0000, 0x8500_0000);
        // -3 words, arithmetic shift preserves the sign in the masked field
        assert_eq!(patched & 0x00FF_FFFF, 0x00FF_FFFD);
    }

    #[test]
    fn test_unresolved_reference_is_fatal() {
        let mut image = CodeImage::new();
        let site = image.emit(0x8000_0000);
        let mut labels = LabelScope::new();
        labels.reference(0, site).unwrap();
        assert!(matches!(
            labels.resolve(&mut image),
            Err(CompileError::Structural { .. })
        ));
    }

    #[test]
    fn test_resolve_clears_the_scope() {
        let mut image = CodeImage::new();
        let site = image.emit(0x8000_0000);
        let mut labels = LabelScope::new();
        labels.define(1, site).unwrap();
        labels.reference(1, site).unwrap();
        labels.resolve(&mut image).unwrap();
        // same label can be defined again in the next scope
        labels.define(1, site).unwrap();
        assert!(labels.references.is_empty());
    }

    #[test]
    fn test_label_validation() {
        let mut labels = LabelScope::new();
        assert!(matches!(
            labels.define(10, 0),
            Err(CompileError::Range { .. })
        ));
        assert!(matches!(
            labels.define(1, 6),
            Err(CompileError::Range { .. })
        ));
        labels.define(1, 8).unwrap();
        assert!(matches!(
            labels.define(1, 8),
            Err(CompileError::DuplicateDefinition { .. })
        ));
    }
}
