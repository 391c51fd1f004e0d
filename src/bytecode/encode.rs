use crate::bytecode::compile_error::CompileError;
use crate::bytecode::image::CodeImage;
use crate::bytecode::word::{self, WORD_BYTES, Word};
use crate::lang::primitives::PrimitiveRegistry;

// =============================================================================
// INSTRUCTION ENCODER
// =============================================================================

/// Encodes instructions into the image. Owns the image and the
/// fall-through-elision flag; shares the registry read-only.
pub struct Encoder<'a> {
    image: CodeImage,
    registry: &'a PrimitiveRegistry,

    /// Whether the previous instruction was the end-of-definition primitive.
    /// A header compiled directly after a return needs no skip branch.
    last_was_return: bool,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a PrimitiveRegistry) -> Self {
        Encoder {
            image: CodeImage::new(),
            registry,
            last_was_return: true,
        }
    }

    pub fn here(&self) -> u32 {
        self.image.here()
    }

    #[allow(dead_code)]
    pub fn word_size(&self) -> u32 {
        WORD_BYTES
    }

    #[allow(dead_code)]
    pub fn image(&self) -> &CodeImage {
        &self.image
    }

    pub fn into_image(self) -> CodeImage {
        self.image
    }

    pub fn patch(&mut self, address: u32, value: u32) -> Result<(), CompileError> {
        self.image.patch(address, value)
    }

    /// Emit a literal. The value's top two bits must be equal so the sign
    /// survives the 31-bit payload.
    pub fn compile_literal(&mut self, n: i32) -> Result<u32, CompileError> {
        let encoded = word::encode_literal(n)
            .ok_or_else(|| CompileError::range(format!("literal {} out of range", n)))?;
        self.last_was_return = false;
        Ok(self.image.emit(encoded))
    }

    /// Emit a call to `target`. The displacement is measured from the address
    /// of the word after the call; the direction picks the tag.
    pub fn compile_call(&mut self, target: u32) -> Result<u32, CompileError> {
        let displacement = target as i64 - (self.image.here() + WORD_BYTES) as i64;
        let encoded = word::encode_call(displacement).ok_or_else(|| {
            CompileError::range(format!("call to {:#x} out of range", target))
        })?;
        self.last_was_return = false;
        Ok(self.image.emit(encoded))
    }

    /// Emit a primitive and remember whether it was the end-of-definition
    /// primitive.
    pub fn compile_primitive(&mut self, opcode: u8) -> Result<u32, CompileError> {
        if self.registry.name_of(opcode).is_none() {
            return Err(CompileError::range(format!(
                "no primitive with opcode {}",
                opcode
            )));
        }
        self.last_was_return = opcode == self.registry.return_op();
        Ok(self.image.emit(word::encode_primitive(opcode)))
    }

    /// Emit a branch opcode followed by a zero placeholder word. Returns the
    /// placeholder's address as the patch handle.
    pub fn compile_branch(&mut self, conditional: bool) -> u32 {
        let opcode = if conditional {
            self.registry.branch_if_zero_op()
        } else {
            self.registry.branch_op()
        };
        self.image.emit(word::encode_primitive(opcode));
        self.last_was_return = false;
        self.image.emit(0)
    }

    /// Patch a branch placeholder with the displacement to `target`, measured
    /// from the address after the placeholder. Fails unless the word before
    /// the placeholder is a branch opcode.
    pub fn set_branch_target(&mut self, handle: u32, target: u32) -> Result<(), CompileError> {
        let opcode_word = handle
            .checked_sub(WORD_BYTES)
            .and_then(|address| self.image.fetch(address))
            .and_then(word::decode);
        match opcode_word {
            Some(Word::Primitive(op))
                if op == self.registry.branch_op()
                    || op == self.registry.branch_if_zero_op() => {}
            _ => {
                return Err(CompileError::structural(format!(
                    "word at {:#x} is not a branch placeholder",
                    handle
                )));
            }
        }
        let displacement = target as i64 - (handle + WORD_BYTES) as i64;
        self.image.patch(handle, displacement as i32 as u32)
    }

    /// Emit `count` zero data words.
    pub fn compile_allocate(&mut self, count: u32) {
        for _ in 0..count {
            self.image.emit(0);
        }
        self.last_was_return = false;
    }

    /// Write a dictionary header: link word (relative offset to the previous
    /// header, 0 if none), then the packed name. If the previous instruction
    /// was not a return, an unconditional branch over the header is compiled
    /// first and patched to land exactly after it, so preceding code falls
    /// through. Returns this header's address for chaining.
    pub fn compile_header(&mut self, name: &str, previous: u32) -> Result<u32, CompileError> {
        let skip = if self.last_was_return {
            None
        } else {
            Some(self.compile_branch(false))
        };
        let header = self.image.here();
        let link = if previous == 0 {
            0
        } else {
            (previous as i64 - header as i64) as i32 as u32
        };
        self.image.emit(link);
        let chunks = word::pack_name(name).ok_or_else(|| {
            CompileError::structural(format!("definition name '{}' must be non-empty ascii", name))
        })?;
        for chunk in chunks {
            self.image.emit(chunk);
        }
        if let Some(handle) = skip {
            let after = self.image.here();
            self.set_branch_target(handle, after)?;
        }
        self.last_was_return = false;
        Ok(header)
    }
}
