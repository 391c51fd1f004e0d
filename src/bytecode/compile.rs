use std::collections::HashMap;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::dictionary::DictionaryEncoder;
use crate::bytecode::encode::Encoder;
use crate::bytecode::image::CodeImage;
use crate::bytecode::word::WORD_BYTES;
use crate::lang::primitives::PrimitiveRegistry;
use crate::lang::word_stream::WordStream;

// =============================================================================
// COMPILER DRIVER - token dispatch state machine
// =============================================================================

/// Primitives with no standalone executor: return and the control-stack pair.
/// Synthesis skips these.
const NO_EXECUTOR: [&str; 3] = [";", "r>", ">r"];

/// Prefix of hexadecimal literal tokens.
const HEX_PREFIX: &str = "0x";

/// Compile a token stream into a finished image.
pub fn compile<S: WordStream>(
    stream: &mut S,
    registry: &PrimitiveRegistry,
) -> Result<CodeImage, CompileError> {
    Compiler::new(registry).run(stream)
}

/// Single-pass compiler with at most one token of lookahead. Owns the
/// vocabulary and the single open-branch slot; the encoder owns the image.
pub struct Compiler<'a> {
    registry: &'a PrimitiveRegistry,
    encoder: Encoder<'a>,
    dictionary: DictionaryEncoder,

    /// name -> execution address, bound exactly once per definition
    vocabulary: HashMap<String, u32>,

    /// Patch handle of the one permitted outstanding `if`
    open_branch: Option<u32>,

    /// Execution address of the definition being compiled, if any
    current_entry: Option<u32>,

    /// 1-based index of the token being dispatched, for diagnostics
    position: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a PrimitiveRegistry) -> Self {
        Compiler {
            registry,
            encoder: Encoder::new(registry),
            dictionary: DictionaryEncoder::new(),
            vocabulary: HashMap::new(),
            open_branch: None,
            current_entry: None,
            position: 0,
        }
    }

    pub fn run<S: WordStream>(mut self, stream: &mut S) -> Result<CodeImage, CompileError> {
        while let Some(token) = stream.next_word() {
            self.position += 1;
            let position = self.position;
            self.dispatch(&token, stream)
                .map_err(|e| e.at(&token, position))?;
        }
        self.synthesize()?;
        Ok(self.encoder.into_image())
    }

    fn dispatch<S: WordStream>(&mut self, token: &str, stream: &mut S) -> Result<(), CompileError> {
        match token {
            ":" => {
                let name = stream.next_word().ok_or_else(|| {
                    CompileError::structural("definition name missing at end of stream")
                })?;
                self.position += 1;
                self.define(&name)
            }
            "cell" => self.encoder.compile_literal(WORD_BYTES as i32).map(drop),
            "allot" => {
                let count = stream.next_word().ok_or_else(|| {
                    CompileError::structural("allocation count missing at end of stream")
                })?;
                self.position += 1;
                let count: u32 = count.parse().map_err(|_| {
                    CompileError::structural(format!(
                        "allocation count must be a decimal number, got '{}'",
                        count
                    ))
                })?;
                self.encoder.compile_allocate(count);
                Ok(())
            }
            "if" => {
                if self.open_branch.is_some() {
                    return Err(CompileError::structural(
                        "'if' is already open; conditionals do not nest",
                    ));
                }
                self.open_branch = Some(self.encoder.compile_branch(true));
                Ok(())
            }
            "then" => {
                // no-op when no conditional is open
                if let Some(handle) = self.open_branch.take() {
                    let target = self.encoder.here();
                    self.encoder.set_branch_target(handle, target)?;
                }
                Ok(())
            }
            "self" => {
                let entry = self.current_entry.ok_or_else(|| {
                    CompileError::structural("'self' is only allowed inside a definition")
                })?;
                let handle = self.encoder.compile_branch(false);
                self.encoder.set_branch_target(handle, entry)
            }
            _ => {
                if let Some(opcode) = self.registry.id_of(token) {
                    self.primitive(opcode)
                } else if let Ok(n) = token.parse::<i32>() {
                    self.encoder.compile_literal(n).map(drop)
                } else if let Some(n) = parse_hex(token) {
                    self.encoder.compile_literal(n).map(drop)
                } else if let Some(&address) = self.vocabulary.get(token) {
                    self.encoder.compile_call(address).map(drop)
                } else {
                    Err(CompileError::unknown_word(token))
                }
            }
        }
    }

    /// Create a header for `name`, bind it, and enter the definition.
    fn define(&mut self, name: &str) -> Result<(), CompileError> {
        if self.vocabulary.contains_key(name) {
            return Err(CompileError::duplicate(name));
        }
        let execution = self.dictionary.define(&mut self.encoder, name)?;
        self.vocabulary.insert(name.to_string(), execution);
        self.current_entry = Some(execution);
        Ok(())
    }

    /// Emit a primitive. The end-of-definition primitive also force-closes a
    /// still-open `if`, patching it onto the return itself so the false path
    /// returns, and leaves the definition.
    fn primitive(&mut self, opcode: u8) -> Result<(), CompileError> {
        let address = self.encoder.here();
        self.encoder.compile_primitive(opcode)?;
        if opcode == self.registry.return_op() {
            if let Some(handle) = self.open_branch.take() {
                self.encoder.set_branch_target(handle, address)?;
            }
            self.current_entry = None;
        }
        Ok(())
    }

    /// After the stream ends, give every primitive outside the return and
    /// control-stack trio a plain executor `name = [primitive ;]` and a
    /// compiling helper `|name = [literal(opcode) call(,) ;]`. The executors
    /// come first so the append word `,` is bound before the helpers call it.
    fn synthesize(&mut self) -> Result<(), CompileError> {
        let registry = self.registry;
        let ret = registry.return_op();
        for (opcode, name) in registry.iter() {
            if NO_EXECUTOR.contains(&name) {
                continue;
            }
            self.define(name)?;
            self.encoder.compile_primitive(opcode)?;
            self.encoder.compile_primitive(ret)?;
        }
        let append = *self.vocabulary.get(",").ok_or_else(|| {
            CompileError::structural("the append word ',' is not bound; cannot synthesize compilers")
        })?;
        for (opcode, name) in registry.iter() {
            if NO_EXECUTOR.contains(&name) {
                continue;
            }
            self.define(&format!("|{}", name))?;
            self.encoder.compile_literal(opcode as i32)?;
            self.encoder.compile_call(append)?;
            self.encoder.compile_primitive(ret)?;
        }
        self.current_entry = None;
        Ok(())
    }
}

fn parse_hex(token: &str) -> Option<i32> {
    let digits = token.strip_prefix(HEX_PREFIX)?;
    u32::from_str_radix(digits, 16).ok().map(|n| n as i32)
}
