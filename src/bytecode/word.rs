// =============================================================================
// WORD - the 32-bit tagged instruction word
// =============================================================================
//
// The image is self-describing: the tag of each instruction word lives in its
// own high bits. This module is the only place that knows the bit layout.
//
//   Literal        bit 31 = 0, payload in the low 31 bits
//   Primitive      bits 31-28 = 1100, opcode in the low 8 bits
//   Call forward   bits 31-28 = 1010, unsigned offset in the low 28 bits
//   Call backward  bits 31-28 = 1001, unsigned magnitude in the low 28 bits
//
// Branches are not a separate tag: they are the $br / $0br primitives,
// followed by one plain word holding a signed displacement.
//
// Dictionary name chunks pack 4 characters per word, shifted in from the low
// end; the final chunk of a name carries NAME_END in bit 31.

/// Size of one image word in bytes. Addresses are always multiples of this.
pub const WORD_BYTES: u32 = 4;

const TAG_PRIMITIVE: u32 = 0xC000_0000;
const TAG_CALL_FORWARD: u32 = 0xA000_0000;
const TAG_CALL_BACKWARD: u32 = 0x9000_0000;

const LITERAL_MASK: u32 = 0x7FFF_FFFF;
const LITERAL_SIGN: u32 = 0x4000_0000;
const OPCODE_MASK: u32 = 0x0000_00FF;

/// Largest forward or backward call displacement (28-bit field).
pub const CALL_RANGE: u32 = 0x0FFF_FFFF;

/// Terminator bit of the final chunk of a packed dictionary name.
pub const NAME_END: u32 = 0x8000_0000;

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Literal(i32),
    Primitive(u8),
    CallForward(u32),
    CallBackward(u32),
}

/// Encode a literal. `None` unless the top two bits of the value are equal,
/// the condition for a sign round-trip through the 31-bit payload.
pub fn encode_literal(n: i32) -> Option<u32> {
    let top = (n as u32) >> 30;
    if top == 0b00 || top == 0b11 {
        Some(n as u32 & LITERAL_MASK)
    } else {
        None
    }
}

pub fn encode_primitive(opcode: u8) -> u32 {
    TAG_PRIMITIVE | opcode as u32
}

/// Encode a call from a signed displacement measured from the address of the
/// word after the call. `None` if the magnitude exceeds the 28-bit field.
pub fn encode_call(displacement: i64) -> Option<u32> {
    if displacement.unsigned_abs() > CALL_RANGE as u64 {
        return None;
    }
    if displacement >= 0 {
        Some(TAG_CALL_FORWARD | displacement as u32)
    } else {
        Some(TAG_CALL_BACKWARD | (-displacement) as u32)
    }
}

/// Decode an instruction word. `None` for words that are not instructions
/// (name chunks, link words, displacement and data words are only meaningful
/// in context).
pub fn decode(word: u32) -> Option<Word> {
    if word & 0x8000_0000 == 0 {
        let payload = word & LITERAL_MASK;
        let n = if payload & LITERAL_SIGN != 0 {
            (payload | 0x8000_0000) as i32
        } else {
            payload as i32
        };
        return Some(Word::Literal(n));
    }
    match word >> 28 {
        0xC if word & !(TAG_PRIMITIVE | OPCODE_MASK) == 0 => {
            Some(Word::Primitive((word & OPCODE_MASK) as u8))
        }
        0xA => Some(Word::CallForward(word & CALL_RANGE)),
        0x9 => Some(Word::CallBackward(word & CALL_RANGE)),
        _ => None,
    }
}

/// Resolve a decoded call against the address of the word following it.
pub fn call_target(word: Word, next_address: u32) -> Option<u32> {
    match word {
        Word::CallForward(offset) => Some(next_address.wrapping_add(offset)),
        Word::CallBackward(magnitude) => Some(next_address.wrapping_sub(magnitude)),
        _ => None,
    }
}

/// Pack a dictionary name, 1 byte per character, 4 characters per word.
/// Continuation chunks have bit 31 clear; the final chunk has it set.
/// `None` for empty or non-ASCII names (bit 31 must never be a character bit).
pub fn pack_name(name: &str) -> Option<Vec<u32>> {
    if name.is_empty() || !name.is_ascii() {
        return None;
    }
    let mut chunks = Vec::new();
    let mut current: u32 = 0;
    for &byte in name.as_bytes() {
        if current & 0xFF00_0000 != 0 {
            chunks.push(current);
            current = 0;
        }
        current = (current << 8) | byte as u32;
    }
    chunks.push(current | NAME_END);
    Some(chunks)
}

/// Recover the characters of one packed name chunk.
pub fn unpack_name_chunk(chunk: u32) -> String {
    let chunk = chunk & !NAME_END;
    let mut part = String::new();
    for shift in (0..4).rev() {
        let byte = (chunk >> (shift * 8)) as u8;
        if byte != 0 {
            part.push(byte as char);
        }
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_round_trip() {
        for n in [0, 1, 42, -2, -1, 1000000, -1000000, 0x3FFF_FFFF, -0x4000_0000] {
            let encoded = encode_literal(n).unwrap();
            assert_eq!(encoded & 0x8000_0000, 0);
            assert_eq!(decode(encoded), Some(Word::Literal(n)));
        }
    }

    #[test]
    fn test_literal_boundaries() {
        assert!(encode_literal(0x3FFF_FFFF).is_some());
        assert!(encode_literal(0xC000_0000u32 as i32).is_some());
        assert!(encode_literal(0x4000_0000).is_none());
        assert!(encode_literal(0x8000_0000u32 as i32).is_none());
    }

    #[test]
    fn test_call_encoding_both_directions() {
        let forward = encode_call(0x120).unwrap();
        assert_eq!(decode(forward), Some(Word::CallForward(0x120)));
        assert_eq!(call_target(decode(forward).unwrap(), 0x1000), Some(0x1120));

        let backward = encode_call(-0x80).unwrap();
        assert_eq!(decode(backward), Some(Word::CallBackward(0x80)));
        assert_eq!(call_target(decode(backward).unwrap(), 0x1000), Some(0xF80));
    }

    #[test]
    fn test_call_range() {
        assert!(encode_call(CALL_RANGE as i64).is_some());
        assert!(encode_call(-(CALL_RANGE as i64)).is_some());
        assert!(encode_call(CALL_RANGE as i64 + 1).is_none());
        assert!(encode_call(-(CALL_RANGE as i64) - 1).is_none());
    }

    #[test]
    fn test_zero_displacement_is_forward() {
        assert_eq!(decode(encode_call(0).unwrap()), Some(Word::CallForward(0)));
    }

    #[test]
    fn test_primitive_decode_is_strict() {
        assert_eq!(decode(encode_primitive(27)), Some(Word::Primitive(27)));
        // stray payload bits above the opcode field are not a primitive
        assert_eq!(decode(0xC000_0100), None);
    }

    #[test]
    fn test_pack_short_name() {
        let chunks = pack_name("dup").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], NAME_END | 0x0064_7570);
        assert_eq!(unpack_name_chunk(chunks[0]), "dup");
    }

    #[test]
    fn test_pack_long_name_terminator_on_final_chunk_only() {
        let chunks = pack_name("increment").unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0] & NAME_END, 0);
        assert_eq!(chunks[1] & NAME_END, 0);
        assert_eq!(chunks[2] & NAME_END, NAME_END);
        let name: String = chunks.iter().map(|&c| unpack_name_chunk(c)).collect();
        assert_eq!(name, "increment");
    }

    #[test]
    fn test_pack_rejects_empty_and_non_ascii() {
        assert!(pack_name("").is_none());
        assert!(pack_name("dép").is_none());
    }
}
