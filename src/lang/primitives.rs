use std::collections::HashMap;

// =============================================================================
// PRIMITIVE REGISTRY - the fixed catalog of VM operations
// =============================================================================

/// The primitive table. Position in this list IS the opcode; it must never be
/// re-sorted, because the emulator's dispatch table is built in the same
/// order.
pub const PRIMITIVES: [&str; 34] = [
    "@", "!", "c@", "c!", "+!", // memory access
    "+", "-", "*", "/", "and", "or", "xor", // binary operators
    "not", "0=", "0>", "0<", "0-", "1+", "1-", "2*", "2/", // unary operators
    "dup", "drop", "swap", "rot", "over", "pick", // stack manipulation
    ";", "r>", ">r", // return and control stack
    ",", // append word
    "$br", "$0br", "$lit", // internal: branches and the literal fetcher
];

/// Immutable name ↔ opcode catalog, built once and shared read-only.
pub struct PrimitiveRegistry {
    ids: HashMap<&'static str, u8>,
    ret: u8,
    branch: u8,
    branch_if_zero: u8,
}

impl PrimitiveRegistry {
    pub fn new() -> Self {
        let mut ids = HashMap::new();
        let mut ret = 0;
        let mut branch = 0;
        let mut branch_if_zero = 0;
        for (opcode, &name) in PRIMITIVES.iter().enumerate() {
            ids.insert(name, opcode as u8);
            match name {
                ";" => ret = opcode as u8,
                "$br" => branch = opcode as u8,
                "$0br" => branch_if_zero = opcode as u8,
                _ => {}
            }
        }
        PrimitiveRegistry {
            ids,
            ret,
            branch,
            branch_if_zero,
        }
    }

    pub fn id_of(&self, name: &str) -> Option<u8> {
        self.ids.get(name).copied()
    }

    pub fn name_of(&self, opcode: u8) -> Option<&'static str> {
        PRIMITIVES.get(opcode as usize).copied()
    }

    #[allow(dead_code)]
    pub fn count(&self) -> u8 {
        PRIMITIVES.len() as u8
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &'static str)> {
        PRIMITIVES
            .iter()
            .enumerate()
            .map(|(opcode, &name)| (opcode as u8, name))
    }

    /// Opcode of `;`, the end-of-definition primitive.
    pub fn return_op(&self) -> u8 {
        self.ret
    }

    /// Opcode of `$br`, the unconditional branch.
    pub fn branch_op(&self) -> u8 {
        self.branch
    }

    /// Opcode of `$0br`, branch-if-zero.
    pub fn branch_if_zero_op(&self) -> u8 {
        self.branch_if_zero
    }

    /// Derive the C identifier used for a primitive in the generated include
    /// file: fixed punctuation substitutions, separators de-duplicated, edges
    /// trimmed, uppercased. Build glue only; never on the encoding path.
    pub fn label_of(name: &str) -> String {
        let mut label = name.to_lowercase();
        for (from, to) in [
            (">r", "_to_r_"),
            ("r>", "_from_r_"),
            ("@", "_read_"),
            ("!", "_write_"),
            ("+", "_add_"),
            ("-", "_sub_"),
            ("*", "_mul_"),
            ("/", "_div_"),
            ("=", "_equals_"),
            (">", "_greater_"),
            ("<", "_less_"),
            (";", "_semicolon_"),
            ("$", "_dollar_"),
            (",", "_comma_"),
        ] {
            label = label.replace(from, to);
        }
        while label.contains("__") {
            label = label.replace("__", "_");
        }
        label.trim_matches('_').to_uppercase()
    }

    /// Render the C include file listing every opcode. Emission is the
    /// caller's job; building the registry has no side effects.
    pub fn include_file(&self) -> String {
        let mut out = String::new();
        for (opcode, name) in self.iter() {
            out.push_str(&format!(
                "#define OP_{} ({})\n",
                Self::label_of(name),
                opcode
            ));
        }
        out.push_str("#ifdef INCLUDE_PRIMITIVE_STATIC\n");
        let quoted: Vec<String> = PRIMITIVES.iter().map(|n| format!("\"{}\"", n)).collect();
        out.push_str(&format!(
            "static const char *_primitives[] = {{ {} }};\n",
            quoted.join(",")
        ));
        out.push_str("#endif\n");
        out
    }
}

impl Default for PrimitiveRegistry {
    fn default() -> Self {
        PrimitiveRegistry::new()
    }
}
