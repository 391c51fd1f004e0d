mod asm;
mod bytecode;
mod lang;

use std::{env, fs, path::Path, process};

use crate::bytecode::compile::compile;
use crate::bytecode::disasm;
use crate::bytecode::symbols::SymbolMap;
use crate::lang::primitives::PrimitiveRegistry;
use crate::lang::word_stream::SourceStream;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut inputs: Vec<String> = Vec::new();
    let mut output: Option<String> = None;
    let mut map: Option<String> = None;
    let mut defines: Option<String> = None;
    let mut list = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list" => list = true,
            "-o" => output = Some(value_of(&mut iter, "-o")),
            "--map" => map = Some(value_of(&mut iter, "--map")),
            "--defines" => defines = Some(value_of(&mut iter, "--defines")),
            "--help" | "-h" => {
                print_usage();
                return;
            }
            flag if flag.starts_with('-') => {
                eprintln!("Unknown flag '{}'", flag);
                print_usage();
                process::exit(1);
            }
            file => inputs.push(file.to_string()),
        }
    }

    let registry = PrimitiveRegistry::new();

    if let Some(path) = &defines {
        if let Err(e) = fs::write(path, registry.include_file()) {
            eprintln!("Failed to write '{}': {}", path, e);
            process::exit(1);
        }
    }

    if inputs.is_empty() {
        if defines.is_none() {
            print_usage();
            process::exit(1);
        }
        return;
    }

    // aggregate all input files, in order, into one token stream
    let mut source = String::new();
    for input in &inputs {
        ensure_extension(input);
        match fs::read_to_string(input) {
            Ok(text) => {
                source.push_str(&text);
                source.push('\n');
            }
            Err(e) => {
                eprintln!("Failed to read '{}': {}", input, e);
                process::exit(1);
            }
        }
    }

    let mut stream = SourceStream::new(&source);
    let image = match compile(&mut stream, &registry) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if list {
        disasm::print_image(&image, &registry);
    }

    let output = output.unwrap_or_else(|| default_output(&inputs[0]));
    if let Err(e) = fs::write(&output, image.to_bytes()) {
        eprintln!("Failed to write '{}': {}", output, e);
        process::exit(1);
    }

    if let Some(path) = &map {
        let encoded = SymbolMap::from_image(&image)
            .map_err(|e| e.to_string())
            .and_then(|m| m.to_postcard().map_err(|e| e.to_string()));
        match encoded {
            Ok(bytes) => {
                if let Err(e) = fs::write(path, bytes) {
                    eprintln!("Failed to write '{}': {}", path, e);
                    process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("Failed to build symbol map: {}", e);
                process::exit(1);
            }
        }
    }
}

fn value_of<'a, I: Iterator<Item = &'a String>>(iter: &mut I, flag: &str) -> String {
    match iter.next() {
        Some(value) => value.clone(),
        None => {
            eprintln!("Flag '{}' needs a value", flag);
            print_usage();
            process::exit(1);
        }
    }
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("4th") {
        eprintln!("Error: expected a .4th file, got {}", filename);
        process::exit(1);
    }
}

fn default_output(first_input: &str) -> String {
    let path = Path::new(first_input);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("{}.img", stem)
}

fn print_usage() {
    println!("FBC - Forth VM boot compiler");
    println!();
    println!("Usage:");
    println!("  fbc <file.4th> [more.4th ...]   Compile sources into an image");
    println!("  fbc ... -o <file>               Set the image output path");
    println!("  fbc ... --list                  Print a listing of the image");
    println!("  fbc ... --map <file>            Write a symbol map next to the image");
    println!("  fbc --defines <file>            Write the primitive opcode include file");
    println!("  fbc --help, -h                  Show this help");
}
