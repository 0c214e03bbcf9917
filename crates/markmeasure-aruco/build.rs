//! Compile `data/*_CODES.json` into `builtins.rs` so dictionaries need no
//! runtime file access.

use serde::Deserialize;
use std::fmt::Write as _;
use std::path::Path;
use std::{env, fs};

#[derive(Deserialize)]
struct DictionaryFile {
    name: String,
    marker_size: usize,
    max_correction_bits: u8,
    codes: Vec<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    println!("cargo:rerun-if-changed={}", data_dir.display());

    let mut paths: Vec<_> = fs::read_dir(&data_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_CODES.json"))
        })
        .collect();
    paths.sort();

    let mut out = String::new();
    let mut names = Vec::new();
    for path in &paths {
        println!("cargo:rerun-if-changed={}", path.display());
        let dict: DictionaryFile = serde_json::from_str(&fs::read_to_string(path)?)?;
        if dict.marker_size * dict.marker_size > 64 {
            return Err(format!("{}: marker_size {} too large", dict.name, dict.marker_size).into());
        }

        writeln!(out, "const {}_CODES: &[u64] = &[", dict.name)?;
        for code in &dict.codes {
            writeln!(out, "    0x{code:04x},")?;
        }
        writeln!(out, "];\n")?;
        writeln!(out, "/// Built-in `{}` dictionary ({} markers).", dict.name, dict.codes.len())?;
        writeln!(
            out,
            "pub const {0}: Dictionary = Dictionary {{ name: \"{0}\", marker_size: {1}, max_correction_bits: {2}, codes: {0}_CODES }};\n",
            dict.name, dict.marker_size, dict.max_correction_bits
        )?;
        names.push(dict.name);
    }

    writeln!(out, "/// Names of all embedded dictionaries.")?;
    writeln!(out, "pub const BUILTIN_NAMES: &[&str] = &[")?;
    for name in &names {
        writeln!(out, "    \"{name}\",")?;
    }
    writeln!(out, "];\n")?;

    writeln!(out, "/// Look up an embedded dictionary by its name.")?;
    writeln!(out, "pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {{")?;
    writeln!(out, "    match name {{")?;
    for name in &names {
        writeln!(out, "        \"{name}\" => Some({name}),")?;
    }
    writeln!(out, "        _ => None,")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;

    let dest = Path::new(&env::var("OUT_DIR")?).join("builtins.rs");
    fs::write(dest, out)?;
    Ok(())
}
