#![deny(clippy::expect_used)]
//! `fireflyc` — a thin driver over the `firefly_codegen` library.
//!
//! Reads a JSON-encoded `CompilationUnit` (the serialized form of the AST
//! described in spec §3) and writes one `.class` file per emitted internal
//! name into an output directory. This is the moral equivalent of the
//! teacher's `bin/bundle.rs` / `bin/aot.rs`: a direct driver over the
//! library's public API, not a front end in its own right (the lexer,
//! parser, and semantic analyzer that would produce this JSON are out of
//! scope for this crate).
//!
//! Usage:
//!   fireflyc unit.json -o out_dir
//!   fireflyc unit.json --classpath classes.json -o out_dir

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use firefly_codegen::ast::CompilationUnit;
use firefly_codegen::resolve::class_resolver::{ClasspathOracle, FixtureOracle, ReflectedClass};
use firefly_codegen::{compile_unit, CodegenConfig};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "-h" || args[1] == "--help" {
        print_usage();
        std::process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut input_file = None;
    let mut output_dir = PathBuf::from("out");
    let mut classpath_file = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: {} requires an argument", args[i - 1]);
                    std::process::exit(1);
                }
                output_dir = PathBuf::from(&args[i]);
            }
            "--classpath" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --classpath requires an argument");
                    std::process::exit(1);
                }
                classpath_file = Some(args[i].clone());
            }
            arg if !arg.starts_with('-') => {
                input_file = Some(arg.to_string());
            }
            other => {
                eprintln!("Error: unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let input_file = input_file.unwrap_or_else(|| {
        eprintln!("Error: input file required");
        std::process::exit(1);
    });

    let source = fs::read_to_string(&input_file).unwrap_or_else(|e| {
        eprintln!("Error: failed to read '{input_file}': {e}");
        std::process::exit(1);
    });

    let unit: CompilationUnit = serde_json::from_str(&source).unwrap_or_else(|e| {
        eprintln!("Error: failed to parse compilation unit JSON: {e}");
        std::process::exit(1);
    });

    let oracle = load_oracle(classpath_file.as_deref());
    let config = CodegenConfig::from_env();

    let (classes, diagnostics) = compile_unit(&unit, oracle, &config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    for diag in &diagnostics {
        eprintln!("error[{}]: {}", diag.declaration, diag.message);
    }

    fs::create_dir_all(&output_dir).unwrap_or_else(|e| {
        eprintln!("Error: failed to create output directory '{}': {e}", output_dir.display());
        std::process::exit(1);
    });

    for (internal_name, bytes) in &classes {
        let class_path = class_file_path(&output_dir, internal_name);
        if let Some(parent) = class_path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                eprintln!("Error: failed to create directory '{}': {e}", parent.display());
                std::process::exit(1);
            });
        }
        fs::write(&class_path, bytes).unwrap_or_else(|e| {
            eprintln!("Error: failed to write '{}': {e}", class_path.display());
            std::process::exit(1);
        });
    }

    println!("Compiled {} class(es) to {}", classes.len(), output_dir.display());
    if !diagnostics.is_empty() {
        println!("{} declaration(s) failed to emit; see errors above", diagnostics.len());
        std::process::exit(1);
    }
}

fn class_file_path(output_dir: &Path, internal_name: &str) -> PathBuf {
    output_dir.join(format!("{internal_name}.class"))
}

/// A live JVM classpath bridge is out of scope for this crate (spec §1); a
/// fixture table, optionally seeded from `--classpath`, resolves any class
/// not declared in the unit being compiled. Absent `--classpath`, only
/// classes local to the unit resolve.
fn load_oracle(classpath_file: Option<&str>) -> Box<dyn ClasspathOracle> {
    let Some(path) = classpath_file else {
        return Box::new(FixtureOracle::default());
    };
    let raw = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error: failed to read classpath fixture '{path}': {e}");
        std::process::exit(1);
    });
    let classes: std::collections::HashMap<String, ReflectedClass> = serde_json::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("Error: failed to parse classpath fixture '{path}': {e}");
        std::process::exit(1);
    });
    Box::new(FixtureOracle { classes })
}

fn print_usage() {
    println!(
        r#"fireflyc - Firefly JVM code-generation back end

USAGE:
    fireflyc <unit.json> -o <out_dir>
    fireflyc <unit.json> --classpath <classes.json> -o <out_dir>

OPTIONS:
    -o, --output <dir>        Directory to write .class files into (default: out)
        --classpath <file>    JSON map of fully-qualified name -> ReflectedClass,
                              used to resolve references outside the unit
    -h, --help                Show this help message
"#
    );
}
