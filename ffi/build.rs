//! Generates `cms_todo.h` for C callers.
//!
//! The header is written to `OUT_DIR` and then copied to `include/`. Header
//! generation is best effort: a failure is reported as a cargo warning and
//! never fails the build.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const HEADER: &str = "cms_todo.h";

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR"))
    else {
        println!("cargo:warning=skipping C header generation: cargo paths not set");
        return;
    };

    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("CMS_TODO_H")
        .with_no_includes()
        .with_sys_include("stdbool.h")
        .with_sys_include("stdint.h")
        .generate();

    let bindings = match generated {
        Ok(bindings) => bindings,
        Err(e) => {
            println!("cargo:warning=skipping C header generation: {e}");
            return;
        }
    };

    let built = PathBuf::from(out_dir).join(HEADER);
    bindings.write_to_file(&built);

    let include = Path::new(&crate_dir).join("include");
    if let Err(e) = fs::create_dir_all(&include).and_then(|()| fs::copy(&built, include.join(HEADER)))
    {
        println!("cargo:warning=C header left at {}: {e}", built.display());
    }
}
