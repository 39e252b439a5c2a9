use std::{env, path::PathBuf};

fn main() {
    let target = env::var("TARGET").unwrap_or_default();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let linker_script = PathBuf::from(manifest_dir).join("linker.ld");

    // Only the bare-metal kernel binary links against the custom script;
    // host-target test builds use the platform's default linker setup.
    if target.contains("trios") || target.contains("i686") {
        println!("cargo:rustc-link-arg=-T{}", linker_script.display());
    }

    println!("cargo:rerun-if-changed=linker.ld");
}
