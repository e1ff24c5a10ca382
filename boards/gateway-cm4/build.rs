// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

fn main() {
    // The linker script only applies to the firmware target; host builds
    // (tests for the library crates) must stay untouched.
    let target = std::env::var("TARGET").unwrap_or_default();
    if target.starts_with("thumb") {
        println!(
            "cargo:rustc-link-search={}",
            std::env::var("CARGO_MANIFEST_DIR").unwrap()
        );
        println!("cargo:rustc-link-arg=-Tlayout.ld");
    }
    println!("cargo:rerun-if-changed=layout.ld");
}
