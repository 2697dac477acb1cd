// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read an IGES file and write it back out as `roundtrip_out.igs`.
//!
//! Unsupported entities are culled and every defect found on the way in is
//! printed; the diagnostics usually hint at what a corrupt file got wrong.

use iges_lite_core::Model;

const OUT: &str = "roundtrip_out.igs";

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: roundtrip <model.igs>");
        std::process::exit(1);
    };

    let (mut model, warnings) = match Model::read(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("could not read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    for w in &warnings {
        eprintln!("warning: {}", w);
    }
    println!(
        "loaded {} entities ({} warnings)",
        model.len(),
        warnings.len()
    );

    match model.write(OUT, true) {
        Ok(()) => println!("wrote {}", OUT),
        Err(e) => {
            eprintln!("could not write {}: {}", OUT, e);
            std::process::exit(1);
        }
    }
}
