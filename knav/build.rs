use std::io::Write;
use std::{env, fs};

fn main() {
    let outdir = env::var("OUT_DIR").unwrap();
    let outfile = format!("{}/timestamp.txt", outdir);

    let mut fh = fs::File::create(&outfile).unwrap();
    write!(fh, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z")).ok();

    println!("cargo:rerun-if-changed=build.rs");
}
