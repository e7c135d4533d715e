//! Build script for the `sdk-test` binary.
//!
//! Compiles the vendored OpenStorage SDK protobuf contract into tonic client
//! stubs and renders the man page from the clap definitions so the packaging
//! pipeline can pick it up from the build output directory.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const PROTO_FILE: &str = "proto/openstorage/api.proto";
const PROTO_INCLUDE: &str = "proto";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed={PROTO_FILE}")?;

    tonic_build::configure()
        .build_server(false)
        .compile(&[PROTO_FILE], &[PROTO_INCLUDE])?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let mut buffer = Vec::new();
    Man::new(Cli::command()).render(&mut buffer)?;

    let mut file = File::create(out_dir.join("sdk-test.1"))?;
    file.write_all(&buffer)?;

    Ok(())
}
