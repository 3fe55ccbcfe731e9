//! Generate the job distributor client types from the protobuf definitions under `proto/`.
//!
//! The generated code is checked into the `cre-proto` crate. Run from the repo root.

use std::path::PathBuf;

const PROTO_CRATE_SRC: &str = "crates/proto/src";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(PROTO_CRATE_SRC);

    tonic_build::configure()
        .build_server(false)
        .out_dir(out_dir)
        .compile_protos(
            &[
                "proto/api/shared/ptypes/label.proto",
                "proto/api/node/v1/node.proto",
                "proto/api/job/v1/job.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
