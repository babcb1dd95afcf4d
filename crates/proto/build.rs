//! Generates the message types and gRPC clients for the backend services.
//!
//! The `.proto` files live in `crates/proto/proto`, one per protobuf package. Only clients
//! are generated; the workers never serve these APIs.

use std::path::Path;

const PROTOS: &[&str] = &[
    "auth.proto",
    "directory.proto",
    "events.proto",
    "excomms.proto",
    "threading.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let proto_root = manifest_dir.join("proto");

    let proto_files = PROTOS
        .iter()
        .map(|name| proto_root.join(name))
        .collect::<Vec<_>>();
    if let Some(missing) = proto_files.iter().find(|p| !p.exists()) {
        return Err(format!("proto file not found: {}", missing.display()).into());
    }

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&proto_files, &[proto_root.as_path()])?;

    for proto_file in &proto_files {
        println!("cargo:rerun-if-changed={}", proto_file.display());
    }
    Ok(())
}
