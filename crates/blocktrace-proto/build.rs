//! Build script for generating the ledger gRPC client and server.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/ledger.proto");
    println!("cargo:rerun-if-env-changed=PROTOC");

    // Fall back to the vendored compiler when no system protoc is configured
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_prost_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/ledger.proto"], &["proto"])?;

    Ok(())
}
