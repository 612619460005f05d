fn main() -> Result<(), Box<dyn std::error::Error>> {
    for proto in [
        "proto/group.proto",
        "proto/environment.proto",
        "proto/deployable.proto",
        "proto/config.proto",
        "proto/vector.proto",
        "proto/deployment.proto",
        "proto/health.proto",
    ] {
        tonic_build::compile_protos(proto)?;
    }

    Ok(())
}
