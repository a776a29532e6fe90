fn main() {
    // The RPC service is described by hand; message types live in
    // `src/transport/rpc/pb.rs` as prost derives, so no `.proto` file or
    // `protoc` is needed.
    let method = |name: &str, route: &str, input: &str| {
        tonic_build::manual::Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::transport::rpc::pb::{input}"))
            .output_type("crate::transport::rpc::pb::UserResponse")
            .codec_path("tonic::codec::ProstCodec")
            .build()
    };

    let service = tonic_build::manual::Service::builder()
        .name("UserService")
        .package("pb")
        .method(method("create_user", "CreateUser", "CreateRequest"))
        .method(method("get_user", "GetUser", "GetRequest"))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
