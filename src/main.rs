// This binary crate is intentionally minimal.
// All loss-layer logic lives in the library (src/lib.rs and its modules).
// Run the demo with:
//   cargo run --example keypoint
fn main() {
    println!("hematite: a heatmap regression loss layer in Rust.");
    println!("Run `cargo run --example keypoint` to see the demo.");
}
