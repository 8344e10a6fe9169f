pub mod tensor;
pub mod slice;

pub use tensor::{Shape4, Tensor4};
pub use slice::Slice2;
