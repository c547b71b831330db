mod crossentropy;
mod loss_fn;
mod mse;

pub use crossentropy::CategoricalCrossentropy;
pub use loss_fn::{LossFn, LossKind};
pub use mse::Mse;
