mod deepnet;
mod lenet;

pub use deepnet::{DeepNet, transfer_head};
pub use lenet::LeNet;
