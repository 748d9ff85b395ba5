//! 脑部MRI四模态体数据的预处理、分割推理与结果打包。

pub mod error;
pub mod infer;
pub mod pack;
pub mod pipeline;
pub mod prelude;
pub mod prep;
pub mod view;

pub use error::{Error, Result};
