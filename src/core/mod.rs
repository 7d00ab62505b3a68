pub mod error;
pub mod value;

pub use error::{DbError, Result, TxError, TxResult};
pub use value::Value;

pub type Row = Vec<Value>;
