//! Conditions, their compiled native form, and in-memory evaluation.

pub mod telemetry;

mod compile;
mod cond;
pub(crate) mod eval;
mod parse;
pub(crate) mod types;

pub use compile::compile;
pub use cond::{Cond, Op};
pub use eval::{compare_bson, eval_filter};
pub use parse::parse_filter_doc;
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, Order, Projection, SortSpec, UpdateDoc, UpdateReport,
};
