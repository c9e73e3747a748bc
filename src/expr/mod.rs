/// 表达式模块 - 条件判断与表达式断言
mod evaluator;
mod parser;
mod types;

pub use evaluator::{Evaluator, SimpleEvaluator, evaluate};
pub use parser::parse_expr;
pub use types::{CompareOp, EvalError, Expr, ExprValue, Operand, ValuePath};
