use crate::expr::types::{CompareOp, EvalError, Expr, ExprValue, Operand, ValuePath};
use crate::variable::VariableResolver;

/// 符号运算符，按匹配优先级排列
const SYMBOL_OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

/// 解析表达式
///
/// 支持的格式：
/// - `true` / `false`
/// - `logged_in`（已绑定的变量）
/// - `user.id > 0`
/// - `user.name == "alice"`
/// - `message contains "ok"`
/// - `token exists`
pub fn parse_expr(input: &str) -> Result<Expr, EvalError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EvalError::InvalidSyntax("Expression is empty".to_string()));
    }

    // exists 断言
    if let Some(path_str) = input
        .strip_suffix("exists")
        .filter(|rest| rest.ends_with(char::is_whitespace))
    {
        let path_str = path_str.trim();
        if !VariableResolver::is_variable_name(path_str) {
            return Err(EvalError::InvalidSyntax(format!(
                "Invalid path before 'exists': {}",
                path_str
            )));
        }
        return Ok(Expr::Exists(ValuePath::parse(path_str)));
    }

    let Some((op_pos, op_str)) = find_operator(input) else {
        return Ok(Expr::Value(parse_operand(input)?));
    };

    let op = CompareOp::parse(op_str)
        .ok_or_else(|| EvalError::InvalidOperator(format!("Invalid operator: {}", op_str)))?;

    let left_str = input[..op_pos].trim();
    let right_str = input[op_pos + op_str.len()..].trim();

    if left_str.is_empty() {
        return Err(EvalError::InvalidSyntax(
            "Left side of expression is empty".to_string(),
        ));
    }

    if right_str.is_empty() {
        return Err(EvalError::InvalidSyntax(
            "Right side of expression is empty".to_string(),
        ));
    }

    Ok(Expr::Compare {
        left: parse_operand(left_str)?,
        op,
        right: parse_operand(right_str)?,
    })
}

/// 查找第一个不在引号内的运算符
fn find_operator(input: &str) -> Option<(usize, &'static str)> {
    let mut quote: Option<char> = None;

    for (pos, ch) in input.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
            continue;
        }

        let rest = &input[pos..];
        if let Some(op) = SYMBOL_OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            return Some((pos, *op));
        }
        if ch.is_whitespace() && rest[ch.len_utf8()..].starts_with("contains ") {
            return Some((pos + ch.len_utf8(), "contains"));
        }
    }

    None
}

/// 解析字面量或变量路径
fn parse_operand(input: &str) -> Result<Operand, EvalError> {
    if let Some(value) = parse_literal(input) {
        return Ok(Operand::Literal(value));
    }

    if VariableResolver::is_variable_name(input) {
        return Ok(Operand::Path(ValuePath::parse(input)));
    }

    Err(EvalError::InvalidSyntax(format!(
        "Expected a literal or variable name, found: {}",
        input
    )))
}

fn parse_literal(input: &str) -> Option<ExprValue> {
    match input {
        "null" => return Some(ExprValue::Null),
        "true" => return Some(ExprValue::Bool(true)),
        "false" => return Some(ExprValue::Bool(false)),
        _ => {}
    }

    // 字符串（带引号）
    if input.len() >= 2
        && ((input.starts_with('"') && input.ends_with('"'))
            || (input.starts_with('\'') && input.ends_with('\'')))
    {
        return Some(ExprValue::String(input[1..input.len() - 1].to_string()));
    }

    input.parse::<f64>().ok().map(ExprValue::Number)
}
