//! Parenthesized rendering of the AST, used by `--ast` and by parser tests.

use crate::{ast, value::format_number};

pub fn print_expr(expr: &ast::Expr) -> String {
    match expr {
        ast::Expr::Lit(lit) => match &lit.value {
            ast::LitValue::Nil => "nil".to_string(),
            ast::LitValue::Bool(boolean) => boolean.to_string(),
            ast::LitValue::Number(number) => format_number(*number),
            ast::LitValue::String(string) => format!("{:?}", string),
        },
        ast::Expr::Grouping(grouping) => format!("(group {})", print_expr(&grouping.expr)),
        ast::Expr::Unary(unary) => format!("({} {})", unary.op.lexeme, print_expr(&unary.expr)),
        ast::Expr::Binary(binary) => format!(
            "({} {} {})",
            print_expr(&binary.left),
            binary.op.lexeme,
            print_expr(&binary.right)
        ),
        ast::Expr::Logical(logical) => format!(
            "({} {} {})",
            print_expr(&logical.left),
            logical.op.lexeme,
            print_expr(&logical.right)
        ),
        ast::Expr::Var(var) => var.ident.lexeme.clone(),
        ast::Expr::Assign(assign) => {
            format!("(= {} {})", assign.ident.lexeme, print_expr(&assign.value))
        }
        ast::Expr::Call(call) => {
            let mut text = format!("(call {}", print_expr(&call.callee));
            for arg in &call.args {
                text.push(' ');
                text.push_str(&print_expr(arg));
            }
            text.push(')');
            text
        }
    }
}

pub fn print_stmt(stmt: &ast::Stmt) -> String {
    match stmt {
        ast::Stmt::Expr(expr_stmt) => format!("(; {})", print_expr(&expr_stmt.expr)),
        ast::Stmt::Print(print) => format!("(print {})", print_expr(&print.expr)),
        ast::Stmt::VarDecl(var_decl) => match &var_decl.init {
            Some(init) => format!("(var {} = {})", var_decl.ident.lexeme, print_expr(init)),
            None => format!("(var {})", var_decl.ident.lexeme),
        },
        ast::Stmt::Block(block) => parenthesize("block", &block.stmts),
        ast::Stmt::If(if_stmt) => {
            let mut text = format!(
                "(if {} {}",
                print_expr(&if_stmt.condition),
                print_stmt(&if_stmt.then_branch)
            );
            if let Some(else_branch) = &if_stmt.else_branch {
                text.push(' ');
                text.push_str(&print_stmt(else_branch));
            }
            text.push(')');
            text
        }
        ast::Stmt::While(while_stmt) => format!(
            "(while {} {})",
            print_expr(&while_stmt.condition),
            print_stmt(&while_stmt.body)
        ),
        ast::Stmt::Fun(fun_decl) => {
            let parameters = fun_decl
                .parameters
                .iter()
                .map(|param| param.lexeme.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            parenthesize(
                &format!("fun {}({})", fun_decl.ident.lexeme, parameters),
                &fun_decl.body,
            )
        }
        ast::Stmt::Return(return_stmt) => match &return_stmt.value {
            Some(value) => format!("(return {})", print_expr(value)),
            None => "(return)".to_string(),
        },
    }
}

fn parenthesize(name: &str, stmts: &[ast::Stmt]) -> String {
    let mut text = format!("({}", name);
    for stmt in stmts {
        text.push(' ');
        text.push_str(&print_stmt(stmt));
    }
    text.push(')');
    text
}
