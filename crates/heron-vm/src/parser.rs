//! Script parsing
//!
//! Source text is parsed with `oxc_parser` and the arena-allocated oxc AST is
//! lowered into the owned tree in [`crate::ast`], which outlives the parse
//! allocator and can be shared by closures.

use crate::ast::*;
use crate::error::{VmError, VmResult};
use crate::value::format_number;
use oxc_allocator::Allocator;
use oxc_ast::ast as js;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use std::sync::Arc;

/// Parse a complete script
pub fn parse(source: &str) -> VmResult<Program> {
    let allocator = Allocator::default();
    let result = Parser::new(&allocator, source, SourceType::default()).parse();

    if let Some(error) = result.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        let (line, column) = line_column(source, offset);
        return Err(VmError::syntax_error(error.to_string(), line, column));
    }

    let lower = Lower { source };
    // a leading string literal statement is parsed as a directive
    let mut body: Vec<Stmt> = result
        .program
        .directives
        .iter()
        .map(|directive| Stmt::Expr(Expr::String(directive.expression.value.as_str().into())))
        .collect();
    for stmt in &result.program.body {
        body.push(lower.statement(stmt)?);
    }
    Ok(Program { body })
}

/// 1-based line and column of a byte offset
fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let prefix = source.get(..offset).unwrap_or(source);
    let line = prefix.matches('\n').count() + 1;
    let column = prefix
        .rsplit('\n')
        .next()
        .map_or(0, |tail| tail.chars().count())
        + 1;
    (line as u32, column as u32)
}

struct Lower<'s> {
    source: &'s str,
}

impl Lower<'_> {
    fn unsupported(&self, what: &str, span: Span) -> VmError {
        let (line, column) = line_column(self.source, span.start as usize);
        VmError::syntax_error(format!("Unsupported syntax: {}", what), line, column)
    }

    fn statement(&self, stmt: &js::Statement<'_>) -> VmResult<Stmt> {
        match stmt {
            js::Statement::ExpressionStatement(expr_stmt) => {
                Ok(Stmt::Expr(self.expression(&expr_stmt.expression)?))
            }
            js::Statement::VariableDeclaration(decl) => self.variable_declaration(decl),
            js::Statement::FunctionDeclaration(func) => {
                Ok(Stmt::Function(Arc::new(self.function(func, None)?)))
            }
            js::Statement::ReturnStatement(ret) => {
                let value = ret
                    .argument
                    .as_ref()
                    .map(|arg| self.expression(arg))
                    .transpose()?;
                Ok(Stmt::Return(value))
            }
            js::Statement::ThrowStatement(throw_stmt) => {
                Ok(Stmt::Throw(self.expression(&throw_stmt.argument)?))
            }
            js::Statement::IfStatement(if_stmt) => {
                let alternate = if_stmt
                    .alternate
                    .as_ref()
                    .map(|alt| self.statement(alt).map(Box::new))
                    .transpose()?;
                Ok(Stmt::If {
                    test: self.expression(&if_stmt.test)?,
                    consequent: Box::new(self.statement(&if_stmt.consequent)?),
                    alternate,
                })
            }
            js::Statement::BlockStatement(block) => Ok(Stmt::Block(self.statements(&block.body)?)),
            js::Statement::EmptyStatement(_) => Ok(Stmt::Empty),
            other => Err(self.unsupported("statement", other.span())),
        }
    }

    fn statements(&self, stmts: &[js::Statement<'_>]) -> VmResult<Vec<Stmt>> {
        stmts.iter().map(|stmt| self.statement(stmt)).collect()
    }

    fn variable_declaration(&self, decl: &js::VariableDeclaration<'_>) -> VmResult<Stmt> {
        let kind = match decl.kind {
            js::VariableDeclarationKind::Let => DeclKind::Let,
            js::VariableDeclarationKind::Const => DeclKind::Const,
            js::VariableDeclarationKind::Var => DeclKind::Var,
            _ => return Err(self.unsupported("using declaration", decl.span)),
        };
        let mut declarations = Vec::with_capacity(decl.declarations.len());
        for declarator in &decl.declarations {
            let js::BindingPattern::BindingIdentifier(ident) = &declarator.id else {
                return Err(self.unsupported("destructuring pattern", declarator.span));
            };
            let init = declarator
                .init
                .as_ref()
                .map(|init| self.expression(init))
                .transpose()?;
            declarations.push((ident.name.to_string(), init));
        }
        Ok(Stmt::Declare { kind, declarations })
    }

    fn parameters(
        &self,
        params: &js::FormalParameters<'_>,
    ) -> VmResult<(Vec<String>, Option<String>)> {
        let mut names = Vec::with_capacity(params.items.len());
        for param in &params.items {
            match &param.pattern {
                js::BindingPattern::BindingIdentifier(ident) => names.push(ident.name.to_string()),
                _ => return Err(self.unsupported("parameter pattern", param.span)),
            }
        }
        let rest = match &params.rest {
            Some(rest) => match &rest.rest.argument {
                js::BindingPattern::BindingIdentifier(ident) => Some(ident.name.to_string()),
                _ => return Err(self.unsupported("rest parameter pattern", params.span)),
            },
            None => None,
        };
        Ok((names, rest))
    }

    fn function(&self, func: &js::Function<'_>, name: Option<String>) -> VmResult<FunctionDef> {
        if func.r#async || func.generator {
            return Err(self.unsupported("async or generator function", func.span));
        }
        let (params, rest) = self.parameters(&func.params)?;
        let body = match &func.body {
            Some(body) => self.statements(&body.statements)?,
            None => Vec::new(),
        };
        Ok(FunctionDef {
            name: func.id.as_ref().map(|id| id.name.to_string()).or(name),
            params,
            rest,
            body: FunctionBody::Block(body),
            arrow: false,
        })
    }

    fn arrow(&self, arrow: &js::ArrowFunctionExpression<'_>) -> VmResult<FunctionDef> {
        if arrow.r#async {
            return Err(self.unsupported("async arrow function", arrow.span));
        }
        let (params, rest) = self.parameters(&arrow.params)?;
        let body = if arrow.expression {
            match arrow.body.statements.first() {
                Some(js::Statement::ExpressionStatement(expr_stmt)) => {
                    FunctionBody::Expr(Box::new(self.expression(&expr_stmt.expression)?))
                }
                _ => FunctionBody::Expr(Box::new(Expr::Undefined)),
            }
        } else {
            FunctionBody::Block(self.statements(&arrow.body.statements)?)
        };
        Ok(FunctionDef {
            name: None,
            params,
            rest,
            body,
            arrow: true,
        })
    }

    fn arguments(&self, args: &[js::Argument<'_>]) -> VmResult<Vec<Element>> {
        args.iter()
            .map(|arg| match arg {
                js::Argument::SpreadElement(spread) => Ok(Element {
                    spread: true,
                    expr: self.expression(&spread.argument)?,
                }),
                _ => Ok(Element {
                    spread: false,
                    expr: self.expression(arg.to_expression())?,
                }),
            })
            .collect()
    }

    fn property_key(&self, key: &js::PropertyKey<'_>) -> VmResult<String> {
        match key {
            js::PropertyKey::StaticIdentifier(ident) => Ok(ident.name.to_string()),
            js::PropertyKey::StringLiteral(lit) => Ok(lit.value.to_string()),
            js::PropertyKey::NumericLiteral(lit) => Ok(format_number(lit.value)),
            other => Err(self.unsupported("computed property key", other.span())),
        }
    }

    fn object(&self, obj: &js::ObjectExpression<'_>) -> VmResult<Expr> {
        let mut properties = Vec::with_capacity(obj.properties.len());
        for prop in &obj.properties {
            let js::ObjectPropertyKind::ObjectProperty(prop) = prop else {
                return Err(self.unsupported("object spread", obj.span));
            };
            if !matches!(prop.kind, js::PropertyKind::Init) {
                return Err(self.unsupported("accessor property", prop.span));
            }
            let key = self.property_key(&prop.key)?;
            let value = match &prop.value {
                js::Expression::FunctionExpression(func) if prop.method => {
                    Expr::Function(Arc::new(self.function(func, Some(key.clone()))?))
                }
                value => self.expression(value)?,
            };
            properties.push((key, value));
        }
        Ok(Expr::Object(properties))
    }

    fn array(&self, arr: &js::ArrayExpression<'_>) -> VmResult<Expr> {
        let mut elements = Vec::with_capacity(arr.elements.len());
        for elem in &arr.elements {
            let element = match elem {
                js::ArrayExpressionElement::SpreadElement(spread) => Element {
                    spread: true,
                    expr: self.expression(&spread.argument)?,
                },
                js::ArrayExpressionElement::Elision(_) => Element {
                    spread: false,
                    expr: Expr::Undefined,
                },
                _ => Element {
                    spread: false,
                    expr: self.expression(elem.to_expression())?,
                },
            };
            elements.push(element);
        }
        Ok(Expr::Array(elements))
    }

    fn member(&self, object: &js::Expression<'_>, key: MemberKey) -> VmResult<Expr> {
        Ok(Expr::Member {
            object: Box::new(self.expression(object)?),
            key,
        })
    }

    fn assignment(&self, assign: &js::AssignmentExpression<'_>) -> VmResult<Expr> {
        let op = match assign.operator {
            js::AssignmentOperator::Assign => AssignOp::Assign,
            js::AssignmentOperator::Addition => AssignOp::Add,
            js::AssignmentOperator::Subtraction => AssignOp::Sub,
            _ => return Err(self.unsupported("assignment operator", assign.span)),
        };
        let target = match &assign.left {
            js::AssignmentTarget::AssignmentTargetIdentifier(ident) => {
                Expr::Ident(ident.name.to_string())
            }
            js::AssignmentTarget::StaticMemberExpression(member) => self.member(
                &member.object,
                MemberKey::Named(member.property.name.to_string()),
            )?,
            js::AssignmentTarget::ComputedMemberExpression(member) => self.member(
                &member.object,
                MemberKey::Computed(Box::new(self.expression(&member.expression)?)),
            )?,
            _ => return Err(self.unsupported("assignment target", assign.span)),
        };
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(self.expression(&assign.right)?),
        })
    }

    fn unary(&self, unary: &js::UnaryExpression<'_>) -> VmResult<Expr> {
        let op = match unary.operator {
            js::UnaryOperator::LogicalNot => UnaryOp::Not,
            js::UnaryOperator::UnaryNegation => UnaryOp::Neg,
            js::UnaryOperator::UnaryPlus => UnaryOp::Plus,
            js::UnaryOperator::Typeof => UnaryOp::TypeOf,
            js::UnaryOperator::Delete => UnaryOp::Delete,
            _ => return Err(self.unsupported("unary operator", unary.span)),
        };
        Ok(Expr::Unary {
            op,
            expr: Box::new(self.expression(&unary.argument)?),
        })
    }

    fn binary(&self, binary: &js::BinaryExpression<'_>) -> VmResult<Expr> {
        let op = match binary.operator {
            js::BinaryOperator::Addition => BinaryOp::Add,
            js::BinaryOperator::Subtraction => BinaryOp::Sub,
            js::BinaryOperator::Multiplication => BinaryOp::Mul,
            js::BinaryOperator::Division => BinaryOp::Div,
            js::BinaryOperator::Remainder => BinaryOp::Rem,
            js::BinaryOperator::Equality => BinaryOp::Eq,
            js::BinaryOperator::Inequality => BinaryOp::NotEq,
            js::BinaryOperator::StrictEquality => BinaryOp::StrictEq,
            js::BinaryOperator::StrictInequality => BinaryOp::StrictNotEq,
            js::BinaryOperator::LessThan => BinaryOp::Lt,
            js::BinaryOperator::GreaterThan => BinaryOp::Gt,
            js::BinaryOperator::LessEqualThan => BinaryOp::LtEq,
            js::BinaryOperator::GreaterEqualThan => BinaryOp::GtEq,
            js::BinaryOperator::In => BinaryOp::In,
            _ => return Err(self.unsupported("binary operator", binary.span)),
        };
        Ok(Expr::Binary {
            op,
            left: Box::new(self.expression(&binary.left)?),
            right: Box::new(self.expression(&binary.right)?),
        })
    }

    /// Template literals become left-to-right string concatenation
    fn template(&self, template: &js::TemplateLiteral<'_>) -> VmResult<Expr> {
        let mut result = Expr::String("".into());
        for (index, quasi) in template.quasis.iter().enumerate() {
            let Some(cooked) = quasi.value.cooked.as_ref() else {
                return Err(self.unsupported("invalid escape in template", quasi.span));
            };
            if !cooked.is_empty() {
                result = concat(result, Expr::String(cooked.as_str().into()));
            }
            if let Some(expr) = template.expressions.get(index) {
                result = concat(result, self.expression(expr)?);
            }
        }
        Ok(result)
    }

    fn expression(&self, expr: &js::Expression<'_>) -> VmResult<Expr> {
        match expr {
            js::Expression::NumericLiteral(lit) => Ok(Expr::Number(lit.value)),
            js::Expression::StringLiteral(lit) => Ok(Expr::String(lit.value.as_str().into())),
            js::Expression::BooleanLiteral(lit) => Ok(Expr::Bool(lit.value)),
            js::Expression::NullLiteral(_) => Ok(Expr::Null),
            js::Expression::TemplateLiteral(template) => self.template(template),
            js::Expression::Identifier(ident) if ident.name.as_str() == "undefined" => Ok(Expr::Undefined),
            js::Expression::Identifier(ident) => Ok(Expr::Ident(ident.name.to_string())),
            js::Expression::ThisExpression(_) => Ok(Expr::This),
            js::Expression::ArrayExpression(arr) => self.array(arr),
            js::Expression::ObjectExpression(obj) => self.object(obj),
            js::Expression::FunctionExpression(func) => {
                Ok(Expr::Function(Arc::new(self.function(func, None)?)))
            }
            js::Expression::ArrowFunctionExpression(arrow) => {
                Ok(Expr::Function(Arc::new(self.arrow(arrow)?)))
            }
            js::Expression::StaticMemberExpression(member) if !member.optional => self.member(
                &member.object,
                MemberKey::Named(member.property.name.to_string()),
            ),
            js::Expression::ComputedMemberExpression(member) if !member.optional => self.member(
                &member.object,
                MemberKey::Computed(Box::new(self.expression(&member.expression)?)),
            ),
            js::Expression::CallExpression(call) if !call.optional => Ok(Expr::Call {
                callee: Box::new(self.expression(&call.callee)?),
                args: self.arguments(&call.arguments)?,
            }),
            js::Expression::NewExpression(new_expr) => Ok(Expr::New {
                callee: Box::new(self.expression(&new_expr.callee)?),
                args: self.arguments(&new_expr.arguments)?,
            }),
            js::Expression::AssignmentExpression(assign) => self.assignment(assign),
            js::Expression::UnaryExpression(unary) => self.unary(unary),
            js::Expression::BinaryExpression(binary) => self.binary(binary),
            js::Expression::LogicalExpression(logical) => {
                let op = match logical.operator {
                    js::LogicalOperator::And => LogicalOp::And,
                    js::LogicalOperator::Or => LogicalOp::Or,
                    js::LogicalOperator::Coalesce => LogicalOp::Coalesce,
                };
                Ok(Expr::Logical {
                    op,
                    left: Box::new(self.expression(&logical.left)?),
                    right: Box::new(self.expression(&logical.right)?),
                })
            }
            js::Expression::ConditionalExpression(cond) => Ok(Expr::Conditional {
                test: Box::new(self.expression(&cond.test)?),
                consequent: Box::new(self.expression(&cond.consequent)?),
                alternate: Box::new(self.expression(&cond.alternate)?),
            }),
            js::Expression::ParenthesizedExpression(paren) => self.expression(&paren.expression),
            other => Err(self.unsupported("expression", other.span())),
        }
    }
}

fn concat(left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op: BinaryOp::Add,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_with_rest() {
        let program = parse("(separator, ...strings) => [...strings].join(separator)").unwrap();
        let Stmt::Expr(Expr::Function(def)) = &program.body[0] else {
            panic!("expected arrow function");
        };
        assert!(def.arrow);
        assert_eq!(def.params, vec!["separator"]);
        assert_eq!(def.rest.as_deref(), Some("strings"));
    }

    #[test]
    fn test_new_binds_tighter_than_member_call() {
        let program = parse("new StringBuilder('abc').append(' ')").unwrap();
        let Stmt::Expr(Expr::Call { callee, .. }) = &program.body[0] else {
            panic!("expected call");
        };
        let Expr::Member { object, .. } = callee.as_ref() else {
            panic!("expected member");
        };
        assert!(matches!(object.as_ref(), Expr::New { .. }));
    }

    #[test]
    fn test_statements_without_semicolons() {
        let program = parse("function main() {\n  return 1\n}\nmain()").unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[0], Stmt::Function(_)));
    }

    #[test]
    fn test_object_literal_forms() {
        let program = parse("({ hello: () => 'hello', x, 'y': 2, m(a) { return a } })").unwrap();
        let Stmt::Expr(Expr::Object(props)) = &program.body[0] else {
            panic!("expected object literal");
        };
        let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["hello", "x", "y", "m"]);
        let Expr::Function(method) = &props[3].1 else {
            panic!("expected method");
        };
        assert_eq!(method.name.as_deref(), Some("m"));
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3 === 7 && true").unwrap();
        assert!(matches!(
            program.body[0],
            Stmt::Expr(Expr::Logical {
                op: LogicalOp::And,
                ..
            })
        ));
    }

    #[test]
    fn test_leading_string_is_an_expression() {
        let program = parse("'hello'").unwrap();
        assert!(matches!(&program.body[0], Stmt::Expr(Expr::String(s)) if &**s == "hello"));
    }

    #[test]
    fn test_template_literal() {
        let program = parse("`a${x}b`").unwrap();
        assert!(matches!(
            program.body[0],
            Stmt::Expr(Expr::Binary { op: BinaryOp::Add, .. })
        ));
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        assert!(matches!(parse("1 = 2"), Err(VmError::SyntaxError { .. })));
        assert!(matches!(parse("a b"), Err(VmError::SyntaxError { .. })));
        let Err(VmError::SyntaxError { line, .. }) = parse("let ok = 1\nlet = ;") else {
            panic!("expected syntax error");
        };
        assert_eq!(line, 2);
    }

    #[test]
    fn test_unsupported_syntax() {
        assert!(matches!(
            parse("for (;;) {}"),
            Err(VmError::SyntaxError { message, .. }) if message.contains("Unsupported")
        ));
    }
}
