//! Post-order type visitation over declaration payloads, statements and
//! expressions. Both type resolution and template substitution rewrite
//! `Type` nodes in place through the same walk.

use ghoul_ast::{CompoundStmt, Cont, DeclKind, Expr, ExprKind, Stmt, Type, TypeKind};

use crate::error::SemaError;

pub(crate) type TypeVisitor<'f> = dyn FnMut(&mut Type) -> Result<(), SemaError> + 'f;

pub(crate) fn visit_type(ty: &mut Type, f: &mut TypeVisitor<'_>) -> Result<(), SemaError> {
    match &mut ty.kind {
        TypeKind::Dimension { element, .. } => visit_type(element, f)?,
        TypeKind::FlatArray { element, length } => {
            visit_type(element, f)?;
            visit_expr(length, f)?;
        }
        TypeKind::FunctionPointer {
            params,
            return_type,
        } => {
            for param in params.iter_mut() {
                visit_type(param, f)?;
            }
            visit_type(return_type, f)?;
        }
        TypeKind::Pointer(inner)
        | TypeKind::Reference(inner)
        | TypeKind::RValueReference(inner)
        | TypeKind::Dependent(inner) => visit_type(inner, f)?,
        TypeKind::Labeled { ty: inner, .. } => visit_type(inner, f)?,
        TypeKind::Templated { args, .. }
        | TypeKind::Unresolved { args, .. } => {
            for arg in args.iter_mut() {
                visit_expr(arg, f)?;
            }
        }
        TypeKind::UnresolvedNested {
            container, args, ..
        } => {
            visit_type(container, f)?;
            for arg in args.iter_mut() {
                visit_expr(arg, f)?;
            }
        }
        TypeKind::BuiltIn(_)
        | TypeKind::Enum(_)
        | TypeKind::Struct(_)
        | TypeKind::Trait(_)
        | TypeKind::TemplateStruct(_)
        | TypeKind::TemplateTrait(_)
        | TypeKind::Alias(_)
        | TypeKind::SelfType
        | TypeKind::TemplateTypenameRef(_)
        | TypeKind::Imaginary(_)
        | TypeKind::VTable => {}
    }

    f(ty)
}

pub(crate) fn visit_expr(expr: &mut Expr, f: &mut TypeVisitor<'_>) -> Result<(), SemaError> {
    match &mut expr.kind {
        ExprKind::Literal(_)
        | ExprKind::LocalVariableRef { .. }
        | ExprKind::ParameterRef { .. }
        | ExprKind::VariableRef(_)
        | ExprKind::EnumConstRef(_)
        | ExprKind::CurrentSelf
        | ExprKind::FunctionRef(_) => {}
        ExprKind::Identifier { template_args, .. } => {
            for arg in template_args.iter_mut() {
                visit_expr(arg, f)?;
            }
        }
        ExprKind::Paren(inner)
        | ExprKind::Try(inner)
        | ExprKind::ImplicitDeref(inner)
        | ExprKind::LValueToRValue(inner) => visit_expr(inner, f)?,
        ExprKind::Prefix { expr: inner, .. } | ExprKind::Postfix { expr: inner, .. } => {
            visit_expr(inner, f)?
        }
        ExprKind::Infix { left, right, .. } => {
            visit_expr(left, f)?;
            visit_expr(right, f)?;
        }
        ExprKind::Assign { target, value, .. } => {
            visit_expr(target, f)?;
            visit_expr(value, f)?;
        }
        ExprKind::Ternary {
            condition,
            if_true,
            if_false,
        } => {
            visit_expr(condition, f)?;
            visit_expr(if_true, f)?;
            visit_expr(if_false, f)?;
        }
        ExprKind::As { expr: inner, target } | ExprKind::Is { expr: inner, target } => {
            visit_expr(inner, f)?;
            visit_type(target, f)?;
        }
        ExprKind::Has { expr: inner, .. } => visit_expr(inner, f)?,
        ExprKind::CheckExtendsType { check, extends } => {
            visit_type(check, f)?;
            visit_type(extends, f)?;
        }
        ExprKind::Ref { expr: inner, .. } => visit_expr(inner, f)?,
        ExprKind::ArrayLiteral(elements) => {
            for element in elements.iter_mut() {
                visit_expr(element, f)?;
            }
        }
        ExprKind::VariableDecl {
            declared_type,
            initializer,
            ..
        } => {
            if let Some(ty) = declared_type {
                visit_type(ty, f)?;
            }
            if let Some(init) = initializer {
                visit_expr(init, f)?;
            }
        }
        ExprKind::FunctionCall { callee, args } => {
            visit_expr(callee, f)?;
            for arg in args.iter_mut() {
                visit_expr(&mut arg.value, f)?;
            }
        }
        ExprKind::SubscriptCall { target, args } => {
            visit_expr(target, f)?;
            for arg in args.iter_mut() {
                visit_expr(&mut arg.value, f)?;
            }
        }
        ExprKind::MemberAccess {
            object,
            template_args,
            ..
        } => {
            visit_expr(object, f)?;
            for arg in template_args.iter_mut() {
                visit_expr(arg, f)?;
            }
        }
        ExprKind::Type(ty) => visit_type(ty, f)?,
        ExprKind::MemberVariableRef { object, .. } => visit_expr(object, f)?,
        ExprKind::ConstructorCall { args, .. } => {
            for arg in args.iter_mut() {
                visit_expr(&mut arg.value, f)?;
            }
        }
        ExprKind::MemberFunctionCall { object, args, .. }
        | ExprKind::CallOperatorRef { object, args, .. } => {
            visit_expr(object, f)?;
            for arg in args.iter_mut() {
                visit_expr(&mut arg.value, f)?;
            }
        }
        ExprKind::VTableFunctionRef { object, .. } => visit_expr(object, f)?,
        ExprKind::ImplicitCast { to, expr: inner } => {
            visit_type(to, f)?;
            visit_expr(inner, f)?;
        }
    }

    if let Some(value_type) = &mut expr.value_type {
        visit_type(value_type, f)?;
    }

    Ok(())
}

pub(crate) fn visit_stmt(stmt: &mut Stmt, f: &mut TypeVisitor<'_>) -> Result<(), SemaError> {
    match stmt {
        Stmt::Compound(compound) => visit_compound(compound, f)?,
        Stmt::If(if_stmt) => {
            visit_expr(&mut if_stmt.condition, f)?;
            visit_compound(&mut if_stmt.then_block, f)?;
            if let Some(else_block) = &mut if_stmt.else_block {
                visit_stmt(else_block, f)?;
            }
        }
        Stmt::While(while_stmt) => {
            visit_expr(&mut while_stmt.condition, f)?;
            visit_compound(&mut while_stmt.body, f)?;
        }
        Stmt::RepeatWhile(repeat) => {
            visit_compound(&mut repeat.body, f)?;
            visit_expr(&mut repeat.condition, f)?;
        }
        Stmt::For(for_stmt) => {
            if let Some(init) = &mut for_stmt.init {
                visit_expr(init, f)?;
            }
            if let Some(condition) = &mut for_stmt.condition {
                visit_expr(condition, f)?;
            }
            if let Some(iteration) = &mut for_stmt.iteration {
                visit_expr(iteration, f)?;
            }
            visit_compound(&mut for_stmt.body, f)?;
        }
        Stmt::Switch(switch) => {
            visit_expr(&mut switch.condition, f)?;
            for case in &mut switch.cases {
                if let Some(condition) = &mut case.condition {
                    visit_expr(condition, f)?;
                }
                for stmt in &mut case.body {
                    visit_stmt(stmt, f)?;
                }
            }
        }
        Stmt::Do(do_stmt) => visit_compound(&mut do_stmt.body, f)?,
        Stmt::DoCatch(do_catch) => {
            visit_compound(&mut do_catch.body, f)?;
            for catch in &mut do_catch.catches {
                if let Some(exception_type) = &mut catch.exception_type {
                    visit_type(exception_type, f)?;
                }
                visit_compound(&mut catch.body, f)?;
            }
            if let Some(finally) = &mut do_catch.finally {
                visit_compound(finally, f)?;
            }
        }
        Stmt::Labeled(labeled) => visit_stmt(&mut labeled.stmt, f)?,
        Stmt::Return(ret) => {
            if let Some(value) = &mut ret.value {
                visit_expr(value, f)?;
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Goto(_) | Stmt::Fallthrough(_) => {}
        Stmt::Expr(expr) => visit_expr(expr, f)?,
    }
    Ok(())
}

pub(crate) fn visit_compound(
    compound: &mut CompoundStmt,
    f: &mut TypeVisitor<'_>,
) -> Result<(), SemaError> {
    for stmt in &mut compound.stmts {
        visit_stmt(stmt, f)?;
    }
    for temporary in &mut compound.temporaries {
        visit_type(&mut temporary.ty, f)?;
    }
    Ok(())
}

pub(crate) fn visit_cont(cont: &mut Cont, f: &mut TypeVisitor<'_>) -> Result<(), SemaError> {
    match cont {
        Cont::Requires(requires) => visit_expr(&mut requires.condition, f),
        Cont::Ensures(ensures) => visit_expr(&mut ensures.condition, f),
        Cont::Throws(_) => Ok(()),
        Cont::Where(where_cont) => visit_expr(&mut where_cont.condition, f),
    }
}

/// Visits every type owned directly by the declaration payload. Child
/// declarations referenced by id are not followed; passes walk those
/// themselves.
pub(crate) fn visit_decl_kind(
    kind: &mut DeclKind,
    f: &mut TypeVisitor<'_>,
) -> Result<(), SemaError> {
    match kind {
        DeclKind::Import(_) | DeclKind::Namespace(_) => Ok(()),
        DeclKind::Function(func)
        | DeclKind::CallOperator(func)
        | DeclKind::Destructor(func)
        | DeclKind::TypeSuffix(func) => visit_function(func, f),
        DeclKind::TemplateFunction(template) => visit_function(&mut template.func, f),
        DeclKind::Operator(op) => visit_function(&mut op.func, f),
        DeclKind::CastOperator(cast) => {
            visit_type(&mut cast.target_type, f)?;
            visit_function(&mut cast.func, f)
        }
        DeclKind::Property(property) => visit_type(&mut property.property_type, f),
        DeclKind::PropertyGet(accessor)
        | DeclKind::PropertySet(accessor)
        | DeclKind::SubscriptGet(accessor)
        | DeclKind::SubscriptSet(accessor) => visit_function(&mut accessor.func, f),
        DeclKind::Subscript(subscript) => visit_type(&mut subscript.element_type, f),
        DeclKind::Constructor(ctor) => {
            if let Some(base_call) = &mut ctor.base_call {
                visit_expr(base_call, f)?;
            }
            visit_function(&mut ctor.func, f)
        }
        DeclKind::Struct(def) => visit_struct(def, f),
        DeclKind::TemplateStruct(template) => visit_struct(&mut template.def, f),
        DeclKind::Trait(def) => visit_trait(def, f),
        DeclKind::TemplateTrait(template) => visit_trait(&mut template.def, f),
        DeclKind::Extension(ext) => {
            visit_type(&mut ext.target, f)?;
            for inherited in &mut ext.inherited {
                visit_type(inherited, f)?;
            }
            Ok(())
        }
        DeclKind::TypeAlias(alias) => visit_type(&mut alias.value, f),
        DeclKind::Enum(def) => {
            if let Some(underlying) = &mut def.underlying {
                visit_type(underlying, f)?;
            }
            Ok(())
        }
        DeclKind::EnumConst(c) => {
            if let Some(value) = &mut c.value {
                visit_expr(value, f)?;
            }
            Ok(())
        }
        DeclKind::Variable(var) => {
            if let Some(var_type) = &mut var.var_type {
                visit_type(var_type, f)?;
            }
            if let Some(initializer) = &mut var.initializer {
                visit_expr(initializer, f)?;
            }
            Ok(())
        }
        DeclKind::Parameter(param) => {
            visit_type(&mut param.param_type, f)?;
            if let Some(default_value) = &mut param.default_value {
                visit_expr(default_value, f)?;
            }
            Ok(())
        }
        DeclKind::TemplateParameter(param) => {
            if let Some(ty) = &mut param.ty {
                visit_type(ty, f)?;
            }
            if let Some(default_value) = &mut param.default_value {
                visit_expr(default_value, f)?;
            }
            Ok(())
        }
        DeclKind::TraitPrototype(proto) => visit_type(&mut proto.trait_type, f),
    }
}

fn visit_function(
    func: &mut ghoul_ast::FunctionDecl,
    f: &mut TypeVisitor<'_>,
) -> Result<(), SemaError> {
    if let Some(return_type) = &mut func.return_type {
        visit_type(return_type, f)?;
    }
    if let Some(self_type) = &mut func.self_type {
        visit_type(self_type, f)?;
    }
    for cont in &mut func.contracts {
        visit_cont(cont, f)?;
    }
    visit_compound(&mut func.body, f)
}

fn visit_struct(def: &mut ghoul_ast::StructDecl, f: &mut TypeVisitor<'_>) -> Result<(), SemaError> {
    for inherited in &mut def.inherited {
        visit_type(inherited, f)?;
    }
    for inherited in &mut def.all_inherited {
        visit_type(inherited, f)?;
    }
    for cont in &mut def.contracts {
        visit_cont(cont, f)?;
    }
    Ok(())
}

fn visit_trait(def: &mut ghoul_ast::TraitDecl, f: &mut TypeVisitor<'_>) -> Result<(), SemaError> {
    for inherited in &mut def.inherited {
        visit_type(inherited, f)?;
    }
    for inherited in &mut def.all_inherited {
        visit_type(inherited, f)?;
    }
    for cont in &mut def.contracts {
        visit_cont(cont, f)?;
    }
    Ok(())
}
