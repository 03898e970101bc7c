use std::collections::HashSet;

use ghoul_ast::{
    AsgContext, BuiltInKind, CompoundStmt, Cont, DeclId, DeclKind, Expr, ExprKind, FileId,
    GetResult, InfixOperator, LabeledArgument, Literal, LiteralKind, OperatorKind,
    PostfixOperator, PrefixOperator, Span, Stmt, TemplateParameterKind, TemporaryValue, Type,
    TypeKind, TypeQualifier, UNLABELED,
};
use tracing::debug;

use crate::decl_instantiator::DeclInstantiator;
use crate::error::SemaError;
use crate::lookup::{expr_as_dotted_name, expr_to_unresolved_type, NameLookup};
use crate::namespace_prototyper::NamespaceProto;
use crate::signatures::{ArgMatchResult, SignatureComparer};
use crate::target::Target;
use crate::type_compare::{
    explicit_cast_allowed, implicit_cast_allowed, TemplateComparePlan, TypeCompareUtil,
};
use crate::type_resolver::resolve_type;

/// Rewrites every function body into resolved form: identifiers bound to
/// their declarations, overloads resolved, implicit conversions made
/// explicit, statement semantics checked.
pub struct CodeProcessor<'a> {
    ctx: &'a mut AsgContext,
    protos: &'a [NamespaceProto],
    target: Target,
    extensions: Vec<DeclId>,
    /// Bodies already rewritten; lazily created template instantiations can
    /// be reached both directly and through their template.
    processed: HashSet<DeclId>,
}

struct Local {
    name: String,
    ty: Type,
    is_mut: bool,
}

/// Per-function processing state.
struct Frame {
    file: FileId,
    container: Option<DeclId>,
    func: DeclId,
    self_type: Option<Type>,
    return_type: Type,
    throws: bool,
    locals: Vec<Vec<Local>>,
    goto_labels: HashSet<String>,
    loop_labels: Vec<Option<String>>,
    loop_depth: u32,
    switch_depth: u32,
    catch_depth: u32,
    pending_temporaries: Vec<(String, Type)>,
    temp_counter: u32,
}

impl Frame {
    fn find_local(&self, name: &str) -> Option<&Local> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.iter().rev().find(|local| local.name == name))
    }

    fn next_temp_name(&mut self) -> String {
        let name = format!("__temp{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }
}

impl<'a> CodeProcessor<'a> {
    pub fn new(
        ctx: &'a mut AsgContext,
        protos: &'a [NamespaceProto],
        target: Target,
    ) -> CodeProcessor<'a> {
        let mut extensions = Vec::new();
        for file in ctx.files() {
            let mut worklist = file.decls.clone();
            while let Some(decl_id) = worklist.pop() {
                let decl = ctx.decl(decl_id);
                if matches!(decl.kind, DeclKind::Extension(_)) {
                    extensions.push(decl_id);
                }
                if matches!(decl.kind, DeclKind::Namespace(_)) {
                    worklist.extend(decl.member_ids());
                }
            }
        }

        CodeProcessor {
            ctx,
            protos,
            target,
            extensions,
            processed: HashSet::new(),
        }
    }

    pub fn process_file(&mut self, file: FileId) -> Result<(), SemaError> {
        debug!(file = file.index(), "processing code");

        let top_decls = self.ctx.file(file).decls.clone();
        for decl_id in top_decls {
            self.process_decl(file, decl_id)
                .map_err(|err| err.with_file(file))?;
        }
        Ok(())
    }

    fn process_decl(&mut self, file: FileId, decl_id: DeclId) -> Result<(), SemaError> {
        // Instantiations are reachable both directly (lazy creation) and
        // through their template; rewrite each declaration once.
        if !self.processed.insert(decl_id) {
            return Ok(());
        }

        let decl = self.ctx.decl(decl_id);

        // Template bodies are processed per instantiation.
        if decl.contained_in_template || decl.template_params().is_some() {
            // Struct/trait template instantiations hang off the template.
            let instantiations = match &decl.kind {
                DeclKind::TemplateStruct(template) => template.instantiations.clone(),
                DeclKind::TemplateTrait(template) => template.instantiations.clone(),
                DeclKind::TemplateFunction(template) => template.instantiations.clone(),
                _ => Vec::new(),
            };
            for inst in instantiations {
                self.process_decl(file, inst)?;
            }
            return Ok(());
        }

        if decl.function().is_some() && !decl.is_prototype() {
            self.process_function(file, decl_id)?;
        }

        // Expressions living outside function bodies still need binding and
        // typing: variable initializers, enum case values, parameter
        // defaults.
        match &self.ctx.decl(decl_id).kind {
            DeclKind::Variable(var) if var.initializer.is_some() => {
                let declared = var.var_type.clone();
                let mut init = {
                    let DeclKind::Variable(var) = &mut self.ctx.decl_mut(decl_id).kind else {
                        unreachable!("checked above");
                    };
                    var.initializer.take().expect("checked above")
                };
                let result = self.process_standalone_expr(file, decl_id, &mut init, declared);
                if let DeclKind::Variable(var) = &mut self.ctx.decl_mut(decl_id).kind {
                    var.initializer = Some(init);
                }
                result?;
            }
            DeclKind::EnumConst(constant) if constant.value.is_some() => {
                let mut value = {
                    let DeclKind::EnumConst(constant) = &mut self.ctx.decl_mut(decl_id).kind
                    else {
                        unreachable!("checked above");
                    };
                    constant.value.take().expect("checked above")
                };
                let result = self.process_standalone_expr(file, decl_id, &mut value, None);
                if let DeclKind::EnumConst(constant) = &mut self.ctx.decl_mut(decl_id).kind {
                    constant.value = Some(value);
                }
                result?;
            }
            DeclKind::Parameter(param) if param.default_value.is_some() => {
                let declared = Some(param.param_type.clone());
                let mut value = {
                    let DeclKind::Parameter(param) = &mut self.ctx.decl_mut(decl_id).kind else {
                        unreachable!("checked above");
                    };
                    param.default_value.take().expect("checked above")
                };
                let result = self.process_standalone_expr(file, decl_id, &mut value, declared);
                if let DeclKind::Parameter(param) = &mut self.ctx.decl_mut(decl_id).kind {
                    param.default_value = Some(value);
                }
                result?;
            }
            _ => {}
        }

        let mut children = self.ctx.decl(decl_id).member_ids();
        if let Some(func) = self.ctx.decl(decl_id).function() {
            children.extend_from_slice(&func.params);
        }
        if let DeclKind::Subscript(subscript) = &self.ctx.decl(decl_id).kind {
            children.extend_from_slice(&subscript.params);
        }
        for child in children {
            self.process_decl(file, child)?;
        }

        // Function templates instantiated lazily during this very pass are
        // appended to the template; pick up any the body requested.
        if let DeclKind::TemplateFunction(template) = &self.ctx.decl(decl_id).kind {
            let instantiations = template.instantiations.clone();
            for inst in instantiations {
                self.process_decl(file, inst)?;
            }
        }

        Ok(())
    }

    fn process_function(&mut self, file: FileId, decl_id: DeclId) -> Result<(), SemaError> {
        let decl = self.ctx.decl(decl_id);
        let func = decl.function().expect("caller checked");

        let span = decl.span;
        let return_type = func
            .return_type
            .clone()
            .unwrap_or_else(|| Type::void(span));
        let self_type = self.concrete_self_type(decl_id, func.self_type.clone());

        let mut frame = Frame {
            file,
            container: decl.container,
            func: decl_id,
            self_type,
            return_type,
            throws: func.throws,
            locals: Vec::new(),
            goto_labels: HashSet::new(),
            loop_labels: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            catch_depth: 0,
            pending_temporaries: Vec::new(),
            temp_counter: 0,
        };

        // Detach the body; goto targets must be known before binding.
        let mut body = {
            let func = self
                .ctx
                .decl_mut(decl_id)
                .function_mut()
                .expect("caller checked");
            std::mem::replace(&mut func.body, CompoundStmt::empty(span))
        };
        collect_goto_labels(&body, &mut frame.goto_labels);

        let result = self.process_compound(&mut frame, &mut body);

        let func = self
            .ctx
            .decl_mut(decl_id)
            .function_mut()
            .expect("caller checked");
        func.body = body;
        result?;

        // Delegated constructor calls (`init() : base(…)`) bind to the base
        // or own constructor set.
        let base_call = match &self.ctx.decl(decl_id).kind {
            DeclKind::Constructor(ctor) => ctor.base_call.clone(),
            _ => None,
        };
        if let Some(mut call) = base_call {
            let processed = self.process_base_call(&mut frame, &mut call);
            if let DeclKind::Constructor(ctor) = &mut self.ctx.decl_mut(decl_id).kind {
                ctor.base_call = Some(call);
            }
            processed?;
        }

        // Contract conditions are bound in the same scope so later stages
        // can emit runtime checks.
        let mut contracts = {
            let func = self
                .ctx
                .decl_mut(decl_id)
                .function_mut()
                .expect("caller checked");
            std::mem::take(&mut func.contracts)
        };
        frame.locals.clear();
        let mut contract_result = Ok(());
        for cont in &mut contracts {
            let condition = match cont {
                Cont::Requires(requires) => Some(&mut requires.condition),
                Cont::Ensures(ensures) => Some(&mut ensures.condition),
                Cont::Throws(_) | Cont::Where(_) => None,
            };
            if let Some(condition) = condition {
                contract_result = self
                    .process_expr(&mut frame, condition)
                    .and_then(|_| self.expect_bool(condition));
                if contract_result.is_err() {
                    break;
                }
            }
        }
        let func = self
            .ctx
            .decl_mut(decl_id)
            .function_mut()
            .expect("caller checked");
        func.contracts = contracts;
        contract_result
    }

    /// Binds and types an expression that lives outside any function body.
    fn process_standalone_expr(
        &mut self,
        file: FileId,
        decl_id: DeclId,
        expr: &mut Expr,
        expected: Option<Type>,
    ) -> Result<(), SemaError> {
        let span = expr.span;
        let mut frame = Frame {
            file,
            container: self.ctx.decl(decl_id).container,
            func: decl_id,
            self_type: None,
            return_type: Type::void(span),
            throws: false,
            locals: vec![Vec::new()],
            goto_labels: HashSet::new(),
            loop_labels: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            catch_depth: 0,
            pending_temporaries: Vec::new(),
            temp_counter: 0,
        };

        self.process_expr(&mut frame, expr)?;
        if let Some(expected) = expected {
            self.coerce(&mut frame, expr, &expected)?;
        }
        Ok(())
    }

    /// Binds `init() : base(…)` / `: self(…)` to a constructor of the base
    /// struct or of the constructor's own struct.
    fn process_base_call(&mut self, frame: &mut Frame, call: &mut Expr) -> Result<(), SemaError> {
        let span = call.span;
        let ExprKind::FunctionCall { callee, args } = &mut call.kind else {
            return Err(SemaError::new("malformed delegated constructor call", span));
        };
        let ExprKind::Identifier { name, .. } = &callee.kind else {
            return Err(SemaError::new("malformed delegated constructor call", span));
        };
        let target_name = name.node.clone();

        let Some(owner) = frame.container else {
            return Err(SemaError::new(
                "delegated constructor calls are only legal inside a struct",
                span,
            ));
        };

        let target_struct = if target_name == "self" {
            owner
        } else {
            let inherited = match &self.ctx.decl(owner).kind {
                DeclKind::Struct(def) => def.inherited.clone(),
                _ => Vec::new(),
            };
            let base = inherited.iter().find_map(|ty| match &ty.kind {
                TypeKind::Struct(id) => Some(*id),
                _ => None,
            });
            base.ok_or_else(|| {
                SemaError::new("`base` constructor call without a base struct", span)
            })?
        };

        let mut args = std::mem::take(args);
        for arg in args.iter_mut() {
            self.process_expr(frame, &mut arg.value)?;
        }

        let constructors: Vec<DeclId> = match &self.ctx.decl(target_struct).kind {
            DeclKind::Struct(def) => def.constructors.clone(),
            _ => Vec::new(),
        };
        if constructors.is_empty() {
            return Err(SemaError::new(
                format!(
                    "`{}` has no constructors to delegate to",
                    self.ctx.decl(target_struct).name.node
                ),
                span,
            ));
        }

        let name = self.ctx.decl(target_struct).name.node.clone();
        let chosen = self.pick_overload(&name, &constructors, &args, span)?;
        self.coerce_call_args(frame, chosen, &mut args)?;

        call.kind = ExprKind::ConstructorCall {
            constructor: chosen,
            args,
        };
        call.value_type = Some(Type::void(span));
        call.is_lvalue = false;
        Ok(())
    }

    /// The concrete type behind a method's `Self` placeholder.
    fn concrete_self_type(&self, decl_id: DeclId, placeholder: Option<Type>) -> Option<Type> {
        let placeholder = placeholder?;
        if !matches!(placeholder.kind, TypeKind::SelfType) {
            return Some(placeholder);
        }

        let mut current = self.ctx.decl(decl_id).container;
        while let Some(container) = current {
            let decl = self.ctx.decl(container);
            match &decl.kind {
                DeclKind::Struct(_) => {
                    return Some(Type::new(placeholder.span, TypeKind::Struct(container)));
                }
                DeclKind::Trait(_) => {
                    return Some(Type::new(placeholder.span, TypeKind::Trait(container)));
                }
                DeclKind::Extension(ext) => return Some(ext.target.clone()),
                _ => current = decl.container,
            }
        }
        None
    }

    // Statements ------------------------------------------------------------

    fn process_compound(
        &mut self,
        frame: &mut Frame,
        compound: &mut CompoundStmt,
    ) -> Result<(), SemaError> {
        frame.locals.push(Vec::new());

        let mut result = Ok(());
        for index in 0..compound.stmts.len() {
            result = self.process_stmt(frame, &mut compound.stmts[index]);
            if result.is_err() {
                break;
            }
            // Call results of non-trivial type die at this statement
            // boundary.
            for (name, ty) in frame.pending_temporaries.drain(..) {
                compound.temporaries.push(TemporaryValue {
                    name,
                    ty,
                    stmt_index: index,
                });
            }
        }

        frame.locals.pop();
        result
    }

    fn process_stmt(&mut self, frame: &mut Frame, stmt: &mut Stmt) -> Result<(), SemaError> {
        match stmt {
            Stmt::Compound(compound) => self.process_compound(frame, compound),
            Stmt::If(if_stmt) => {
                self.process_expr(frame, &mut if_stmt.condition)?;
                self.expect_bool(&if_stmt.condition)?;
                self.process_compound(frame, &mut if_stmt.then_block)?;
                if let Some(else_block) = &mut if_stmt.else_block {
                    self.process_stmt(frame, else_block)?;
                }
                Ok(())
            }
            Stmt::While(while_stmt) => {
                self.process_expr(frame, &mut while_stmt.condition)?;
                self.expect_bool(&while_stmt.condition)?;
                self.process_loop_body(frame, None, &mut while_stmt.body)
            }
            Stmt::RepeatWhile(repeat) => {
                self.process_loop_body(frame, None, &mut repeat.body)?;
                self.process_expr(frame, &mut repeat.condition)?;
                self.expect_bool(&repeat.condition)
            }
            Stmt::For(for_stmt) => {
                frame.locals.push(Vec::new());
                let result = (|| {
                    if let Some(init) = &mut for_stmt.init {
                        self.process_expr(frame, init)?;
                    }
                    if let Some(condition) = &mut for_stmt.condition {
                        self.process_expr(frame, condition)?;
                        self.expect_bool(condition)?;
                    }
                    if let Some(iteration) = &mut for_stmt.iteration {
                        self.process_expr(frame, iteration)?;
                    }
                    self.process_loop_body(frame, None, &mut for_stmt.body)
                })();
                frame.locals.pop();
                result
            }
            Stmt::Switch(switch) => {
                self.process_expr(frame, &mut switch.condition)?;
                let cond_type = switch
                    .condition
                    .value_type
                    .clone()
                    .expect("condition was just processed");

                frame.switch_depth += 1;
                let mut result = Ok(());
                'cases: for case in &mut switch.cases {
                    if let Some(condition) = &mut case.condition {
                        result = self
                            .process_expr(frame, condition)
                            .and_then(|_| self.coerce(frame, condition, &cond_type));
                        if result.is_err() {
                            break 'cases;
                        }
                    }

                    frame.locals.push(Vec::new());
                    for stmt in &mut case.body {
                        result = self.process_stmt(frame, stmt);
                        if result.is_err() {
                            frame.locals.pop();
                            break 'cases;
                        }
                    }
                    frame.locals.pop();

                    // No implicit fallthrough: a non-empty case body must
                    // end in a terminator.
                    if let Some(last) = case.body.last() {
                        if !is_case_terminator(last) {
                            result = Err(SemaError::new(
                                "switch case falls through without an explicit `fallthrough`",
                                case.span,
                            ));
                            break 'cases;
                        }
                    }
                }
                frame.switch_depth -= 1;
                result
            }
            Stmt::Do(do_stmt) => self.process_compound(frame, &mut do_stmt.body),
            Stmt::DoCatch(do_catch) => {
                frame.catch_depth += 1;
                let body_result = self.process_compound(frame, &mut do_catch.body);
                frame.catch_depth -= 1;
                body_result?;

                for catch in &mut do_catch.catches {
                    frame.locals.push(Vec::new());
                    if let (Some(var), Some(ty)) = (&catch.exception_var, &catch.exception_type) {
                        frame.locals.last_mut().expect("just pushed").push(Local {
                            name: var.node.clone(),
                            ty: ty.clone(),
                            is_mut: false,
                        });
                    }
                    let result = self.process_compound(frame, &mut catch.body);
                    frame.locals.pop();
                    result?;
                }

                if let Some(finally) = &mut do_catch.finally {
                    self.process_compound(frame, finally)?;
                }
                Ok(())
            }
            Stmt::Break(break_stmt) => {
                if let Some(label) = &break_stmt.label {
                    if !frame
                        .loop_labels
                        .iter()
                        .any(|candidate| candidate.as_deref() == Some(&label.node))
                    {
                        return Err(SemaError::new(
                            format!("`break {}` does not name an enclosing loop", label.node),
                            break_stmt.span,
                        ));
                    }
                } else if frame.loop_depth == 0 && frame.switch_depth == 0 {
                    return Err(SemaError::new(
                        "`break` used outside of a loop or switch",
                        break_stmt.span,
                    ));
                }
                Ok(())
            }
            Stmt::Continue(continue_stmt) => {
                if let Some(label) = &continue_stmt.label {
                    if !frame
                        .loop_labels
                        .iter()
                        .any(|candidate| candidate.as_deref() == Some(&label.node))
                    {
                        return Err(SemaError::new(
                            format!("`continue {}` does not name an enclosing loop", label.node),
                            continue_stmt.span,
                        ));
                    }
                } else if frame.loop_depth == 0 {
                    return Err(SemaError::new(
                        "`continue` used outside of a loop",
                        continue_stmt.span,
                    ));
                }
                Ok(())
            }
            Stmt::Goto(goto_stmt) => {
                if !frame.goto_labels.contains(&goto_stmt.label.node) {
                    return Err(SemaError::new(
                        format!(
                            "`goto {}` has no matching label in this function",
                            goto_stmt.label.node
                        ),
                        goto_stmt.span,
                    ));
                }
                Ok(())
            }
            Stmt::Labeled(labeled) => {
                let label = labeled.label.node.clone();
                match labeled.stmt.as_mut() {
                    Stmt::While(while_stmt) => {
                        self.process_expr(frame, &mut while_stmt.condition)?;
                        self.expect_bool(&while_stmt.condition)?;
                        self.process_loop_body(frame, Some(label), &mut while_stmt.body)
                    }
                    Stmt::RepeatWhile(repeat) => {
                        self.process_loop_body(frame, Some(label), &mut repeat.body)?;
                        self.process_expr(frame, &mut repeat.condition)?;
                        self.expect_bool(&repeat.condition)
                    }
                    Stmt::For(for_stmt) => {
                        frame.locals.push(Vec::new());
                        let result = (|| {
                            if let Some(init) = &mut for_stmt.init {
                                self.process_expr(frame, init)?;
                            }
                            if let Some(condition) = &mut for_stmt.condition {
                                self.process_expr(frame, condition)?;
                                self.expect_bool(condition)?;
                            }
                            if let Some(iteration) = &mut for_stmt.iteration {
                                self.process_expr(frame, iteration)?;
                            }
                            self.process_loop_body(frame, Some(label), &mut for_stmt.body)
                        })();
                        frame.locals.pop();
                        result
                    }
                    other => self.process_stmt(frame, other),
                }
            }
            Stmt::Return(ret) => {
                match &mut ret.value {
                    Some(value) => {
                        if frame.return_type.is_void() {
                            return Err(SemaError::new(
                                "cannot return a value from a `void` function",
                                ret.span,
                            ));
                        }
                        self.process_expr(frame, value)?;
                        let return_type = frame.return_type.clone();
                        self.coerce(frame, value, &return_type)
                    }
                    None => {
                        if !frame.return_type.is_void() {
                            return Err(SemaError::new(
                                "missing return value in a non-`void` function",
                                ret.span,
                            ));
                        }
                        Ok(())
                    }
                }
            }
            Stmt::Fallthrough(span) => {
                if frame.switch_depth == 0 {
                    return Err(SemaError::new(
                        "`fallthrough` used outside of a switch",
                        *span,
                    ));
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.process_expr(frame, expr),
        }
    }

    fn process_loop_body(
        &mut self,
        frame: &mut Frame,
        label: Option<String>,
        body: &mut CompoundStmt,
    ) -> Result<(), SemaError> {
        frame.loop_depth += 1;
        frame.loop_labels.push(label);
        let result = self.process_compound(frame, body);
        frame.loop_labels.pop();
        frame.loop_depth -= 1;
        result
    }

    // Expressions -----------------------------------------------------------

    fn process_expr(&mut self, frame: &mut Frame, expr: &mut Expr) -> Result<(), SemaError> {
        let span = expr.span;
        let kind = std::mem::replace(&mut expr.kind, ExprKind::CurrentSelf);
        let (kind, ty, is_lvalue) = self.process_expr_kind(frame, kind, span)?;
        expr.kind = kind;
        expr.value_type = Some(ty);
        expr.is_lvalue = is_lvalue;
        Ok(())
    }

    fn process_expr_kind(
        &mut self,
        frame: &mut Frame,
        kind: ExprKind,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        match kind {
            ExprKind::Literal(literal) => self.process_literal(frame, literal, span),
            ExprKind::Identifier {
                name,
                template_args,
            } => self.bind_identifier(frame, &name.node, template_args, span),
            ExprKind::Paren(mut inner) => {
                self.process_expr(frame, &mut inner)?;
                let ty = inner.value_type.clone().expect("just processed");
                let is_lvalue = inner.is_lvalue;
                Ok((ExprKind::Paren(inner), ty, is_lvalue))
            }
            ExprKind::Prefix { op, mut expr } => {
                self.process_expr(frame, &mut expr)?;
                self.process_prefix(frame, op, expr, span)
            }
            ExprKind::Postfix { op, mut expr } => {
                self.process_expr(frame, &mut expr)?;
                self.process_postfix(frame, op, expr, span)
            }
            ExprKind::Infix {
                op,
                mut left,
                mut right,
            } => {
                self.process_expr(frame, &mut left)?;
                self.process_expr(frame, &mut right)?;
                self.process_infix(frame, op, left, right, span)
            }
            ExprKind::Assign {
                compound,
                mut target,
                mut value,
            } => {
                self.process_expr(frame, &mut target)?;
                self.process_expr(frame, &mut value)?;
                self.process_assign(frame, compound, target, value, span)
            }
            ExprKind::Ternary {
                mut condition,
                mut if_true,
                mut if_false,
            } => {
                self.process_expr(frame, &mut condition)?;
                self.expect_bool(&condition)?;
                self.process_expr(frame, &mut if_true)?;
                self.process_expr(frame, &mut if_false)?;

                let true_type = if_true.value_type.clone().expect("just processed");
                let false_type = if_false.value_type.clone().expect("just processed");
                let compare = TypeCompareUtil::new(self.ctx);
                let ty = if compare.are_same(&true_type, &false_type, TemplateComparePlan::Strict) {
                    true_type
                } else if implicit_cast_allowed(self.ctx, &false_type, &true_type) {
                    self.coerce(frame, &mut if_false, &true_type)?;
                    true_type
                } else if implicit_cast_allowed(self.ctx, &true_type, &false_type) {
                    self.coerce(frame, &mut if_true, &false_type)?;
                    false_type
                } else {
                    return Err(SemaError::new(
                        "ternary branches have incompatible types",
                        span,
                    ));
                };

                Ok((
                    ExprKind::Ternary {
                        condition,
                        if_true,
                        if_false,
                    },
                    ty,
                    false,
                ))
            }
            ExprKind::As { mut expr, target } => {
                self.process_expr(frame, &mut expr)?;
                let from = expr.value_type.clone().expect("just processed");
                if !explicit_cast_allowed(self.ctx, &from, &target) {
                    return Err(SemaError::new(
                        format!(
                            "cannot cast `{}` to `{}`",
                            from.describe(self.ctx),
                            target.describe(self.ctx)
                        ),
                        span,
                    ));
                }
                let ty = target.clone();
                Ok((ExprKind::As { expr, target }, ty, false))
            }
            ExprKind::Is { mut expr, target } => {
                self.process_expr(frame, &mut expr)?;
                Ok((
                    ExprKind::Is { expr, target },
                    Type::builtin(span, BuiltInKind::Bool),
                    false,
                ))
            }
            ExprKind::Has { mut expr, prototype } => {
                self.process_expr(frame, &mut expr)?;
                Ok((
                    ExprKind::Has { expr, prototype },
                    Type::builtin(span, BuiltInKind::Bool),
                    false,
                ))
            }
            ExprKind::CheckExtendsType { check, extends } => {
                // Only legal inside `where` clauses, which are consumed by
                // instantiation.
                let _ = (&check, &extends);
                Err(SemaError::new(
                    "`:` type checks are only valid inside `where` clauses",
                    span,
                ))
            }
            ExprKind::Ref { is_mut, mut expr } => {
                self.process_expr(frame, &mut expr)?;
                if !expr.is_lvalue {
                    return Err(SemaError::new("`ref` requires an addressable value", span));
                }
                let mut inner = expr.value_type.clone().expect("just processed");
                if is_mut && inner.qualifier == TypeQualifier::Immut {
                    return Err(SemaError::new(
                        "cannot take a `ref mut` to an immutable value",
                        span,
                    ));
                }
                inner.qualifier = if is_mut {
                    TypeQualifier::Mut
                } else {
                    TypeQualifier::Immut
                };
                let ty = Type::new(span, TypeKind::Reference(Box::new(inner)));
                Ok((ExprKind::Ref { is_mut, expr }, ty, false))
            }
            ExprKind::Try(mut inner) => {
                if !frame.throws && frame.catch_depth == 0 {
                    return Err(SemaError::new(
                        "`try` is only legal where the enclosing function's `throws` set permits it",
                        span,
                    ));
                }
                self.process_expr(frame, &mut inner)?;
                let ty = inner.value_type.clone().expect("just processed");
                let is_lvalue = inner.is_lvalue;
                Ok((ExprKind::Try(inner), ty, is_lvalue))
            }
            ExprKind::ArrayLiteral(mut elements) => {
                if elements.is_empty() {
                    return Err(SemaError::new(
                        "cannot infer the element type of an empty array literal",
                        span,
                    ));
                }
                for element in elements.iter_mut() {
                    self.process_expr(frame, element)?;
                }
                let element_type = elements[0].value_type.clone().expect("just processed");
                for element in elements.iter_mut().skip(1) {
                    self.coerce(frame, element, &element_type)?;
                }
                let length = Expr::new(
                    span,
                    ExprKind::Literal(Literal {
                        kind: LiteralKind::Integer,
                        value: elements.len().to_string(),
                        suffix: None,
                    }),
                );
                let ty = Type::new(
                    span,
                    TypeKind::FlatArray {
                        element: Box::new(element_type),
                        length: Box::new(length),
                    },
                );
                Ok((ExprKind::ArrayLiteral(elements), ty, false))
            }
            ExprKind::VariableDecl {
                name,
                is_mut,
                declared_type,
                mut initializer,
            } => {
                if let Some(init) = initializer.as_deref_mut() {
                    self.process_expr(frame, init)?;
                }

                let mut ty = match (&declared_type, &initializer) {
                    (Some(declared), _) => declared.clone(),
                    (None, Some(init)) => {
                        let mut inferred = init.value_type.clone().expect("just processed");
                        inferred.is_lvalue = false;
                        inferred.qualifier = TypeQualifier::Unassigned;
                        inferred
                    }
                    (None, None) => {
                        return Err(SemaError::new(
                            format!("`{}` needs a type annotation or an initial value", name.node),
                            span,
                        ));
                    }
                };

                if let Some(init) = initializer.as_deref_mut() {
                    self.coerce(frame, init, &ty)?;
                }

                if ty.qualifier == TypeQualifier::Unassigned {
                    ty.qualifier = if is_mut {
                        TypeQualifier::Mut
                    } else {
                        TypeQualifier::Immut
                    };
                }

                frame
                    .locals
                    .last_mut()
                    .expect("statements run inside a scope")
                    .push(Local {
                        name: name.node.clone(),
                        ty: ty.clone(),
                        is_mut,
                    });

                Ok((
                    ExprKind::VariableDecl {
                        name,
                        is_mut,
                        declared_type,
                        initializer,
                    },
                    ty,
                    true,
                ))
            }
            ExprKind::FunctionCall { callee, mut args } => {
                for arg in args.iter_mut() {
                    self.process_expr(frame, &mut arg.value)?;
                }
                self.process_call(frame, *callee, args, span)
            }
            ExprKind::SubscriptCall {
                mut target,
                mut args,
            } => {
                self.process_expr(frame, &mut target)?;
                for arg in args.iter_mut() {
                    self.process_expr(frame, &mut arg.value)?;
                }
                self.process_subscript_read(frame, *target, args, span)
            }
            ExprKind::MemberAccess {
                is_arrow,
                object,
                member,
                template_args,
            } => self.process_member_access(frame, is_arrow, *object, member, template_args, span),
            ExprKind::Type(ty) => {
                let value_type = (*ty).clone();
                Ok((ExprKind::Type(ty), value_type, false))
            }
            // Resolved forms never reach this pass twice.
            other => {
                let described = format!("{other:?}");
                Err(SemaError::new(
                    format!("internal: unexpected resolved expression {described}"),
                    span,
                ))
            }
        }
    }

    fn process_literal(
        &mut self,
        frame: &mut Frame,
        literal: Literal,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        let default_type = |kind: LiteralKind| match kind {
            LiteralKind::Integer => Type::builtin(span, BuiltInKind::I32),
            LiteralKind::Float => Type::builtin(span, BuiltInKind::F64),
            LiteralKind::Bool => Type::builtin(span, BuiltInKind::Bool),
            // A char literal is its code point.
            LiteralKind::Char => Type::builtin(span, BuiltInKind::U32),
            LiteralKind::String => {
                let mut element = Type::builtin(span, BuiltInKind::U8);
                element.qualifier = TypeQualifier::Immut;
                Type::new(span, TypeKind::Pointer(Box::new(element)))
            }
        };

        let Some(suffix) = literal.suffix.clone() else {
            let ty = default_type(literal.kind);
            return Ok((ExprKind::Literal(literal), ty, false));
        };

        if let Some(builtin) = BuiltInKind::from_name(&suffix) {
            let valid = match literal.kind {
                LiteralKind::Integer => builtin.is_integer() || builtin.is_float(),
                LiteralKind::Float => builtin.is_float(),
                _ => false,
            };
            if !valid {
                return Err(SemaError::new(
                    format!("type suffix `{suffix}` does not fit this literal"),
                    span,
                ));
            }
            let mut literal = literal;
            literal.suffix = None;
            return Ok((ExprKind::Literal(literal), Type::builtin(span, builtin), false));
        }

        // User-defined suffixes invoke `typesuffix` declarations.
        let lookup = NameLookup::new(self.ctx, self.protos);
        let suffix_decl = lookup
            .lookup(frame.file, frame.container, &suffix)
            .into_iter()
            .find(|&id| matches!(self.ctx.decl(id).kind, DeclKind::TypeSuffix(_)));

        let Some(suffix_decl) = suffix_decl else {
            return Err(SemaError::new(
                format!("unknown type suffix `{suffix}`"),
                span,
            ));
        };

        let return_type = self
            .ctx
            .decl(suffix_decl)
            .function()
            .and_then(|func| func.return_type.clone())
            .unwrap_or_else(|| Type::void(span));

        let mut bare = literal;
        bare.suffix = None;
        let bare_type = default_type(bare.kind);
        let mut value = Expr::new(span, ExprKind::Literal(bare));
        value.value_type = Some(bare_type);

        let callee = {
            let mut callee = Expr::new(span, ExprKind::FunctionRef(suffix_decl));
            callee.value_type = Some(self.function_pointer_type(suffix_decl, span));
            callee
        };

        Ok((
            ExprKind::FunctionCall {
                callee: Box::new(callee),
                args: vec![LabeledArgument {
                    label: ghoul_ast::Ident::new(span, UNLABELED.to_string()),
                    value,
                }],
            },
            return_type,
            false,
        ))
    }

    /// Name binding for a bare identifier: locals, parameters, `self`,
    /// member variables, enum constants, const template arguments, global
    /// variables, functions, then type names.
    fn bind_identifier(
        &mut self,
        frame: &mut Frame,
        name: &str,
        template_args: Vec<Expr>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        if template_args.is_empty() {
            if let Some(local) = frame.find_local(name) {
                return Ok((
                    ExprKind::LocalVariableRef {
                        name: name.to_string(),
                    },
                    local.ty.clone(),
                    true,
                ));
            }

            if let Some((param, index)) = self.find_param(frame, name) {
                let ty = match &self.ctx.decl(param).kind {
                    DeclKind::Parameter(p) => p.param_type.clone(),
                    _ => unreachable!("parameters are parameter decls"),
                };
                return Ok((
                    ExprKind::ParameterRef {
                        parameter: param,
                        index,
                    },
                    ty,
                    true,
                ));
            }

            if name == "self" {
                let Some(self_type) = frame.self_type.clone() else {
                    return Err(SemaError::new(
                        "`self` is not available in this context",
                        span,
                    ));
                };
                return Ok((ExprKind::CurrentSelf, self_type, true));
            }

            if let Some((field, owner)) = self.find_member_variable(frame, name) {
                let Some(self_type) = frame.self_type.clone() else {
                    return Err(SemaError::new(
                        format!("cannot access instance member `{name}` from a static function"),
                        span,
                    ));
                };
                let _ = owner;
                let ty = match &self.ctx.decl(field).kind {
                    DeclKind::Variable(var) => var.var_type.clone().ok_or_else(|| {
                        SemaError::new("member variable has no resolved type", span)
                    })?,
                    _ => unreachable!("member variables are variable decls"),
                };
                let mut object = Expr::new(span, ExprKind::CurrentSelf);
                object.value_type = Some(self_type);
                object.is_lvalue = true;
                return Ok((
                    ExprKind::MemberVariableRef {
                        object: Box::new(object),
                        field,
                    },
                    ty,
                    true,
                ));
            }

            if let Some((constant, owner)) = self.find_enum_const(frame, name) {
                return Ok((
                    ExprKind::EnumConstRef(constant),
                    Type::new(span, TypeKind::Enum(owner)),
                    false,
                ));
            }

            if let Some(literal) = self.find_const_template_arg(frame, name) {
                let ty = literal
                    .value_type
                    .clone()
                    .unwrap_or_else(|| Type::builtin(span, BuiltInKind::I32));
                let ExprKind::Literal(lit) = literal.kind else {
                    return Err(SemaError::new(
                        "const template arguments must be literal values",
                        span,
                    ));
                };
                return Ok((ExprKind::Literal(lit), ty, false));
            }

            let lookup = NameLookup::new(self.ctx, self.protos);
            let candidates = lookup.lookup(frame.file, frame.container, name);

            if let Some(&variable) = candidates
                .iter()
                .find(|&&id| matches!(self.ctx.decl(id).kind, DeclKind::Variable(_)))
            {
                let ty = match &self.ctx.decl(variable).kind {
                    DeclKind::Variable(var) => var.var_type.clone().ok_or_else(|| {
                        SemaError::new(format!("variable `{name}` has no resolved type"), span)
                    })?,
                    _ => unreachable!("filtered above"),
                };
                return Ok((ExprKind::VariableRef(variable), ty, true));
            }

            let functions: Vec<DeclId> = candidates
                .iter()
                .copied()
                .filter(|&id| {
                    matches!(
                        self.ctx.decl(id).kind,
                        DeclKind::Function(_) | DeclKind::TypeSuffix(_)
                    )
                })
                .collect();
            if functions.len() == 1 {
                let function = functions[0];
                let ty = self.function_pointer_type(function, span);
                return Ok((ExprKind::FunctionRef(function), ty, false));
            }
            if functions.len() > 1 {
                return Err(SemaError::new(
                    format!("reference to `{name}` is ambiguous without a call"),
                    span,
                ));
            }
        }

        // A (possibly templated) type used as a first-class expression.
        let mut ty = Type::new(
            span,
            TypeKind::Unresolved {
                path: Vec::new(),
                name: ghoul_ast::Ident::new(span, name.to_string()),
                args: template_args,
            },
        );
        let resolved = resolve_type(self.ctx, self.protos, frame.file, frame.container, &mut ty)
            .is_ok();
        if resolved {
            let mut instantiator = DeclInstantiator::new(self.ctx, self.protos, self.target.clone());
            // The type may be a template application needing instantiation.
            let mut check = ty.clone();
            let finished = {
                let frame_scope = frame.container.unwrap_or(frame.func);
                instantiator_finish(&mut instantiator, frame.file, frame_scope, &mut check)
            };
            if finished.is_ok() {
                let value_type = check.clone();
                return Ok((ExprKind::Type(Box::new(check)), value_type, false));
            }
        }

        Err(SemaError::new(
            format!("unresolved identifier `{name}`"),
            span,
        ))
    }

    fn find_param(&self, frame: &Frame, name: &str) -> Option<(DeclId, usize)> {
        let func = self.ctx.decl(frame.func).function()?;
        func.params
            .iter()
            .enumerate()
            .find(|(_, &param)| self.ctx.decl(param).name.node == name)
            .map(|(index, &param)| (param, index))
            .or_else(|| {
                // Subscript accessors see the subscript's parameters.
                let container = frame.container?;
                if let DeclKind::Subscript(subscript) = &self.ctx.decl(container).kind {
                    subscript
                        .params
                        .iter()
                        .enumerate()
                        .find(|(_, &param)| self.ctx.decl(param).name.node == name)
                        .map(|(index, &param)| (param, index))
                } else {
                    None
                }
            })
    }

    fn find_member_variable(&self, frame: &Frame, name: &str) -> Option<(DeclId, DeclId)> {
        let mut current = frame.container;
        while let Some(container) = current {
            let decl = self.ctx.decl(container);
            if matches!(decl.kind, DeclKind::Struct(_) | DeclKind::Trait(_)) {
                for member in decl.member_ids() {
                    let member_decl = self.ctx.decl(member);
                    if member_decl.name.node == name
                        && matches!(member_decl.kind, DeclKind::Variable(_))
                        && !member_decl.is_static()
                    {
                        return Some((member, container));
                    }
                }
            }
            current = decl.container;
        }
        None
    }

    fn find_enum_const(&self, frame: &Frame, name: &str) -> Option<(DeclId, DeclId)> {
        let mut current = frame.container;
        while let Some(container) = current {
            let decl = self.ctx.decl(container);
            if let DeclKind::Enum(def) = &decl.kind {
                for &constant in &def.consts {
                    if self.ctx.decl(constant).name.node == name {
                        return Some((constant, container));
                    }
                }
            }
            current = decl.container;
        }
        None
    }

    /// Inside a template instantiation, a const template parameter's name
    /// binds to the literal argument recorded on the instantiation.
    fn find_const_template_arg(&self, frame: &Frame, name: &str) -> Option<Expr> {
        let mut current = Some(frame.func);
        while let Some(decl_id) = current {
            let decl = self.ctx.decl(decl_id);
            let info = match &decl.kind {
                DeclKind::Struct(def) => def.instantiated_from.as_ref(),
                DeclKind::Trait(def) => def.instantiated_from.as_ref(),
                DeclKind::Function(func) => func.instantiated_from.as_ref(),
                _ => None,
            };
            if let Some(info) = info {
                let params = self.ctx.decl(info.template).template_params()?;
                for (index, &param) in params.iter().enumerate() {
                    let param_decl = self.ctx.decl(param);
                    if param_decl.name.node == name {
                        if let DeclKind::TemplateParameter(p) = &param_decl.kind {
                            if p.param_kind == TemplateParameterKind::Const {
                                return info.args.get(index).cloned();
                            }
                        }
                    }
                }
            }
            current = decl.container;
        }
        None
    }

    fn function_pointer_type(&self, function: DeclId, span: Span) -> Type {
        let func = self.ctx.decl(function).function();
        let (params, return_type) = match func {
            Some(func) => {
                let params = func
                    .params
                    .iter()
                    .filter_map(|&param| match &self.ctx.decl(param).kind {
                        DeclKind::Parameter(p) => Some(p.param_type.clone()),
                        _ => None,
                    })
                    .collect();
                let ret = func
                    .return_type
                    .clone()
                    .unwrap_or_else(|| Type::void(span));
                (params, ret)
            }
            None => (Vec::new(), Type::void(span)),
        };
        Type::new(
            span,
            TypeKind::FunctionPointer {
                params,
                return_type: Box::new(return_type),
            },
        )
    }

    // Calls -----------------------------------------------------------------

    /// Overload resolution and call rewriting. Arguments are processed by
    /// the caller.
    fn process_call(
        &mut self,
        frame: &mut Frame,
        callee: Expr,
        args: Vec<LabeledArgument>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        match callee.kind {
            ExprKind::Identifier {
                ref name,
                ref template_args,
            } => {
                let name_str = name.node.clone();
                let template_args = template_args.clone();

                // Callable locals and parameters shadow free functions.
                if template_args.is_empty() {
                    if frame.find_local(&name_str).is_some() || self.find_param(frame, &name_str).is_some()
                    {
                        let mut callee = callee;
                        self.process_expr(frame, &mut callee)?;
                        return self.call_function_pointer(callee, args, span);
                    }
                }

                let candidates = self.collect_callables(frame, &name_str);
                self.resolve_overloaded_call(frame, &name_str, candidates, template_args, args, span)
            }
            ExprKind::MemberAccess {
                is_arrow,
                object,
                member,
                template_args,
            } => {
                // Qualified call through a namespace path: `net.send(…)`.
                if !is_arrow {
                    if let Some((path, last, last_args)) = expr_as_dotted_name(&object) {
                        if last_args.is_empty() {
                            let mut full: Vec<String> =
                                path.iter().map(|seg| seg.node.clone()).collect();
                            full.push(last.node.clone());

                            let lookup = NameLookup::new(self.ctx, self.protos);
                            if let Some(proto) = lookup.resolve_namespace(frame.file, &full) {
                                let candidates: Vec<DeclId> = proto
                                    .members
                                    .iter()
                                    .copied()
                                    .filter(|&id| self.ctx.decl(id).name.node == member.node)
                                    .collect();
                                if !candidates.is_empty() {
                                    return self.resolve_overloaded_call(
                                        frame,
                                        &member.node,
                                        candidates,
                                        template_args,
                                        args,
                                        span,
                                    );
                                }
                            }
                        }
                    }
                }

                // Ordinary method call.
                let mut object = *object;
                self.process_expr(frame, &mut object)?;
                self.process_method_call(frame, is_arrow, object, member.node, template_args, args, span)
            }
            _ => {
                let mut callee = callee;
                self.process_expr(frame, &mut callee)?;
                self.call_function_pointer(callee, args, span)
            }
        }
    }

    fn call_function_pointer(
        &mut self,
        callee: Expr,
        args: Vec<LabeledArgument>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        let callee_type = callee.value_type.clone().expect("callee was processed");

        match &callee_type.kind {
            TypeKind::FunctionPointer { return_type, .. } => {
                let ty = (**return_type).clone();
                Ok((
                    ExprKind::FunctionCall {
                        callee: Box::new(callee),
                        args,
                    },
                    ty,
                    false,
                ))
            }
            TypeKind::Struct(struct_id) => {
                // A struct value used as a callee goes through its `call`
                // operator.
                let call_op = self
                    .type_member_decls(*struct_id)
                    .into_iter()
                    .find(|&id| matches!(self.ctx.decl(id).kind, DeclKind::CallOperator(_)));
                let Some(call_op) = call_op else {
                    return Err(SemaError::new(
                        format!(
                            "`{}` has no `call` operator",
                            callee_type.describe(self.ctx)
                        ),
                        span,
                    ));
                };
                let ty = self
                    .ctx
                    .decl(call_op)
                    .function()
                    .and_then(|func| func.return_type.clone())
                    .unwrap_or_else(|| Type::void(span));
                Ok((
                    ExprKind::CallOperatorRef {
                        call_operator: call_op,
                        object: Box::new(callee),
                        args,
                    },
                    ty,
                    false,
                ))
            }
            _ => Err(SemaError::new(
                format!("`{}` is not callable", callee_type.describe(self.ctx)),
                span,
            )),
        }
    }

    /// Candidate set for an unqualified call: the container chain's members
    /// (inherited types and extensions included), the file's top level, and
    /// imports.
    fn collect_callables(&self, frame: &Frame, name: &str) -> Vec<DeclId> {
        let lookup = NameLookup::new(self.ctx, self.protos);
        let mut result = lookup.lookup(frame.file, frame.container, name);

        let mut current = frame.container;
        while let Some(container) = current {
            let decl = self.ctx.decl(container);
            if matches!(decl.kind, DeclKind::Struct(_) | DeclKind::Trait(_)) {
                for member in self.type_member_decls(container) {
                    if self.ctx.decl(member).name.node == name && !result.contains(&member) {
                        result.push(member);
                    }
                }
            }
            current = decl.container;
        }

        result
    }

    /// Members of a struct/trait type including inherited members and
    /// extension members.
    fn type_member_decls(&self, type_decl: DeclId) -> Vec<DeclId> {
        let mut result = self.ctx.decl(type_decl).member_ids();

        let inherited: Vec<Type> = match &self.ctx.decl(type_decl).kind {
            DeclKind::Struct(def) => {
                if def.all_inherited.is_empty() {
                    def.inherited.clone()
                } else {
                    def.all_inherited.clone()
                }
            }
            DeclKind::Trait(def) => {
                if def.all_inherited.is_empty() {
                    def.inherited.clone()
                } else {
                    def.all_inherited.clone()
                }
            }
            _ => Vec::new(),
        };
        for base in inherited {
            if let TypeKind::Struct(id) | TypeKind::Trait(id) = base.kind {
                for member in self.ctx.decl(id).member_ids() {
                    if !result.contains(&member) {
                        result.push(member);
                    }
                }
            }
        }

        let compare = TypeCompareUtil::new(self.ctx);
        let target_type = Type::new(
            self.ctx.decl(type_decl).span,
            match &self.ctx.decl(type_decl).kind {
                DeclKind::Trait(_) => TypeKind::Trait(type_decl),
                _ => TypeKind::Struct(type_decl),
            },
        );
        for &ext in &self.extensions {
            if let DeclKind::Extension(ext_decl) = &self.ctx.decl(ext).kind {
                if compare.are_same(&ext_decl.target, &target_type, TemplateComparePlan::Strict) {
                    for &member in &ext_decl.members {
                        if !result.contains(&member) {
                            result.push(member);
                        }
                    }
                }
            }
        }

        result
    }

    /// Template arguments written in expression position resolve to
    /// first-class types before instantiation sees them.
    fn resolve_template_arg_exprs(
        &mut self,
        frame: &Frame,
        args: &mut [Expr],
    ) -> Result<(), SemaError> {
        for arg in args.iter_mut() {
            if matches!(arg.kind, ExprKind::Type(_) | ExprKind::Literal(_)) {
                continue;
            }
            if let Some(mut ty) = expr_to_unresolved_type(arg) {
                if resolve_type(self.ctx, self.protos, frame.file, frame.container, &mut ty).is_ok()
                {
                    let mut instantiator =
                        DeclInstantiator::new(self.ctx, self.protos, self.target.clone());
                    instantiator.finish_standalone_type(
                        frame.file,
                        frame.container.unwrap_or(frame.func),
                        &mut ty,
                    )?;
                    arg.kind = ExprKind::Type(Box::new(ty));
                }
            }
        }
        Ok(())
    }

    fn resolve_overloaded_call(
        &mut self,
        frame: &mut Frame,
        name: &str,
        candidates: Vec<DeclId>,
        mut template_args: Vec<Expr>,
        mut args: Vec<LabeledArgument>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        self.resolve_template_arg_exprs(frame, &mut template_args)?;
        if candidates.is_empty() {
            return Err(SemaError::new(
                format!("unresolved identifier `{name}`"),
                span,
            ));
        }

        // Constructor call: the callee names a type.
        if let Some(&type_decl) = candidates.iter().find(|&&id| {
            matches!(
                self.ctx.decl(id).kind,
                DeclKind::Struct(_) | DeclKind::TemplateStruct(_)
            )
        }) {
            return self.process_constructor_call(frame, type_decl, template_args, args, span);
        }

        // Materialize function-template candidates on demand.
        let mut callable: Vec<DeclId> = Vec::new();
        for candidate in candidates {
            match &self.ctx.decl(candidate).kind {
                DeclKind::Function(_) => {
                    if template_args.is_empty() {
                        callable.push(candidate);
                    }
                }
                DeclKind::TemplateFunction(_) => {
                    if !template_args.is_empty() {
                        let inst = {
                            let mut instantiator =
                                DeclInstantiator::new(self.ctx, self.protos, self.target.clone());
                            instantiator.instantiate_function_template(
                                frame.file,
                                candidate,
                                template_args.clone(),
                                span,
                            )?
                        };
                        // The fresh instantiation's body needs processing
                        // too; its template may already have been visited.
                        self.process_decl(frame.file, inst)?;
                        callable.push(inst);
                    }
                }
                _ => {}
            }
        }

        if callable.is_empty() {
            return Err(SemaError::new(
                format!("`{name}` is not callable with these arguments"),
                span,
            ));
        }

        let chosen = self.pick_overload(name, &callable, &args, span)?;

        self.coerce_call_args(frame, chosen, &mut args)?;

        let return_type = self
            .ctx
            .decl(chosen)
            .function()
            .and_then(|func| func.return_type.clone())
            .unwrap_or_else(|| Type::void(span));

        self.register_temporary(frame, &return_type);

        // Instance methods called bare bind through `self`.
        let is_instance = self
            .ctx
            .decl(chosen)
            .function()
            .is_some_and(|func| func.self_type.is_some());

        let kind = if is_instance {
            let Some(self_type) = frame.self_type.clone() else {
                return Err(SemaError::new(
                    format!("cannot call instance function `{name}` from a static context"),
                    span,
                ));
            };
            let mut object = Expr::new(span, ExprKind::CurrentSelf);
            object.value_type = Some(self_type);
            object.is_lvalue = true;
            self.method_call_kind(chosen, object, args)
        } else {
            let mut callee = Expr::new(span, ExprKind::FunctionRef(chosen));
            callee.value_type = Some(self.function_pointer_type(chosen, span));
            ExprKind::FunctionCall {
                callee: Box::new(callee),
                args,
            }
        };

        Ok((kind, return_type, false))
    }

    /// Ranks candidates: exact matches beat conversion matches; ties are
    /// ambiguous and fatal.
    fn pick_overload(
        &self,
        name: &str,
        candidates: &[DeclId],
        args: &[LabeledArgument],
        span: Span,
    ) -> Result<DeclId, SemaError> {
        let comparer = SignatureComparer::new(self.ctx);

        let mut exact: Vec<DeclId> = Vec::new();
        let mut castable: Vec<DeclId> = Vec::new();

        for &candidate in candidates {
            let Some(func) = self.ctx.decl(candidate).function() else {
                continue;
            };
            match comparer.compare_args_to_parameters(&func.params, args) {
                ArgMatchResult::Match => exact.push(candidate),
                ArgMatchResult::Castable => castable.push(candidate),
                ArgMatchResult::Fail => {}
            }
        }

        let pool = if !exact.is_empty() { &exact } else { &castable };
        match pool.len() {
            0 => Err(SemaError::new(
                format!("no matching function for call to `{name}`"),
                span,
            )),
            1 => Ok(pool[0]),
            _ => Err(SemaError::new(
                format!("ambiguous call to `{name}`"),
                span,
            )),
        }
    }

    fn coerce_call_args(
        &mut self,
        frame: &mut Frame,
        function: DeclId,
        args: &mut [LabeledArgument],
    ) -> Result<(), SemaError> {
        let params: Vec<Type> = match self.ctx.decl(function).function() {
            Some(func) => func
                .params
                .iter()
                .filter_map(|&param| match &self.ctx.decl(param).kind {
                    DeclKind::Parameter(p) => Some(p.param_type.clone()),
                    _ => None,
                })
                .collect(),
            None => return Ok(()),
        };

        for (arg, param_type) in args.iter_mut().zip(params.iter()) {
            self.coerce(frame, &mut arg.value, param_type)?;
        }
        Ok(())
    }

    fn method_call_kind(
        &self,
        function: DeclId,
        object: Expr,
        args: Vec<LabeledArgument>,
    ) -> ExprKind {
        let decl = self.ctx.decl(function);

        // Virtual dispatch goes through the owner's vtable slot.
        if decl.is_any_virtual() {
            if let Some(container) = decl.container {
                if let DeclKind::Struct(def) = &self.ctx.decl(container).kind {
                    if let Some(slot) = def.vtable.iter().position(|&entry| entry == function) {
                        let mut callee = Expr::new(
                            object.span,
                            ExprKind::VTableFunctionRef {
                                object: Box::new(object),
                                slot,
                                function,
                            },
                        );
                        callee.value_type =
                            Some(self.function_pointer_type(function, callee.span));
                        return ExprKind::FunctionCall {
                            callee: Box::new(callee),
                            args,
                        };
                    }
                }
            }
        }

        ExprKind::MemberFunctionCall {
            function,
            object: Box::new(object),
            args,
        }
    }

    fn process_constructor_call(
        &mut self,
        frame: &mut Frame,
        type_decl: DeclId,
        template_args: Vec<Expr>,
        mut args: Vec<LabeledArgument>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        // Template struct constructor calls instantiate first.
        let struct_id = if matches!(self.ctx.decl(type_decl).kind, DeclKind::TemplateStruct(_)) {
            let mut ty = Type::new(
                span,
                TypeKind::Templated {
                    candidates: vec![type_decl],
                    args: template_args,
                },
            );
            let mut instantiator = DeclInstantiator::new(self.ctx, self.protos, self.target.clone());
            instantiator_finish(&mut instantiator, frame.file, frame.func, &mut ty)?;
            match ty.kind {
                TypeKind::Struct(id) => id,
                _ => {
                    return Err(SemaError::new(
                        "template instantiation did not produce a struct",
                        span,
                    ));
                }
            }
        } else {
            type_decl
        };

        let constructors: Vec<DeclId> = match &self.ctx.decl(struct_id).kind {
            DeclKind::Struct(def) => def.constructors.clone(),
            _ => Vec::new(),
        };

        if constructors.is_empty() {
            return Err(SemaError::new(
                format!(
                    "`{}` has no constructors",
                    self.ctx.decl(struct_id).name.node
                ),
                span,
            ));
        }

        let name = self.ctx.decl(struct_id).name.node.clone();
        let chosen = self.pick_overload(&name, &constructors, &args, span)?;
        self.coerce_call_args(frame, chosen, &mut args)?;

        let ty = Type::new(span, TypeKind::Struct(struct_id));
        self.register_temporary(frame, &ty);

        Ok((
            ExprKind::ConstructorCall {
                constructor: chosen,
                args,
            },
            ty,
            false,
        ))
    }

    fn process_method_call(
        &mut self,
        frame: &mut Frame,
        is_arrow: bool,
        mut object: Expr,
        method: String,
        mut template_args: Vec<Expr>,
        mut args: Vec<LabeledArgument>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        self.resolve_template_arg_exprs(frame, &mut template_args)?;
        self.auto_deref(&mut object, is_arrow, span)?;

        let object_type = object.value_type.clone().expect("object was processed");
        let type_decl = match &object_type.kind {
            TypeKind::Struct(id) | TypeKind::Trait(id) => *id,
            _ => {
                return Err(SemaError::new(
                    format!(
                        "`{}` has no member functions",
                        object_type.describe(self.ctx)
                    ),
                    span,
                ));
            }
        };

        let mut candidates: Vec<DeclId> = self
            .type_member_decls(type_decl)
            .into_iter()
            .filter(|&id| self.ctx.decl(id).name.node == method)
            .collect();

        // Materialize template methods when explicit arguments are given.
        if !template_args.is_empty() {
            let mut instantiated = Vec::new();
            for candidate in candidates {
                if matches!(self.ctx.decl(candidate).kind, DeclKind::TemplateFunction(_)) {
                    let inst = {
                        let mut instantiator =
                            DeclInstantiator::new(self.ctx, self.protos, self.target.clone());
                        instantiator.instantiate_function_template(
                            frame.file,
                            candidate,
                            template_args.clone(),
                            span,
                        )?
                    };
                    self.process_decl(frame.file, inst)?;
                    instantiated.push(inst);
                }
            }
            candidates = instantiated;
        } else {
            candidates.retain(|&id| {
                matches!(
                    self.ctx.decl(id).kind,
                    DeclKind::Function(_) | DeclKind::CallOperator(_)
                )
            });
        }

        if candidates.is_empty() {
            return Err(SemaError::new(
                format!(
                    "`{}` has no member function named `{method}`",
                    object_type.describe(self.ctx)
                ),
                span,
            ));
        }

        let chosen = self.pick_overload(&method, &candidates, &args, span)?;
        self.coerce_call_args(frame, chosen, &mut args)?;

        let return_type = self
            .ctx
            .decl(chosen)
            .function()
            .and_then(|func| func.return_type.clone())
            .unwrap_or_else(|| Type::void(span));
        self.register_temporary(frame, &return_type);

        Ok((self.method_call_kind(chosen, object, args), return_type, false))
    }

    fn process_member_access(
        &mut self,
        frame: &mut Frame,
        is_arrow: bool,
        object: Expr,
        member: ghoul_ast::Ident,
        template_args: Vec<Expr>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        // Qualified names: namespace members and enum constants.
        if !is_arrow && template_args.is_empty() {
            if let Some((path, last, last_args)) = expr_as_dotted_name(&object) {
                if last_args.is_empty() {
                    let mut full: Vec<String> = path.iter().map(|seg| seg.node.clone()).collect();
                    full.push(last.node.clone());

                    let lookup = NameLookup::new(self.ctx, self.protos);
                    if let Some(proto) = lookup.resolve_namespace(frame.file, &full) {
                        let found = proto
                            .members
                            .iter()
                            .copied()
                            .find(|&id| self.ctx.decl(id).name.node == member.node);
                        if let Some(found) = found {
                            return self.namespace_member_ref(found, span);
                        }
                        return Err(SemaError::new(
                            format!(
                                "namespace `{}` has no member `{}`",
                                full.join("."),
                                member.node
                            ),
                            span,
                        ));
                    }

                    // `Color.red` style enum constant access.
                    if path.is_empty() {
                        let lookup = NameLookup::new(self.ctx, self.protos);
                        let enum_decl = lookup
                            .lookup(frame.file, frame.container, &last.node)
                            .into_iter()
                            .find(|&id| matches!(self.ctx.decl(id).kind, DeclKind::Enum(_)));
                        if let Some(enum_decl) = enum_decl {
                            let constant = match &self.ctx.decl(enum_decl).kind {
                                DeclKind::Enum(def) => def
                                    .consts
                                    .iter()
                                    .copied()
                                    .find(|&id| self.ctx.decl(id).name.node == member.node),
                                _ => None,
                            };
                            let Some(constant) = constant else {
                                return Err(SemaError::new(
                                    format!(
                                        "enum `{}` has no case named `{}`",
                                        last.node, member.node
                                    ),
                                    span,
                                ));
                            };
                            return Ok((
                                ExprKind::EnumConstRef(constant),
                                Type::new(span, TypeKind::Enum(enum_decl)),
                                false,
                            ));
                        }
                    }
                }
            }
        }

        let mut object = object;
        self.process_expr(frame, &mut object)?;

        // Static member access through a type expression.
        if let ExprKind::Type(ty) = &object.kind {
            if let TypeKind::Struct(type_decl) | TypeKind::Trait(type_decl) = ty.kind {
                let found = self
                    .type_member_decls(type_decl)
                    .into_iter()
                    .find(|&id| {
                        let decl = self.ctx.decl(id);
                        decl.name.node == member.node && decl.is_static()
                    });
                if let Some(found) = found {
                    return self.namespace_member_ref(found, span);
                }
            }
            if let TypeKind::Enum(enum_decl) = ty.kind {
                let constant = match &self.ctx.decl(enum_decl).kind {
                    DeclKind::Enum(def) => def
                        .consts
                        .iter()
                        .copied()
                        .find(|&id| self.ctx.decl(id).name.node == member.node),
                    _ => None,
                };
                if let Some(constant) = constant {
                    return Ok((
                        ExprKind::EnumConstRef(constant),
                        Type::new(span, TypeKind::Enum(enum_decl)),
                        false,
                    ));
                }
            }
        }

        self.auto_deref(&mut object, is_arrow, span)?;

        let object_type = object.value_type.clone().expect("object was processed");
        let TypeKind::Struct(type_decl) = object_type.kind else {
            return Err(SemaError::new(
                format!("`{}` has no members", object_type.describe(self.ctx)),
                span,
            ));
        };

        let members = self.type_member_decls(type_decl);

        // Field access.
        if let Some(&field) = members.iter().find(|&&id| {
            let decl = self.ctx.decl(id);
            decl.name.node == member.node
                && matches!(decl.kind, DeclKind::Variable(_))
                && !decl.is_static()
        }) {
            let ty = match &self.ctx.decl(field).kind {
                DeclKind::Variable(var) => var.var_type.clone().ok_or_else(|| {
                    SemaError::new("member variable has no resolved type", span)
                })?,
                _ => unreachable!("filtered above"),
            };
            let is_lvalue = object.is_lvalue;
            return Ok((
                ExprKind::MemberVariableRef {
                    object: Box::new(object),
                    field,
                },
                ty,
                is_lvalue,
            ));
        }

        // Property read resolves to its getter.
        if let Some(&property) = members.iter().find(|&&id| {
            let decl = self.ctx.decl(id);
            decl.name.node == member.node && matches!(decl.kind, DeclKind::Property(_))
        }) {
            let DeclKind::Property(prop) = &self.ctx.decl(property).kind else {
                unreachable!("filtered above");
            };
            let getter = prop
                .getters
                .iter()
                .copied()
                .min_by_key(|&getter| match &self.ctx.decl(getter).kind {
                    DeclKind::PropertyGet(accessor) => match accessor.result {
                        GetResult::Normal => 0,
                        GetResult::Ref => 1,
                        GetResult::RefMut => 2,
                    },
                    _ => 3,
                });
            let Some(getter) = getter else {
                return Err(SemaError::new(
                    format!("property `{}` has no getter", member.node),
                    span,
                ));
            };
            let ty = self
                .ctx
                .decl(getter)
                .function()
                .and_then(|func| func.return_type.clone())
                .unwrap_or_else(|| Type::void(span));
            return Ok((
                ExprKind::MemberFunctionCall {
                    function: getter,
                    object: Box::new(object),
                    args: Vec::new(),
                },
                ty,
                false,
            ));
        }

        // A bare method reference (no call yet).
        if let Some(&function) = members.iter().find(|&&id| {
            let decl = self.ctx.decl(id);
            decl.name.node == member.node && matches!(decl.kind, DeclKind::Function(_))
        }) {
            let _ = template_args;
            let ty = self.function_pointer_type(function, span);
            return Ok((
                ExprKind::MemberFunctionCall {
                    function,
                    object: Box::new(object),
                    args: Vec::new(),
                },
                ty,
                false,
            ));
        }

        Err(SemaError::new(
            format!(
                "`{}` has no member named `{}`",
                object_type.describe(self.ctx),
                member.node
            ),
            span,
        ))
    }

    fn namespace_member_ref(
        &mut self,
        decl_id: DeclId,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        match &self.ctx.decl(decl_id).kind {
            DeclKind::Variable(var) => {
                let ty = var.var_type.clone().ok_or_else(|| {
                    SemaError::new("variable has no resolved type", span)
                })?;
                Ok((ExprKind::VariableRef(decl_id), ty, true))
            }
            DeclKind::Function(_) => {
                let ty = self.function_pointer_type(decl_id, span);
                Ok((ExprKind::FunctionRef(decl_id), ty, false))
            }
            DeclKind::Struct(_) | DeclKind::Enum(_) | DeclKind::Trait(_) => {
                let kind = match &self.ctx.decl(decl_id).kind {
                    DeclKind::Struct(_) => TypeKind::Struct(decl_id),
                    DeclKind::Enum(_) => TypeKind::Enum(decl_id),
                    _ => TypeKind::Trait(decl_id),
                };
                let ty = Type::new(span, kind);
                Ok((ExprKind::Type(Box::new(ty.clone())), ty, false))
            }
            other => Err(SemaError::new(
                format!("cannot reference this declaration here ({})", kind_name(other)),
                span,
            )),
        }
    }

    fn process_subscript_read(
        &mut self,
        frame: &mut Frame,
        mut target: Expr,
        args: Vec<LabeledArgument>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        self.auto_deref(&mut target, false, span)?;
        let target_type = target.value_type.clone().expect("target was processed");

        match &target_type.kind {
            // Built-in indexing keeps its shape; only the type is assigned.
            TypeKind::FlatArray { element, .. } | TypeKind::Dimension { element, .. } => {
                let ty = (**element).clone();
                let is_lvalue = target.is_lvalue;
                Ok((
                    ExprKind::SubscriptCall {
                        target: Box::new(target),
                        args,
                    },
                    ty,
                    is_lvalue,
                ))
            }
            TypeKind::Pointer(inner) => {
                let ty = (**inner).clone();
                Ok((
                    ExprKind::SubscriptCall {
                        target: Box::new(target),
                        args,
                    },
                    ty,
                    true,
                ))
            }
            TypeKind::Struct(type_decl) => {
                let subscript = self
                    .type_member_decls(*type_decl)
                    .into_iter()
                    .find(|&id| matches!(self.ctx.decl(id).kind, DeclKind::Subscript(_)));
                let Some(subscript) = subscript else {
                    return Err(SemaError::new(
                        format!(
                            "`{}` has no subscript operator",
                            target_type.describe(self.ctx)
                        ),
                        span,
                    ));
                };

                let DeclKind::Subscript(sub) = &self.ctx.decl(subscript).kind else {
                    unreachable!("filtered above");
                };
                let getter = sub
                    .getters
                    .iter()
                    .copied()
                    .min_by_key(|&getter| match &self.ctx.decl(getter).kind {
                        DeclKind::SubscriptGet(accessor) => match accessor.result {
                            GetResult::Normal => 0,
                            GetResult::Ref => 1,
                            GetResult::RefMut => 2,
                        },
                        _ => 3,
                    });
                let Some(getter) = getter else {
                    return Err(SemaError::new("subscript has no getter", span));
                };

                let ty = self
                    .ctx
                    .decl(getter)
                    .function()
                    .and_then(|func| func.return_type.clone())
                    .unwrap_or_else(|| Type::void(span));
                self.register_temporary(frame, &ty);

                Ok((
                    ExprKind::MemberFunctionCall {
                        function: getter,
                        object: Box::new(target),
                        args,
                    },
                    ty,
                    false,
                ))
            }
            _ => Err(SemaError::new(
                format!("`{}` cannot be subscripted", target_type.describe(self.ctx)),
                span,
            )),
        }
    }

    // Operators -------------------------------------------------------------

    fn process_prefix(
        &mut self,
        frame: &mut Frame,
        op: PrefixOperator,
        expr: Box<Expr>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        let operand_type = expr.value_type.clone().expect("operand was processed");

        // Struct operands dispatch to a declared prefix operator.
        if let TypeKind::Struct(type_decl) = operand_type.kind {
            if let Some(overload) = self.find_operator(type_decl, OperatorKind::Prefix(op)) {
                let ty = self
                    .ctx
                    .decl(overload)
                    .function()
                    .and_then(|func| func.return_type.clone())
                    .unwrap_or_else(|| Type::void(span));
                self.register_temporary(frame, &ty);
                return Ok((self.method_call_kind(overload, *expr, Vec::new()), ty, false));
            }
        }

        match op {
            PrefixOperator::Increment | PrefixOperator::Decrement => {
                self.expect_numeric(&expr)?;
                self.expect_assignable(&expr)?;
                let ty = operand_type;
                Ok((ExprKind::Prefix { op, expr }, ty, true))
            }
            PrefixOperator::Positive | PrefixOperator::Negative => {
                self.expect_numeric(&expr)?;
                Ok((ExprKind::Prefix { op, expr }, operand_type, false))
            }
            PrefixOperator::LogicalNot => {
                self.expect_bool(&expr)?;
                Ok((
                    ExprKind::Prefix { op, expr },
                    Type::builtin(span, BuiltInKind::Bool),
                    false,
                ))
            }
            PrefixOperator::BitwiseNot => {
                self.expect_integer(&expr)?;
                Ok((ExprKind::Prefix { op, expr }, operand_type, false))
            }
            PrefixOperator::Dereference => match &operand_type.kind {
                TypeKind::Pointer(inner) => {
                    let ty = (**inner).clone();
                    Ok((ExprKind::Prefix { op, expr }, ty, true))
                }
                _ => Err(SemaError::new(
                    format!(
                        "cannot dereference `{}`",
                        operand_type.describe(self.ctx)
                    ),
                    span,
                )),
            },
            PrefixOperator::AddressOf => {
                if !expr.is_lvalue {
                    return Err(SemaError::new(
                        "cannot take the address of an r-value",
                        span,
                    ));
                }
                let ty = Type::new(span, TypeKind::Pointer(Box::new(operand_type)));
                Ok((ExprKind::Prefix { op, expr }, ty, false))
            }
            PrefixOperator::SizeOf | PrefixOperator::AlignOf | PrefixOperator::OffsetOf => Ok((
                ExprKind::Prefix { op, expr },
                Type::builtin(span, BuiltInKind::Usize),
                false,
            )),
            PrefixOperator::NameOf => {
                let mut element = Type::builtin(span, BuiltInKind::U8);
                element.qualifier = TypeQualifier::Immut;
                Ok((
                    ExprKind::Prefix { op, expr },
                    Type::new(span, TypeKind::Pointer(Box::new(element))),
                    false,
                ))
            }
            PrefixOperator::TraitsOf => Ok((
                ExprKind::Prefix { op, expr },
                Type::builtin(span, BuiltInKind::Usize),
                false,
            )),
        }
    }

    fn process_postfix(
        &mut self,
        frame: &mut Frame,
        op: PostfixOperator,
        expr: Box<Expr>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        let operand_type = expr.value_type.clone().expect("operand was processed");

        if let TypeKind::Struct(type_decl) = operand_type.kind {
            if let Some(overload) = self.find_operator(type_decl, OperatorKind::Postfix(op)) {
                let ty = self
                    .ctx
                    .decl(overload)
                    .function()
                    .and_then(|func| func.return_type.clone())
                    .unwrap_or_else(|| Type::void(span));
                self.register_temporary(frame, &ty);
                return Ok((self.method_call_kind(overload, *expr, Vec::new()), ty, false));
            }
        }

        self.expect_numeric(&expr)?;
        self.expect_assignable(&expr)?;
        Ok((ExprKind::Postfix { op, expr }, operand_type, false))
    }

    fn process_infix(
        &mut self,
        frame: &mut Frame,
        op: InfixOperator,
        mut left: Box<Expr>,
        mut right: Box<Expr>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        let left_type = left.value_type.clone().expect("operand was processed");
        let right_type = right.value_type.clone().expect("operand was processed");

        // Operator overloads on struct operands.
        if let TypeKind::Struct(type_decl) = left_type.kind {
            if let Some(overload) = self.find_operator(type_decl, OperatorKind::Infix(op)) {
                let ty = self
                    .ctx
                    .decl(overload)
                    .function()
                    .and_then(|func| func.return_type.clone())
                    .unwrap_or_else(|| Type::void(span));
                self.register_temporary(frame, &ty);
                let args = vec![LabeledArgument {
                    label: ghoul_ast::Ident::new(right.span, UNLABELED.to_string()),
                    value: *right,
                }];
                return Ok((self.method_call_kind(overload, *left, args), ty, false));
            }
        }

        if op.is_logical() {
            self.expect_bool(&left)?;
            self.expect_bool(&right)?;
            return Ok((
                ExprKind::Infix { op, left, right },
                Type::builtin(span, BuiltInKind::Bool),
                false,
            ));
        }

        // Pointer and enum comparisons.
        let compare = TypeCompareUtil::new(self.ctx);
        if op.is_comparison()
            && matches!(left_type.kind, TypeKind::Pointer(_) | TypeKind::Enum(_))
            && compare.are_same(&left_type, &right_type, TemplateComparePlan::Strict)
        {
            return Ok((
                ExprKind::Infix { op, left, right },
                Type::builtin(span, BuiltInKind::Bool),
                false,
            ));
        }

        self.expect_numeric(&left)?;
        self.expect_numeric(&right)?;

        // Unify operand types by widening.
        let unified = if compare.are_same(&left_type, &right_type, TemplateComparePlan::Strict) {
            left_type
        } else if implicit_cast_allowed(self.ctx, &left_type, &right_type) {
            self.coerce(frame, &mut left, &right_type)?;
            right_type
        } else if implicit_cast_allowed(self.ctx, &right_type, &left_type) {
            self.coerce(frame, &mut right, &left_type)?;
            left_type
        } else {
            return Err(SemaError::new(
                format!(
                    "invalid operands to `{op}`: `{}` and `{}`",
                    left_type.describe(self.ctx),
                    right_type.describe(self.ctx)
                ),
                span,
            ));
        };

        let ty = if op.is_comparison() {
            Type::builtin(span, BuiltInKind::Bool)
        } else {
            unified
        };

        Ok((ExprKind::Infix { op, left, right }, ty, false))
    }

    fn process_assign(
        &mut self,
        frame: &mut Frame,
        compound: Option<InfixOperator>,
        target: Box<Expr>,
        mut value: Box<Expr>,
        span: Span,
    ) -> Result<(ExprKind, Type, bool), SemaError> {
        // Subscript and property writes go through setters.
        if let ExprKind::MemberFunctionCall {
            function,
            object,
            args,
        } = &target.kind
        {
            let owner = self.accessor_owner(*function);
            if let Some((setter, element_type)) = owner {
                if compound.is_some() {
                    return Err(SemaError::new(
                        "compound assignment through accessors is not supported",
                        span,
                    ));
                }
                self.coerce(frame, &mut value, &element_type)?;
                let mut setter_args = args.clone();
                setter_args.push(LabeledArgument {
                    label: ghoul_ast::Ident::new(value.span, UNLABELED.to_string()),
                    value: *value,
                });
                let ty = Type::void(span);
                return Ok((
                    ExprKind::MemberFunctionCall {
                        function: setter,
                        object: object.clone(),
                        args: setter_args,
                    },
                    ty,
                    false,
                ));
            }
        }

        self.expect_assignable(&target)?;
        let target_type = target.value_type.clone().expect("target was processed");

        if let Some(op) = compound {
            if !op.is_comparison() && !op.is_logical() {
                self.expect_numeric(&target)?;
                self.expect_numeric(&value)?;
            }
        }

        self.coerce(frame, &mut value, &target_type)?;

        Ok((
            ExprKind::Assign {
                compound,
                target,
                value,
            },
            target_type,
            false,
        ))
    }

    /// If the target of an accessor-returning read has a sibling setter,
    /// returns it with the element type.
    fn accessor_owner(&self, getter: DeclId) -> Option<(DeclId, Type)> {
        let container = self.ctx.decl(getter).container?;
        match &self.ctx.decl(container).kind {
            DeclKind::Property(prop) if prop.getters.contains(&getter) => {
                let setter = prop.setter?;
                Some((setter, prop.property_type.clone()))
            }
            DeclKind::Subscript(sub) if sub.getters.contains(&getter) => {
                let setter = sub.setter?;
                Some((setter, sub.element_type.clone()))
            }
            _ => None,
        }
    }

    fn find_operator(&self, type_decl: DeclId, op: OperatorKind) -> Option<DeclId> {
        self.type_member_decls(type_decl)
            .into_iter()
            .find(|&id| match &self.ctx.decl(id).kind {
                DeclKind::Operator(decl) => decl.op == op,
                _ => false,
            })
    }

    // Conversions -----------------------------------------------------------

    /// Inserts the implicit conversions needed to give `expr` the target
    /// type: identity (with l-to-r adjustment), single-step autoderef,
    /// widening and derived-to-base casts. Anything else is a fatal
    /// conversion error.
    fn coerce(&mut self, frame: &mut Frame, expr: &mut Expr, target: &Type) -> Result<(), SemaError> {
        let _ = frame;
        let from = expr.value_type.clone().expect("expression was processed");
        let compare = TypeCompareUtil::new(self.ctx);

        let mut from_unqualified = from.clone();
        from_unqualified.qualifier = TypeQualifier::Unassigned;
        let mut target_unqualified = target.clone();
        target_unqualified.qualifier = TypeQualifier::Unassigned;

        // Identity modulo qualifiers; an l-value used where an r-value is
        // required reads through.
        if compare.are_same(
            &from_unqualified,
            &target_unqualified,
            TemplateComparePlan::Strict,
        ) {
            if expr.is_lvalue && !target.is_reference() {
                wrap_expr(expr, |inner| ExprKind::LValueToRValue(Box::new(inner)));
                expr.value_type = Some(target.clone());
                expr.is_lvalue = false;
            }
            return Ok(());
        }

        // `ref T` parameters accept plain l-values directly.
        if let TypeKind::Reference(target_inner) = &target.kind {
            let mut inner_unqualified = (**target_inner).clone();
            inner_unqualified.qualifier = TypeQualifier::Unassigned;
            if expr.is_lvalue
                && compare.are_same(
                    &from_unqualified,
                    &inner_unqualified,
                    TemplateComparePlan::Strict,
                )
            {
                if target_inner.qualifier == TypeQualifier::Mut
                    && from.qualifier == TypeQualifier::Immut
                {
                    return Err(SemaError::new(
                        "cannot pass an immutable value as `ref mut`",
                        expr.span,
                    ));
                }
                return Ok(());
            }
        }

        // Single-step autoderef.
        if let TypeKind::Reference(inner) = &from.kind {
            let inner = (**inner).clone();
            if compare.are_same(&inner, target, TemplateComparePlan::Strict)
                || implicit_cast_allowed(self.ctx, &inner, target)
            {
                wrap_expr(expr, |e| ExprKind::ImplicitDeref(Box::new(e)));
                expr.value_type = Some(inner.clone());
                expr.is_lvalue = true;
                return self.coerce(frame, expr, target);
            }
        }

        if implicit_cast_allowed(self.ctx, &from, target) {
            if expr.is_lvalue {
                wrap_expr(expr, |inner| ExprKind::LValueToRValue(Box::new(inner)));
                expr.is_lvalue = false;
            }
            let to = target.clone();
            wrap_expr(expr, |inner| ExprKind::ImplicitCast {
                to: to.clone(),
                expr: Box::new(inner),
            });
            expr.value_type = Some(target.clone());
            return Ok(());
        }

        Err(SemaError::new(
            format!(
                "cannot implicitly convert `{}` to `{}` (an explicit `as` cast may be required)",
                from.describe(self.ctx),
                target.describe(self.ctx)
            ),
            expr.span,
        ))
    }

    fn register_temporary(&mut self, frame: &mut Frame, ty: &Type) {
        if matches!(ty.kind, TypeKind::Struct(_)) {
            let name = frame.next_temp_name();
            frame.pending_temporaries.push((name, ty.clone()));
        }
    }

    // Checks ----------------------------------------------------------------

    fn expect_bool(&self, expr: &Expr) -> Result<(), SemaError> {
        let ty = expr.value_type.as_ref().expect("expression was processed");
        match &ty.kind {
            TypeKind::BuiltIn(BuiltInKind::Bool) => Ok(()),
            _ => Err(SemaError::new(
                format!("expected `bool`, found `{}`", ty.describe(self.ctx)),
                expr.span,
            )),
        }
    }

    fn expect_numeric(&self, expr: &Expr) -> Result<(), SemaError> {
        let ty = expr.value_type.as_ref().expect("expression was processed");
        match &ty.kind {
            TypeKind::BuiltIn(builtin) if builtin.is_integer() || builtin.is_float() => Ok(()),
            _ => Err(SemaError::new(
                format!("expected a numeric type, found `{}`", ty.describe(self.ctx)),
                expr.span,
            )),
        }
    }

    fn expect_integer(&self, expr: &Expr) -> Result<(), SemaError> {
        let ty = expr.value_type.as_ref().expect("expression was processed");
        match &ty.kind {
            TypeKind::BuiltIn(builtin) if builtin.is_integer() => Ok(()),
            _ => Err(SemaError::new(
                format!("expected an integer type, found `{}`", ty.describe(self.ctx)),
                expr.span,
            )),
        }
    }

    fn expect_assignable(&self, expr: &Expr) -> Result<(), SemaError> {
        if !expr.is_lvalue {
            return Err(SemaError::new("cannot assign to an r-value", expr.span));
        }
        let ty = expr.value_type.as_ref().expect("expression was processed");
        if ty.qualifier == TypeQualifier::Immut {
            return Err(SemaError::new("cannot assign to an immutable value", expr.span));
        }
        Ok(())
    }

    fn auto_deref(&self, expr: &mut Expr, is_arrow: bool, span: Span) -> Result<(), SemaError> {
        let ty = expr.value_type.clone().expect("expression was processed");
        match &ty.kind {
            TypeKind::Reference(inner) => {
                let inner = (**inner).clone();
                wrap_expr(expr, |e| ExprKind::ImplicitDeref(Box::new(e)));
                expr.value_type = Some(inner);
                expr.is_lvalue = true;
                Ok(())
            }
            TypeKind::Pointer(inner) => {
                if !is_arrow {
                    return Err(SemaError::new(
                        "use `->` to access members through a pointer",
                        span,
                    ));
                }
                let inner = (**inner).clone();
                wrap_expr(expr, |e| {
                    ExprKind::Prefix {
                        op: PrefixOperator::Dereference,
                        expr: Box::new(e),
                    }
                });
                expr.value_type = Some(inner);
                expr.is_lvalue = true;
                Ok(())
            }
            _ => {
                if is_arrow {
                    return Err(SemaError::new(
                        "`->` requires a pointer operand",
                        span,
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Replaces the expression with a wrapper node built from the original.
fn wrap_expr(expr: &mut Expr, build: impl FnOnce(Expr) -> ExprKind) {
    let span = expr.span;
    let inner = std::mem::replace(expr, Expr::new(span, ExprKind::CurrentSelf));
    let kind = build(inner);
    *expr = Expr::new(span, kind);
}

fn collect_goto_labels(compound: &CompoundStmt, labels: &mut HashSet<String>) {
    for stmt in &compound.stmts {
        collect_goto_labels_stmt(stmt, labels);
    }
}

fn collect_goto_labels_stmt(stmt: &Stmt, labels: &mut HashSet<String>) {
    match stmt {
        Stmt::Labeled(labeled) => {
            labels.insert(labeled.label.node.clone());
            collect_goto_labels_stmt(&labeled.stmt, labels);
        }
        Stmt::Compound(compound) => collect_goto_labels(compound, labels),
        Stmt::If(if_stmt) => {
            collect_goto_labels(&if_stmt.then_block, labels);
            if let Some(else_block) = &if_stmt.else_block {
                collect_goto_labels_stmt(else_block, labels);
            }
        }
        Stmt::While(while_stmt) => collect_goto_labels(&while_stmt.body, labels),
        Stmt::RepeatWhile(repeat) => collect_goto_labels(&repeat.body, labels),
        Stmt::For(for_stmt) => collect_goto_labels(&for_stmt.body, labels),
        Stmt::Switch(switch) => {
            for case in &switch.cases {
                for stmt in &case.body {
                    collect_goto_labels_stmt(stmt, labels);
                }
            }
        }
        Stmt::Do(do_stmt) => collect_goto_labels(&do_stmt.body, labels),
        Stmt::DoCatch(do_catch) => {
            collect_goto_labels(&do_catch.body, labels);
            for catch in &do_catch.catches {
                collect_goto_labels(&catch.body, labels);
            }
            if let Some(finally) = &do_catch.finally {
                collect_goto_labels(finally, labels);
            }
        }
        _ => {}
    }
}

fn is_case_terminator(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Return(_)
        | Stmt::Goto(_)
        | Stmt::Fallthrough(_) => true,
        Stmt::Labeled(labeled) => is_case_terminator(&labeled.stmt),
        _ => false,
    }
}

fn kind_name(kind: &DeclKind) -> &'static str {
    match kind {
        DeclKind::Namespace(_) => "a namespace",
        DeclKind::Import(_) => "an import",
        DeclKind::TemplateFunction(_) => "a function template",
        DeclKind::TemplateStruct(_) => "a struct template",
        _ => "this declaration",
    }
}

/// Runs the instantiator's type finishing on a free-standing type.
fn instantiator_finish(
    instantiator: &mut DeclInstantiator<'_>,
    file: FileId,
    scope: DeclId,
    ty: &mut Type,
) -> Result<(), SemaError> {
    instantiator.finish_standalone_type(file, scope, ty)
}
