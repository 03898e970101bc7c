use std::collections::HashMap;

use ghoul_ast::{
    AsgContext, CompoundStmt, ConstructorDecl, ConstructorKind, Cont, Decl, DeclId, DeclKind,
    Expr, ExprKind, FileId, FunctionDecl, Ident, InstState, NamespaceDecl, Span, StructKind,
    StructLayout, TemplateInstInfo, Type, TypeKind, TypeQualifier,
};
use tracing::{debug, trace};

use crate::contracts::ContractUtil;
use crate::error::SemaError;
use crate::namespace_prototyper::NamespaceProto;
use crate::signatures::{CompareResult, SignatureComparer};
use crate::target::Target;
use crate::type_compare::{TemplateComparePlan, TypeCompareUtil};
use crate::type_resolver::{resolve_member_type, resolve_type};
use crate::walk;

/// Substitution of template typename parameters for argument types.
struct Subst {
    map: HashMap<DeclId, Type>,
    in_template: bool,
}

/// Lays out structs, instantiates templates on demand, validates `where`
/// contracts, and resolves the type references earlier passes left
/// symbolic.
pub struct DeclInstantiator<'a> {
    ctx: &'a mut AsgContext,
    protos: &'a [NamespaceProto],
    target: Target,
    layout_stack: Vec<DeclId>,
}

impl<'a> DeclInstantiator<'a> {
    pub fn new(
        ctx: &'a mut AsgContext,
        protos: &'a [NamespaceProto],
        target: Target,
    ) -> DeclInstantiator<'a> {
        DeclInstantiator {
            ctx,
            protos,
            target,
            layout_stack: Vec::new(),
        }
    }

    pub fn process_file(&mut self, file: FileId) -> Result<(), SemaError> {
        debug!(file = file.index(), "instantiating declarations");

        let top_decls = self.ctx.file(file).decls.clone();
        for decl_id in top_decls {
            self.process_decl(file, decl_id)
                .map_err(|err| err.with_file(file))?;
        }
        Ok(())
    }

    pub fn process_decl(&mut self, file: FileId, decl_id: DeclId) -> Result<(), SemaError> {
        self.finish_types(file, decl_id)?;

        // Contracts that outlive this pass: `throws` marks the function.
        let decl = self.ctx.decl(decl_id);
        if decl.function().is_some() {
            let throws = decl
                .function()
                .expect("checked above")
                .contracts
                .iter()
                .any(|cont| matches!(cont, Cont::Throws(_)));
            if throws {
                self.ctx
                    .decl_mut(decl_id)
                    .function_mut()
                    .expect("checked above")
                    .throws = true;
            }
        }

        let decl = self.ctx.decl(decl_id);
        let is_concrete_struct =
            matches!(decl.kind, DeclKind::Struct(_)) && !decl.contained_in_template;

        if is_concrete_struct {
            let span = decl.span;
            self.ensure_layout(file, decl_id, span)?;
        }

        let decl = self.ctx.decl(decl_id);
        let mut children = decl.member_ids();
        if let Some(func) = decl.function() {
            children.extend_from_slice(&func.params);
        }
        if let DeclKind::Subscript(subscript) = &decl.kind {
            children.extend_from_slice(&subscript.params);
        }

        for child in children {
            self.process_decl(file, child)?;
        }

        Ok(())
    }

    /// Finishes a free-standing type outside any declaration payload; used
    /// by code processing for types appearing in expression position.
    pub fn finish_standalone_type(
        &mut self,
        file: FileId,
        scope: DeclId,
        ty: &mut Type,
    ) -> Result<(), SemaError> {
        walk::visit_type(ty, &mut |inner: &mut Type| {
            self.finish_type(file, scope, false, inner)
        })
    }

    /// Replaces every remaining symbolic type in the declaration's own
    /// payload: `Templated` becomes a concrete instantiation reference,
    /// nested references are resolved against the now-concrete container.
    fn finish_types(&mut self, file: FileId, decl_id: DeclId) -> Result<(), SemaError> {
        let in_template = {
            let decl = self.ctx.decl(decl_id);
            decl.contained_in_template || decl.template_params().is_some()
        };

        // Work on a copy so lookups rooted at this declaration still see
        // its template parameters and members.
        let mut kind = self.ctx.decl(decl_id).kind.clone();

        walk::visit_decl_kind(&mut kind, &mut |ty: &mut Type| {
            self.finish_type(file, decl_id, in_template, ty)
        })?;

        self.ctx.decl_mut(decl_id).kind = kind;
        Ok(())
    }

    fn finish_type(
        &mut self,
        file: FileId,
        scope: DeclId,
        in_template: bool,
        ty: &mut Type,
    ) -> Result<(), SemaError> {
        match &mut ty.kind {
            TypeKind::Templated { candidates, args } => {
                if in_template && args.iter().any(expr_is_dependent) {
                    // Dependent invocation inside a template body; the
                    // instantiation copy will substitute and recurse.
                    return Ok(());
                }
                let candidates = candidates.clone();
                let args = std::mem::take(args);
                let span = ty.span;
                let (inst, is_trait) = self.instantiate_templated(file, &candidates, args, span)?;
                ty.kind = if is_trait {
                    TypeKind::Trait(inst)
                } else {
                    TypeKind::Struct(inst)
                };
                Ok(())
            }
            TypeKind::UnresolvedNested {
                container,
                name,
                args,
            } => {
                let member_scope = match &container.kind {
                    TypeKind::Struct(id) | TypeKind::Enum(id) | TypeKind::Trait(id) => Some(*id),
                    _ => None,
                };
                match member_scope {
                    Some(container_decl) => {
                        let name = name.clone();
                        let args = std::mem::take(args);
                        ty.kind = resolve_member_type(
                            self.ctx,
                            self.protos,
                            file,
                            container_decl,
                            &name,
                            args,
                            ty.span,
                        )?;
                        // The member reference may itself be a template
                        // application.
                        self.finish_type(file, scope, in_template, ty)
                    }
                    None if in_template => Ok(()),
                    None => Err(SemaError::new(
                        format!("cannot resolve nested type `{}`", name.node),
                        ty.span,
                    )),
                }
            }
            TypeKind::Unresolved { .. } => {
                // Leftovers (template alias values and the like) resolve in
                // this decl's scope, then finish normally.
                resolve_type(self.ctx, self.protos, file, Some(scope), ty)?;
                match &ty.kind {
                    TypeKind::Templated { .. } => self.finish_type(file, scope, in_template, ty),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// The template instantiation algorithm: candidate selection by shape
    /// and `where` satisfaction, specialization ranking by inheritance
    /// distance, structural de-duplication, then deep copy.
    fn instantiate_templated(
        &mut self,
        file: FileId,
        candidates: &[DeclId],
        args: Vec<Expr>,
        span: Span,
    ) -> Result<(DeclId, bool), SemaError> {
        let mut shape_error: Option<String> = None;
        let mut failed_contract: Option<Span> = None;
        let mut satisfied: Vec<(DeclId, u32, Vec<Expr>)> = Vec::new();

        for &candidate in candidates {
            let (params, contracts) = {
                let decl = self.ctx.decl(candidate);
                match &decl.kind {
                    DeclKind::TemplateStruct(template) => (
                        template.template_params.clone(),
                        template.def.contracts.clone(),
                    ),
                    DeclKind::TemplateTrait(template) => (
                        template.template_params.clone(),
                        template.def.contracts.clone(),
                    ),
                    _ => continue,
                }
            };

            let comparer = SignatureComparer::new(self.ctx);
            let normalized = match comparer.compare_template_args_to_parameters(&params, &args) {
                Ok(normalized) => normalized,
                Err(message) => {
                    shape_error.get_or_insert(message);
                    continue;
                }
            };

            let mut all_satisfied = true;
            let mut distance = 0u32;

            for cont in &contracts {
                let Cont::Where(where_cont) = cont else {
                    continue;
                };
                let util = ContractUtil::new(self.ctx, &params, &normalized);
                if !util.check_where_cont(where_cont)? {
                    all_satisfied = false;
                    failed_contract.get_or_insert(where_cont.span);
                    break;
                }
                distance += self.contract_distance(where_cont, &params, &normalized);
            }

            if all_satisfied {
                satisfied.push((candidate, distance, normalized));
            }
        }

        if satisfied.is_empty() {
            if let Some(cont_span) = failed_contract {
                return Err(SemaError::new(
                    "template arguments violate the template's `where` contract",
                    cont_span,
                ));
            }
            return Err(SemaError::new(
                shape_error.unwrap_or_else(|| "no matching template found".to_string()),
                span,
            ));
        }

        let best = satisfied
            .iter()
            .map(|(_, distance, _)| *distance)
            .min()
            .expect("satisfied is non-empty");
        let mut best_matches = satisfied
            .into_iter()
            .filter(|(_, distance, _)| *distance == best);
        let (template_id, _, normalized) = best_matches.next().expect("at least one best match");
        if best_matches.next().is_some() {
            return Err(SemaError::new(
                "ambiguous template specialization: multiple templates satisfy these arguments equally",
                span,
            ));
        }

        let is_trait = matches!(self.ctx.decl(template_id).kind, DeclKind::TemplateTrait(_));

        // Structural de-duplication: two requests with equal argument lists
        // share one instantiation.
        let existing = {
            let instantiations = match &self.ctx.decl(template_id).kind {
                DeclKind::TemplateStruct(template) => template.instantiations.clone(),
                DeclKind::TemplateTrait(template) => template.instantiations.clone(),
                _ => Vec::new(),
            };
            let compare = TypeCompareUtil::new(self.ctx);
            instantiations.into_iter().find(|&inst| {
                let info = match &self.ctx.decl(inst).kind {
                    DeclKind::Struct(def) => def.instantiated_from.as_ref(),
                    DeclKind::Trait(def) => def.instantiated_from.as_ref(),
                    _ => None,
                };
                info.is_some_and(|info| {
                    compare.template_args_same(&info.args, &normalized, TemplateComparePlan::Strict)
                })
            })
        };

        if let Some(existing) = existing {
            trace!(template = ?self.ctx.decl(template_id).name.node, "reusing instantiation");
            return Ok((existing, is_trait));
        }

        trace!(template = ?self.ctx.decl(template_id).name.node, "creating instantiation");
        let inst = self.instantiate_copy(file, template_id, normalized)?;
        Ok((inst, is_trait))
    }

    /// Specialization rank: inheritance steps between the argument and the
    /// constraint it satisfies. The closest specialization wins.
    fn contract_distance(
        &self,
        where_cont: &ghoul_ast::WhereCont,
        params: &[DeclId],
        args: &[Expr],
    ) -> u32 {
        let ExprKind::CheckExtendsType { check, extends } = &where_cont.condition.kind else {
            return 0;
        };
        let TypeKind::TemplateTypenameRef(param) = &check.kind else {
            return 0;
        };
        let Some(index) = params.iter().position(|candidate| candidate == param) else {
            return 0;
        };
        let Some(ExprKind::Type(arg_type)) = args.get(index).map(|arg| &arg.kind) else {
            return 0;
        };
        TypeCompareUtil::new(self.ctx)
            .inheritance_distance(arg_type, extends)
            .unwrap_or(0)
    }

    fn instantiate_copy(
        &mut self,
        file: FileId,
        template_id: DeclId,
        normalized: Vec<Expr>,
    ) -> Result<DeclId, SemaError> {
        let template_decl = self.ctx.decl(template_id).clone();
        let outer_in_template = template_decl.contained_in_template;

        let (params, is_trait) = match &template_decl.kind {
            DeclKind::TemplateStruct(template) => (template.template_params.clone(), false),
            DeclKind::TemplateTrait(template) => (template.template_params.clone(), true),
            _ => unreachable!("only struct and trait templates are copied here"),
        };

        let subst = self.build_subst(&params, &normalized, outer_in_template);

        let info = TemplateInstInfo {
            template: template_id,
            args: normalized,
        };

        let mut inst_decl = Decl::new(
            template_decl.file,
            template_decl.span,
            template_decl.name.clone(),
            DeclKind::Namespace(NamespaceDecl {
                members: Vec::new(),
            }),
        );
        inst_decl.attrs = template_decl.attrs.clone();
        inst_decl.visibility = template_decl.visibility;
        inst_decl.modifiers = template_decl.modifiers;
        inst_decl.is_const_expr = template_decl.is_const_expr;
        inst_decl.container = template_decl.container;
        inst_decl.contained_in_template = outer_in_template;

        inst_decl.kind = match template_decl.kind {
            DeclKind::TemplateStruct(template) => {
                let mut def = template.def.clone();
                def.instantiated_from = Some(info);
                def.state = InstState::Unprocessed;
                for member in def.members.iter_mut() {
                    *member = self.copy_decl(*member, &subst)?;
                }
                for ctor in def.constructors.iter_mut() {
                    *ctor = self.copy_decl(*ctor, &subst)?;
                }
                if let Some(dtor) = def.destructor.as_mut() {
                    *dtor = self.copy_decl(*dtor, &subst)?;
                }
                for inherited in def.inherited.iter_mut() {
                    substitute_type(inherited, &subst);
                }
                let mut kind_holder = DeclKind::Struct(def);
                walk::visit_decl_kind(&mut kind_holder, &mut |ty: &mut Type| {
                    substitute_type(ty, &subst);
                    Ok(())
                })?;
                kind_holder
            }
            DeclKind::TemplateTrait(template) => {
                let mut def = template.def.clone();
                def.instantiated_from = Some(info);
                for member in def.members.iter_mut() {
                    *member = self.copy_decl(*member, &subst)?;
                }
                for inherited in def.inherited.iter_mut() {
                    substitute_type(inherited, &subst);
                }
                let mut kind_holder = DeclKind::Trait(def);
                walk::visit_decl_kind(&mut kind_holder, &mut |ty: &mut Type| {
                    substitute_type(ty, &subst);
                    Ok(())
                })?;
                kind_holder
            }
            _ => unreachable!(),
        };

        let inst_id = self.ctx.alloc(inst_decl);

        // Fix back-references and the `Self` placeholders of the copies.
        let members = self.ctx.decl(inst_id).member_ids();
        for &member in &members {
            self.ctx.decl_mut(member).container = Some(inst_id);
        }
        let self_kind = if is_trait {
            TypeKind::Trait(inst_id)
        } else {
            TypeKind::Struct(inst_id)
        };
        self.replace_self_types(inst_id, template_id, &self_kind)?;

        // Attach to the owning template.
        match &mut self.ctx.decl_mut(template_id).kind {
            DeclKind::TemplateStruct(template) => template.instantiations.push(inst_id),
            DeclKind::TemplateTrait(template) => template.instantiations.push(inst_id),
            _ => {}
        }

        // Recurse: fields, inherited types, nested declarations.
        self.process_decl(file, inst_id)?;

        Ok(inst_id)
    }

    /// Instantiates a function template on first reference; used lazily by
    /// code processing.
    pub fn instantiate_function_template(
        &mut self,
        file: FileId,
        template_id: DeclId,
        args: Vec<Expr>,
        span: Span,
    ) -> Result<DeclId, SemaError> {
        let (params, contracts) = {
            let DeclKind::TemplateFunction(template) = &self.ctx.decl(template_id).kind else {
                return Err(SemaError::new("expected a function template", span));
            };
            (
                template.template_params.clone(),
                template.func.contracts.clone(),
            )
        };

        let comparer = SignatureComparer::new(self.ctx);
        let normalized = comparer
            .compare_template_args_to_parameters(&params, &args)
            .map_err(|message| SemaError::new(message, span))?;

        for cont in &contracts {
            if let Cont::Where(where_cont) = cont {
                let util = ContractUtil::new(self.ctx, &params, &normalized);
                if !util.check_where_cont(where_cont)? {
                    return Err(SemaError::new(
                        "template arguments violate the template's `where` contract",
                        where_cont.span,
                    ));
                }
            }
        }

        // De-duplicate.
        let instantiations = match &self.ctx.decl(template_id).kind {
            DeclKind::TemplateFunction(template) => template.instantiations.clone(),
            _ => Vec::new(),
        };
        let compare = TypeCompareUtil::new(self.ctx);
        for inst in instantiations {
            let info = match &self.ctx.decl(inst).kind {
                DeclKind::Function(func) => func.instantiated_from.as_ref(),
                _ => None,
            };
            if info.is_some_and(|info| {
                compare.template_args_same(&info.args, &normalized, TemplateComparePlan::Strict)
            }) {
                return Ok(inst);
            }
        }

        let template_decl = self.ctx.decl(template_id).clone();
        let DeclKind::TemplateFunction(template) = &template_decl.kind else {
            unreachable!("checked above");
        };

        let subst = self.build_subst(&params, &normalized, template_decl.contained_in_template);

        let mut func: FunctionDecl = template.func.clone();
        func.instantiated_from = Some(TemplateInstInfo {
            template: template_id,
            args: normalized,
        });
        for param in func.params.iter_mut() {
            *param = self.copy_decl(*param, &subst)?;
        }

        let mut kind_holder = DeclKind::Function(func);
        walk::visit_decl_kind(&mut kind_holder, &mut |ty: &mut Type| {
            substitute_type(ty, &subst);
            Ok(())
        })?;

        let mut inst_decl = Decl::new(
            template_decl.file,
            template_decl.span,
            template_decl.name.clone(),
            kind_holder,
        );
        inst_decl.visibility = template_decl.visibility;
        inst_decl.modifiers = template_decl.modifiers;
        inst_decl.is_const_expr = template_decl.is_const_expr;
        inst_decl.container = template_decl.container;
        inst_decl.contained_in_template = template_decl.contained_in_template;

        let inst_id = self.ctx.alloc(inst_decl);

        let params_of_inst = self
            .ctx
            .decl(inst_id)
            .function()
            .expect("just built a function")
            .params
            .clone();
        for param in params_of_inst {
            self.ctx.decl_mut(param).container = Some(inst_id);
        }

        if let DeclKind::TemplateFunction(template) = &mut self.ctx.decl_mut(template_id).kind {
            template.instantiations.push(inst_id);
        }

        self.process_decl(file, inst_id)?;

        Ok(inst_id)
    }

    fn build_subst(&self, params: &[DeclId], args: &[Expr], in_template: bool) -> Subst {
        let mut map = HashMap::new();
        for (&param, arg) in params.iter().zip(args.iter()) {
            if let ExprKind::Type(arg_type) = &arg.kind {
                let mut ty = (**arg_type).clone();
                if type_is_dependent(&ty) && !matches!(ty.kind, TypeKind::Dependent(_)) {
                    ty = Type::new(ty.span, TypeKind::Dependent(Box::new(ty)));
                }
                map.insert(param, ty);
            }
        }
        Subst { map, in_template }
    }

    /// Deep copy of a declaration subtree with fresh ids and substituted
    /// types.
    fn copy_decl(&mut self, id: DeclId, subst: &Subst) -> Result<DeclId, SemaError> {
        let mut decl = self.ctx.decl(id).clone();
        decl.mangled_name = None;
        decl.contained_in_template = subst.in_template;

        match &mut decl.kind {
            DeclKind::Function(func)
            | DeclKind::CallOperator(func)
            | DeclKind::Destructor(func)
            | DeclKind::TypeSuffix(func) => {
                for param in func.params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
            }
            DeclKind::TemplateFunction(template) => {
                for param in template.template_params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
                for param in template.func.params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
                template.instantiations.clear();
            }
            DeclKind::Operator(op) => {
                for param in op.func.params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
            }
            DeclKind::CastOperator(cast) => {
                for param in cast.func.params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
            }
            DeclKind::Constructor(ctor) => {
                for param in ctor.func.params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
            }
            DeclKind::Property(property) => {
                for getter in property.getters.iter_mut() {
                    *getter = self.copy_decl(*getter, subst)?;
                }
                if let Some(setter) = property.setter.as_mut() {
                    *setter = self.copy_decl(*setter, subst)?;
                }
            }
            DeclKind::Subscript(subscript) => {
                for param in subscript.params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
                for getter in subscript.getters.iter_mut() {
                    *getter = self.copy_decl(*getter, subst)?;
                }
                if let Some(setter) = subscript.setter.as_mut() {
                    *setter = self.copy_decl(*setter, subst)?;
                }
            }
            DeclKind::Struct(def) => {
                def.layout = None;
                def.vtable.clear();
                def.vtable_name = None;
                def.state = InstState::Unprocessed;
                for member in def.members.iter_mut() {
                    *member = self.copy_decl(*member, subst)?;
                }
                for ctor in def.constructors.iter_mut() {
                    *ctor = self.copy_decl(*ctor, subst)?;
                }
                if let Some(dtor) = def.destructor.as_mut() {
                    *dtor = self.copy_decl(*dtor, subst)?;
                }
            }
            DeclKind::TemplateStruct(template) => {
                for param in template.template_params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
                for member in template.def.members.iter_mut() {
                    *member = self.copy_decl(*member, subst)?;
                }
                for ctor in template.def.constructors.iter_mut() {
                    *ctor = self.copy_decl(*ctor, subst)?;
                }
                if let Some(dtor) = template.def.destructor.as_mut() {
                    *dtor = self.copy_decl(*dtor, subst)?;
                }
                template.instantiations.clear();
            }
            DeclKind::Trait(def) => {
                for member in def.members.iter_mut() {
                    *member = self.copy_decl(*member, subst)?;
                }
            }
            DeclKind::TemplateTrait(template) => {
                for param in template.template_params.iter_mut() {
                    *param = self.copy_decl(*param, subst)?;
                }
                for member in template.def.members.iter_mut() {
                    *member = self.copy_decl(*member, subst)?;
                }
                template.instantiations.clear();
            }
            DeclKind::Enum(def) => {
                for c in def.consts.iter_mut() {
                    *c = self.copy_decl(*c, subst)?;
                }
                for member in def.members.iter_mut() {
                    *member = self.copy_decl(*member, subst)?;
                }
            }
            DeclKind::Extension(ext) => {
                for member in ext.members.iter_mut() {
                    *member = self.copy_decl(*member, subst)?;
                }
            }
            DeclKind::PropertyGet(_)
            | DeclKind::PropertySet(_)
            | DeclKind::SubscriptGet(_)
            | DeclKind::SubscriptSet(_)
            | DeclKind::Import(_)
            | DeclKind::Namespace(_)
            | DeclKind::TypeAlias(_)
            | DeclKind::EnumConst(_)
            | DeclKind::Variable(_)
            | DeclKind::Parameter(_)
            | DeclKind::TemplateParameter(_)
            | DeclKind::TraitPrototype(_) => {}
        }

        walk::visit_decl_kind(&mut decl.kind, &mut |ty: &mut Type| {
            substitute_type(ty, subst);
            Ok(())
        })?;

        let new_id = self.ctx.alloc(decl);

        let children = self.ctx.decl(new_id).member_ids();
        for child in children {
            self.ctx.decl_mut(child).container = Some(new_id);
        }
        let params = self
            .ctx
            .decl(new_id)
            .function()
            .map(|func| func.params.clone())
            .unwrap_or_default();
        for param in params {
            self.ctx.decl_mut(param).container = Some(new_id);
        }

        Ok(new_id)
    }

    /// Rewrites `Self` and bare self-template references in an
    /// instantiation's subtree to the concrete instantiation type.
    fn replace_self_types(
        &mut self,
        inst_id: DeclId,
        template_id: DeclId,
        self_kind: &TypeKind,
    ) -> Result<(), SemaError> {
        let mut worklist = self.ctx.decl(inst_id).member_ids();

        while let Some(decl_id) = worklist.pop() {
            let decl = self.ctx.decl(decl_id);
            worklist.extend(decl.member_ids());
            if let Some(func) = decl.function() {
                worklist.extend_from_slice(&func.params);
            }

            let mut kind = std::mem::replace(
                &mut self.ctx.decl_mut(decl_id).kind,
                DeclKind::Namespace(NamespaceDecl {
                    members: Vec::new(),
                }),
            );

            let result = walk::visit_decl_kind(&mut kind, &mut |ty: &mut Type| {
                let replace = match &ty.kind {
                    TypeKind::SelfType => true,
                    TypeKind::TemplateStruct(id) | TypeKind::TemplateTrait(id) => {
                        *id == template_id
                    }
                    _ => false,
                };
                if replace {
                    ty.kind = self_kind.clone();
                }
                Ok(())
            });

            self.ctx.decl_mut(decl_id).kind = kind;
            result?;
        }

        Ok(())
    }

    /// Assigns field offsets, size and alignment, appending the base layout
    /// first; union kinds overlap their fields. Cyclic layout dependencies
    /// are fatal and reported with the full cycle path.
    fn ensure_layout(&mut self, file: FileId, decl_id: DeclId, span: Span) -> Result<(), SemaError> {
        let state = match &self.ctx.decl(decl_id).kind {
            DeclKind::Struct(def) => def.state,
            _ => return Ok(()),
        };

        match state {
            InstState::Layouted | InstState::Mangled => return Ok(()),
            InstState::Layouting => {
                let mut cycle: Vec<String> = self
                    .layout_stack
                    .iter()
                    .skip_while(|&&id| id != decl_id)
                    .map(|&id| self.ctx.decl(id).name.node.clone())
                    .collect();
                cycle.push(self.ctx.decl(decl_id).name.node.clone());
                return Err(SemaError::new(
                    format!("cyclic layout dependency: {}", cycle.join(" -> ")),
                    span,
                ));
            }
            InstState::Unprocessed => {}
        }

        if let DeclKind::Struct(def) = &mut self.ctx.decl_mut(decl_id).kind {
            def.state = InstState::Layouting;
        }
        self.layout_stack.push(decl_id);

        let result = self.layout_struct(file, decl_id, span);

        self.layout_stack.pop();
        if let DeclKind::Struct(def) = &mut self.ctx.decl_mut(decl_id).kind {
            def.state = InstState::Layouted;
        }

        result
    }

    fn layout_struct(&mut self, file: FileId, decl_id: DeclId, span: Span) -> Result<(), SemaError> {
        // Member types must be concrete before sizing.
        let members = self.ctx.decl(decl_id).member_ids();
        for &member in &members {
            self.finish_types(file, member)?;
        }

        self.compute_all_inherited(decl_id);

        let (struct_kind, inherited, field_ids) = {
            let DeclKind::Struct(def) = &self.ctx.decl(decl_id).kind else {
                return Ok(());
            };
            let fields: Vec<DeclId> = def
                .members
                .iter()
                .copied()
                .filter(|&member| {
                    let decl = self.ctx.decl(member);
                    matches!(decl.kind, DeclKind::Variable(_)) && !decl.is_static()
                })
                .collect();
            (def.kind, def.inherited.clone(), fields)
        };

        // Inheritance appends the base layout first.
        let mut offset = 0u64;
        let mut align = 1u64;

        if let Some(base_id) = inherited.iter().find_map(|ty| match &ty.kind {
            TypeKind::Struct(id) => Some(*id),
            _ => None,
        }) {
            let base_span = self.ctx.decl(base_id).span;
            self.ensure_layout(file, base_id, base_span)?;
            if let DeclKind::Struct(base) = &self.ctx.decl(base_id).kind {
                if let Some(layout) = &base.layout {
                    offset = layout.size;
                    align = layout.align;
                }
            }
        }

        let mut field_offsets = Vec::with_capacity(field_ids.len());
        let mut union_size = 0u64;

        for field in field_ids {
            let field_type = {
                let DeclKind::Variable(var) = &self.ctx.decl(field).kind else {
                    continue;
                };
                match &var.var_type {
                    Some(ty) => ty.clone(),
                    None => {
                        return Err(SemaError::new(
                            "struct fields must have an explicit type",
                            self.ctx.decl(field).span,
                        ));
                    }
                }
            };

            let (size, field_align) = self.size_and_align(file, &field_type, span)?;
            align = align.max(field_align);

            match struct_kind {
                StructKind::Union => {
                    field_offsets.push((field, 0));
                    union_size = union_size.max(size);
                }
                _ => {
                    offset = round_up(offset, field_align);
                    field_offsets.push((field, offset));
                    offset += size;
                }
            }
        }

        let size = match struct_kind {
            StructKind::Union => round_up(union_size, align),
            _ => round_up(offset, align),
        };

        if let DeclKind::Struct(def) = &mut self.ctx.decl_mut(decl_id).kind {
            def.layout = Some(StructLayout {
                size,
                align,
                field_offsets,
            });
        }

        self.build_vtable(decl_id)?;

        // Structs without any `init` get an implicit default constructor so
        // construction and mangling have a target.
        let needs_default = match &self.ctx.decl(decl_id).kind {
            DeclKind::Struct(def) => def.constructors.is_empty(),
            _ => false,
        };
        if needs_default {
            let struct_decl = self.ctx.decl(decl_id);
            let ctor_span = struct_decl.span;
            let ctor_file = struct_decl.file;
            let mut ctor = Decl::new(
                ctor_file,
                ctor_span,
                Ident::new(ctor_span, "init".to_string()),
                DeclKind::Constructor(ConstructorDecl {
                    kind: ConstructorKind::Normal,
                    base_call: None,
                    func: FunctionDecl::new(
                        Vec::new(),
                        None,
                        Vec::new(),
                        CompoundStmt::empty(ctor_span),
                    ),
                }),
            );
            ctor.container = Some(decl_id);
            let ctor_id = self.ctx.alloc(ctor);
            if let DeclKind::Struct(def) = &mut self.ctx.decl_mut(decl_id).kind {
                def.constructors.push(ctor_id);
            }
        }

        Ok(())
    }

    /// Flattens the declared inheritance into the full inherited-type set,
    /// indirect bases included.
    fn compute_all_inherited(&mut self, decl_id: DeclId) {
        let direct: Vec<Type> = match &self.ctx.decl(decl_id).kind {
            DeclKind::Struct(def) => def.inherited.clone(),
            DeclKind::Trait(def) => def.inherited.clone(),
            _ => return,
        };

        let mut all = Vec::new();
        let mut queue = direct;
        while let Some(ty) = queue.pop() {
            if all
                .iter()
                .any(|known| TypeCompareUtil::new(self.ctx).are_same(known, &ty, TemplateComparePlan::Strict))
            {
                continue;
            }
            let parent = match &ty.kind {
                TypeKind::Struct(id) | TypeKind::Trait(id) => Some(*id),
                _ => None,
            };
            all.push(ty);
            if let Some(parent) = parent {
                match &self.ctx.decl(parent).kind {
                    DeclKind::Struct(def) => queue.extend(def.inherited.iter().cloned()),
                    DeclKind::Trait(def) => queue.extend(def.inherited.iter().cloned()),
                    _ => {}
                }
            }
        }

        match &mut self.ctx.decl_mut(decl_id).kind {
            DeclKind::Struct(def) => def.all_inherited = all,
            DeclKind::Trait(def) => def.all_inherited = all,
            _ => {}
        }
    }

    /// Virtual tables inherit the base table and de-duplicate by
    /// inherited-slot identity: an override replaces the matching slot, a
    /// fresh virtual appends.
    fn build_vtable(&mut self, decl_id: DeclId) -> Result<(), SemaError> {
        let (inherited, members) = {
            let DeclKind::Struct(def) = &self.ctx.decl(decl_id).kind else {
                return Ok(());
            };
            (def.inherited.clone(), def.members.clone())
        };

        let mut table: Vec<DeclId> = Vec::new();
        if let Some(base_id) = inherited.iter().find_map(|ty| match &ty.kind {
            TypeKind::Struct(id) => Some(*id),
            _ => None,
        }) {
            if let DeclKind::Struct(base) = &self.ctx.decl(base_id).kind {
                table = base.vtable.clone();
            }
        }

        let virtual_members: Vec<DeclId> = members
            .into_iter()
            .filter(|&member| {
                let decl = self.ctx.decl(member);
                decl.is_any_virtual() && decl.function().is_some()
            })
            .collect();

        for member in virtual_members {
            let comparer = SignatureComparer::new(self.ctx);
            let slot = table.iter().position(|&slot_fn| {
                comparer.compare_functions(slot_fn, member, false) == CompareResult::Exact
            });

            match slot {
                Some(index) => table[index] = member,
                None => {
                    if self.ctx.decl(member).is_override() {
                        return Err(SemaError::new(
                            format!(
                                "`{}` is marked `override` but no base declares a matching virtual function",
                                self.ctx.decl(member).name.node
                            ),
                            self.ctx.decl(member).span,
                        ));
                    }
                    table.push(member);
                }
            }
        }

        if let DeclKind::Struct(def) = &mut self.ctx.decl_mut(decl_id).kind {
            def.vtable = table;
        }

        Ok(())
    }

    pub fn size_and_align(
        &mut self,
        file: FileId,
        ty: &Type,
        span: Span,
    ) -> Result<(u64, u64), SemaError> {
        let ptr = self.target.ptr_width as u64;

        match &ty.kind {
            TypeKind::BuiltIn(builtin) => match builtin.size_of(self.target.ptr_width) {
                Some(size) => Ok((size, size)),
                None => Err(SemaError::new("`void` has no size", span)),
            },
            TypeKind::Enum(id) => {
                let underlying = match &self.ctx.decl(*id).kind {
                    DeclKind::Enum(def) => def.underlying.clone(),
                    _ => None,
                };
                match underlying {
                    Some(underlying) => self.size_and_align(file, &underlying, span),
                    None => Ok((4, 4)),
                }
            }
            TypeKind::Struct(id) => {
                let struct_span = self.ctx.decl(*id).span;
                self.ensure_layout(file, *id, struct_span)?;
                match &self.ctx.decl(*id).kind {
                    DeclKind::Struct(def) => {
                        let layout = def
                            .layout
                            .as_ref()
                            .expect("layout was just ensured");
                        Ok((layout.size, layout.align))
                    }
                    _ => Err(SemaError::new("expected a struct", span)),
                }
            }
            TypeKind::Alias(id) => {
                let value = match &self.ctx.decl(*id).kind {
                    DeclKind::TypeAlias(alias) => alias.value.clone(),
                    _ => return Err(SemaError::new("expected a typealias", span)),
                };
                self.size_and_align(file, &value, span)
            }
            TypeKind::Pointer(_)
            | TypeKind::Reference(_)
            | TypeKind::RValueReference(_)
            | TypeKind::FunctionPointer { .. }
            // Dynamic-rank arrays are handle-sized.
            | TypeKind::Dimension { .. } => Ok((ptr, ptr)),
            TypeKind::FlatArray { element, length } => {
                let (element_size, element_align) = self.size_and_align(file, element, span)?;
                let length = const_length(length).ok_or_else(|| {
                    SemaError::new("flat array length must be a constant integer", length.span)
                })?;
                Ok((element_size * length, element_align))
            }
            TypeKind::Trait(_) => Err(SemaError::new(
                format!("trait type `{}` has no size", ty.describe(self.ctx)),
                span,
            )),
            _ => Err(SemaError::new(
                format!("cannot compute the size of `{}`", ty.describe(self.ctx)),
                span,
            )),
        }
    }

    /// Validation sweep for templates that were never instantiated: fields
    /// whose types do not depend on a parameter must still be well-formed.
    /// Typename parameters stand in as imaginary argument types.
    pub fn validate_uninstantiated_templates(&mut self, file: FileId) -> Result<(), SemaError> {
        let top_decls = self.ctx.file(file).decls.clone();
        let mut worklist = top_decls;

        while let Some(decl_id) = worklist.pop() {
            let decl = self.ctx.decl(decl_id);
            worklist.extend(decl.member_ids());

            let DeclKind::TemplateStruct(template) = &decl.kind else {
                continue;
            };
            if !template.instantiations.is_empty() {
                continue;
            }

            let params = template.template_params.clone();
            let members = template.def.members.clone();
            let span = decl.span;

            let mut subst_map = HashMap::new();
            for &param in &params {
                let param_span = self.ctx.decl(param).span;
                subst_map.insert(param, Type::new(param_span, TypeKind::Imaginary(param)));
            }
            let subst = Subst {
                map: subst_map,
                in_template: true,
            };

            for member in members {
                let DeclKind::Variable(var) = &self.ctx.decl(member).kind else {
                    continue;
                };
                let Some(var_type) = var.var_type.clone() else {
                    continue;
                };
                let mut checked = var_type;
                substitute_type(&mut checked, &subst);
                if type_is_dependent(&checked) || contains_imaginary(&checked) {
                    continue;
                }
                self.size_and_align(file, &checked, span)?;
            }
        }

        Ok(())
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

fn const_length(expr: &Expr) -> Option<u64> {
    match &expr.kind {
        ExprKind::Literal(literal) => parse_int_literal(&literal.value),
        _ => None,
    }
}

fn parse_int_literal(value: &str) -> Option<u64> {
    if let Some(hex) = value.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = value.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = value.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()
    } else {
        value.parse().ok()
    }
}

fn substitute_type(ty: &mut Type, subst: &Subst) {
    // Children first so nested parameter references are replaced too.
    match &mut ty.kind {
        TypeKind::Pointer(inner)
        | TypeKind::Reference(inner)
        | TypeKind::RValueReference(inner)
        | TypeKind::Dependent(inner) => substitute_type(inner, subst),
        TypeKind::Dimension { element, .. } => substitute_type(element, subst),
        TypeKind::FlatArray { element, .. } => substitute_type(element, subst),
        TypeKind::FunctionPointer {
            params,
            return_type,
        } => {
            for param in params.iter_mut() {
                substitute_type(param, subst);
            }
            substitute_type(return_type, subst);
        }
        TypeKind::Labeled { ty: inner, .. } => substitute_type(inner, subst),
        TypeKind::Templated { args, .. } | TypeKind::Unresolved { args, .. } => {
            for arg in args.iter_mut() {
                if let ExprKind::Type(arg_type) = &mut arg.kind {
                    substitute_type(arg_type, subst);
                }
            }
        }
        TypeKind::UnresolvedNested { container, args, .. } => {
            substitute_type(container, subst);
            for arg in args.iter_mut() {
                if let ExprKind::Type(arg_type) = &mut arg.kind {
                    substitute_type(arg_type, subst);
                }
            }
        }
        _ => {}
    }

    if let TypeKind::TemplateTypenameRef(param) = &ty.kind {
        if let Some(replacement) = subst.map.get(param) {
            let qualifier = ty.qualifier;
            *ty = replacement.clone();
            if qualifier != TypeQualifier::Unassigned {
                ty.qualifier = qualifier;
            }
        }
    }
}

fn type_is_dependent(ty: &Type) -> bool {
    let mut dependent = false;
    inspect_type(ty, &mut |kind| {
        if matches!(
            kind,
            TypeKind::TemplateTypenameRef(_) | TypeKind::Dependent(_) | TypeKind::SelfType
        ) {
            dependent = true;
        }
    });
    dependent
}

fn contains_imaginary(ty: &Type) -> bool {
    let mut found = false;
    inspect_type(ty, &mut |kind| {
        if matches!(kind, TypeKind::Imaginary(_)) {
            found = true;
        }
    });
    found
}

fn expr_is_dependent(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Type(ty) => type_is_dependent(ty),
        // An unresolved identifier in a template body names a const
        // template parameter.
        ExprKind::Identifier { .. } => true,
        _ => false,
    }
}

fn inspect_type(ty: &Type, f: &mut dyn FnMut(&TypeKind)) {
    f(&ty.kind);
    match &ty.kind {
        TypeKind::Pointer(inner)
        | TypeKind::Reference(inner)
        | TypeKind::RValueReference(inner)
        | TypeKind::Dependent(inner) => inspect_type(inner, f),
        TypeKind::Dimension { element, .. } | TypeKind::FlatArray { element, .. } => {
            inspect_type(element, f)
        }
        TypeKind::FunctionPointer {
            params,
            return_type,
        } => {
            for param in params {
                inspect_type(param, f);
            }
            inspect_type(return_type, f);
        }
        TypeKind::Labeled { ty: inner, .. } => inspect_type(inner, f),
        TypeKind::Templated { args, .. } | TypeKind::Unresolved { args, .. } => {
            for arg in args {
                if let ExprKind::Type(arg_type) = &arg.kind {
                    inspect_type(arg_type, f);
                }
            }
        }
        TypeKind::UnresolvedNested { container, args, .. } => {
            inspect_type(container, f);
            for arg in args {
                if let ExprKind::Type(arg_type) = &arg.kind {
                    inspect_type(arg_type, f);
                }
            }
        }
        _ => {}
    }
}
