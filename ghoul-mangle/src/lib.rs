#![forbid(unsafe_code)]

//! Itanium-ABI-derived name mangling, extended with this language's extra
//! concepts: argument labels (`U<len><label>`), parameter passing modes
//! (`U2in`/`U3out`), the `mut`/`immut` qualifiers (`Umut`/`K`), property
//! and subscript accessors (`pg`/`pgr`/`pgrm`/`ps`, `ixg`/`ixgr`/`ixgrm`/
//! `ixs`), template instantiations (`I…E`), and virtual tables (`_ZTV`).
//!
//! Mangling runs in two phases: first every type-producing declaration
//! (enum/struct/trait and template instantiations) receives its mangled
//! type name, then function and variable symbols are assigned so parameter
//! signatures can reference the already-mangled type names.

use ghoul_ast::{
    AsgContext, BuiltInKind, DeclId, DeclKind, ExprKind, FileId, GetResult, InfixOperator,
    LiteralKind, OperatorKind, ParameterMode, PostfixOperator, PrefixOperator, Span,
    TemplateInstInfo, Type, TypeKind, TypeQualifier,
};
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Diagnostic)]
#[error("name mangling error: {message}")]
#[diagnostic(code(ghoul::mangle))]
pub struct MangleError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl MangleError {
    fn new(message: impl Into<String>, span: Span) -> MangleError {
        MangleError {
            message: message.into(),
            span,
        }
    }
}

pub struct ItaniumMangler<'a> {
    ctx: &'a mut AsgContext,
}

/// Assigns a stable symbol to every externally linkable declaration in the
/// context. Deterministic: file order, then document order.
pub fn mangle_files(ctx: &mut AsgContext) -> Result<(), MangleError> {
    let mut mangler = ItaniumMangler::new(ctx);
    let files: Vec<FileId> = mangler.ctx.files().iter().map(|file| file.id).collect();
    for &file in &files {
        mangler.mangle_decl_pass(file)?;
    }
    for &file in &files {
        mangler.mangle_pass(file)?;
    }
    Ok(())
}

impl<'a> ItaniumMangler<'a> {
    pub fn new(ctx: &'a mut AsgContext) -> ItaniumMangler<'a> {
        ItaniumMangler { ctx }
    }

    // Phase 1: type names -----------------------------------------------

    fn mangle_decl_pass(&mut self, file: FileId) -> Result<(), MangleError> {
        debug!(file = file.index(), "assigning mangled type names");
        let top_decls = self.ctx.file(file).decls.clone();
        for decl_id in top_decls {
            self.mangle_decl(decl_id)?;
        }
        Ok(())
    }

    fn mangle_decl(&mut self, decl_id: DeclId) -> Result<(), MangleError> {
        match &self.ctx.decl(decl_id).kind {
            DeclKind::Namespace(ns) => {
                let members = ns.members.clone();
                for member in members {
                    self.mangle_decl(member)?;
                }
                Ok(())
            }
            DeclKind::Enum(_) | DeclKind::Struct(_) | DeclKind::Trait(_) => {
                self.decl_type_name(decl_id)?;
                Ok(())
            }
            DeclKind::TemplateStruct(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.decl_type_name(inst)?;
                }
                Ok(())
            }
            DeclKind::TemplateTrait(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.decl_type_name(inst)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The mangled *type name* of an enum/struct/trait declaration:
    /// `<len><name>` at the root, `N…E` wrapped when nested. Template
    /// instantiations carry their `I…E` argument list in the source name.
    /// Assigned once, then reused.
    fn decl_type_name(&mut self, decl_id: DeclId) -> Result<String, MangleError> {
        if let Some(existing) = &self.ctx.decl(decl_id).mangled_name {
            return Ok(existing.clone());
        }

        let (path, segments) = self.source_path(decl_id)?;
        let name = if segments == 1 {
            path
        } else {
            format!("N{path}E")
        };

        self.ctx.decl_mut(decl_id).set_mangled_name(name.clone());
        Ok(name)
    }

    /// Concatenated source-name path from the outermost container inward,
    /// without the `N…E` wrap, plus the segment count.
    fn source_path(&mut self, decl_id: DeclId) -> Result<(String, usize), MangleError> {
        let mut chain = vec![decl_id];
        let mut current = self.ctx.decl(decl_id).container;
        while let Some(container) = current {
            // Templates are not path segments; their instantiations sit in
            // the template's own container.
            if !matches!(
                self.ctx.decl(container).kind,
                DeclKind::TemplateStruct(_)
                    | DeclKind::TemplateTrait(_)
                    | DeclKind::TemplateFunction(_)
            ) {
                chain.push(container);
            }
            current = self.ctx.decl(container).container;
        }
        chain.reverse();

        let mut path = String::new();
        let segments = chain.len();
        for id in chain {
            let segment = self.type_segment(id)?;
            path.push_str(&segment);
        }
        Ok((path, segments))
    }

    /// One path segment: the source name plus, for instantiations, the
    /// mangled template argument list.
    fn type_segment(&mut self, decl_id: DeclId) -> Result<String, MangleError> {
        let name = source_name(&self.ctx.decl(decl_id).name.node);
        let info: Option<TemplateInstInfo> = match &self.ctx.decl(decl_id).kind {
            DeclKind::Struct(def) => def.instantiated_from.clone(),
            DeclKind::Trait(def) => def.instantiated_from.clone(),
            DeclKind::Function(func) => func.instantiated_from.clone(),
            _ => None,
        };
        match info {
            Some(info) => {
                let args = self.template_args(&info)?;
                Ok(format!("{name}{args}"))
            }
            None => Ok(name),
        }
    }

    fn template_args(&mut self, info: &TemplateInstInfo) -> Result<String, MangleError> {
        let mut result = String::from("I");
        for arg in &info.args {
            match &arg.kind {
                ExprKind::Type(ty) => result.push_str(&self.type_name(ty)?),
                ExprKind::Literal(literal) => {
                    let value_type = arg
                        .value_type
                        .clone()
                        .unwrap_or_else(|| Type::builtin(arg.span, BuiltInKind::I32));
                    let type_name = self.type_name(&value_type)?;
                    let value = literal_mangled_value(&literal.value, literal.kind);
                    result.push_str(&format!("L{type_name}{value}E"));
                }
                _ => {
                    return Err(MangleError::new(
                        "template argument form is not supported by this mangler",
                        arg.span,
                    ));
                }
            }
        }
        result.push('E');
        Ok(result)
    }

    /// Type signature of a (resolved) type.
    fn type_name(&mut self, ty: &Type) -> Result<String, MangleError> {
        let mut prefix = String::new();
        match ty.qualifier {
            TypeQualifier::Immut => prefix.push('K'),
            // Vendor-extended qualifier for `mut`; the code is literally
            // `Umut`, not a length-prefixed source name.
            TypeQualifier::Mut => prefix.push_str("Umut"),
            TypeQualifier::Unassigned => {}
        }

        let body = match &ty.kind {
            TypeKind::BuiltIn(BuiltInKind::Void) => "v".to_string(),
            TypeKind::BuiltIn(BuiltInKind::Bool) => "b".to_string(),
            TypeKind::BuiltIn(builtin) => source_name(builtin.name()),
            TypeKind::Enum(decl) | TypeKind::Struct(decl) | TypeKind::Trait(decl) => {
                self.decl_type_name(*decl)?
            }
            TypeKind::Alias(decl) => {
                let value = match &self.ctx.decl(*decl).kind {
                    DeclKind::TypeAlias(alias) => alias.value.clone(),
                    _ => {
                        return Err(MangleError::new("expected a typealias", ty.span));
                    }
                };
                self.type_name(&value)?
            }
            TypeKind::Pointer(inner) => format!("P{}", self.type_name(inner)?),
            TypeKind::Reference(inner) => format!("R{}", self.type_name(inner)?),
            TypeKind::RValueReference(inner) => format!("O{}", self.type_name(inner)?),
            TypeKind::Dependent(inner) => self.type_name(inner)?,
            other => {
                return Err(MangleError::new(
                    format!("type is not supported by this mangler version ({other:?})"),
                    ty.span,
                ));
            }
        };

        Ok(format!("{prefix}{body}"))
    }

    // Phase 2: symbol names ---------------------------------------------

    fn mangle_pass(&mut self, file: FileId) -> Result<(), MangleError> {
        debug!(file = file.index(), "assigning mangled symbol names");
        let top_decls = self.ctx.file(file).decls.clone();
        for decl_id in top_decls {
            self.mangle_top_decl(decl_id, "")?;
        }
        Ok(())
    }

    fn mangle_top_decl(&mut self, decl_id: DeclId, prefix: &str) -> Result<(), MangleError> {
        let (nested_prefix, suffix) = if prefix.is_empty() {
            (String::new(), "")
        } else {
            (format!("N{prefix}"), "E")
        };

        match &self.ctx.decl(decl_id).kind {
            DeclKind::Namespace(ns) => {
                let members = ns.members.clone();
                let path = format!("{prefix}{}", source_name(&self.ctx.decl(decl_id).name.node));
                for member in members {
                    self.mangle_top_decl(member, &path)?;
                }
                Ok(())
            }
            DeclKind::Function(_) => self.mangle_function(decl_id, &nested_prefix, suffix),
            DeclKind::TemplateFunction(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.mangle_function(inst, &nested_prefix, suffix)?;
                }
                Ok(())
            }
            DeclKind::Variable(_) => self.mangle_variable(decl_id, &nested_prefix, suffix),
            DeclKind::Struct(_) => self.mangle_struct(decl_id, prefix),
            DeclKind::TemplateStruct(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.mangle_struct(inst, prefix)?;
                }
                Ok(())
            }
            DeclKind::Trait(_) => self.mangle_trait(decl_id, prefix),
            DeclKind::TemplateTrait(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.mangle_trait(inst, prefix)?;
                }
                Ok(())
            }
            DeclKind::Enum(def) => {
                let members = def.members.clone();
                let path = format!("{prefix}{}", source_name(&self.ctx.decl(decl_id).name.node));
                for member in members {
                    self.mangle_member(member, &path)?;
                }
                Ok(())
            }
            DeclKind::Property(_) => self.mangle_property(decl_id, &nested_prefix, suffix),
            DeclKind::CallOperator(_) => self.mangle_call_operator(decl_id, &nested_prefix, suffix),
            DeclKind::TypeSuffix(_) => self.mangle_function(decl_id, &nested_prefix, suffix),
            DeclKind::Extension(ext) => {
                // Extension members mangle against the extended type's path.
                let target = ext.target.clone();
                let members = ext.members.clone();
                if let TypeKind::Struct(target_decl) | TypeKind::Trait(target_decl) = target.kind {
                    let (path, _) = self.source_path(target_decl)?;
                    for member in members {
                        self.mangle_member(member, &path)?;
                    }
                }
                Ok(())
            }
            DeclKind::Import(_) | DeclKind::TypeAlias(_) => Ok(()),
            _ => Ok(()),
        }
    }

    fn mangle_struct(&mut self, decl_id: DeclId, prefix: &str) -> Result<(), MangleError> {
        let segment = self.type_segment(decl_id)?;
        let path = format!("{prefix}{segment}");

        let (constructors, members, destructor, has_vtable) = {
            let DeclKind::Struct(def) = &self.ctx.decl(decl_id).kind else {
                return Ok(());
            };
            (
                def.constructors.clone(),
                def.members.clone(),
                def.destructor,
                !def.vtable.is_empty(),
            )
        };

        for ctor in constructors {
            self.mangle_constructor(ctor, &format!("N{path}"), "E")?;
        }
        for member in members {
            self.mangle_member(member, &path)?;
        }
        if let Some(dtor) = destructor {
            self.mangle_destructor(dtor, &format!("N{path}"), "E")?;
        }

        if has_vtable {
            let vtable_name = format!("_ZTVN{path}E");
            if let DeclKind::Struct(def) = &mut self.ctx.decl_mut(decl_id).kind {
                def.vtable_name = Some(vtable_name);
            }
        }

        Ok(())
    }

    fn mangle_trait(&mut self, decl_id: DeclId, prefix: &str) -> Result<(), MangleError> {
        let segment = self.type_segment(decl_id)?;
        let path = format!("{prefix}{segment}");

        let members = match &self.ctx.decl(decl_id).kind {
            DeclKind::Trait(def) => def.members.clone(),
            _ => return Ok(()),
        };
        for member in members {
            self.mangle_member(member, &path)?;
        }
        Ok(())
    }

    /// Members of structs, traits, enums and extensions share the nested
    /// `N<path>…E` shape.
    fn mangle_member(&mut self, member: DeclId, path: &str) -> Result<(), MangleError> {
        let nested_prefix = format!("N{path}");

        match &self.ctx.decl(member).kind {
            DeclKind::Function(_) => self.mangle_function(member, &nested_prefix, "E"),
            DeclKind::TemplateFunction(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.mangle_function(inst, &nested_prefix, "E")?;
                }
                Ok(())
            }
            DeclKind::Variable(_) => self.mangle_variable(member, &nested_prefix, "E"),
            DeclKind::Operator(_) => self.mangle_operator(member, &nested_prefix, "E"),
            DeclKind::CastOperator(_) => self.mangle_cast_operator(member, &nested_prefix, "E"),
            DeclKind::CallOperator(_) => self.mangle_call_operator(member, &nested_prefix, "E"),
            DeclKind::Property(_) => self.mangle_property(member, &nested_prefix, "E"),
            DeclKind::Subscript(_) => self.mangle_subscript(member, &nested_prefix, "E"),
            DeclKind::Struct(_) => self.mangle_struct(member, path),
            DeclKind::TemplateStruct(template) => {
                let instantiations = template.instantiations.clone();
                for inst in instantiations {
                    self.mangle_struct(inst, path)?;
                }
                Ok(())
            }
            DeclKind::Enum(def) => {
                let members = def.members.clone();
                let enum_path =
                    format!("{path}{}", source_name(&self.ctx.decl(member).name.node));
                for nested in members {
                    self.mangle_member(nested, &enum_path)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn mangle_function(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let name = source_name(&self.ctx.decl(decl_id).name.node);
        let mut mangled = format!("_Z{prefix}{name}{suffix}");

        let info = self
            .ctx
            .decl(decl_id)
            .function()
            .and_then(|func| func.instantiated_from.clone());
        if let Some(info) = info {
            mangled.push_str(&self.template_args(&info)?);
        }

        let params = self
            .ctx
            .decl(decl_id)
            .function()
            .map(|func| func.params.clone())
            .unwrap_or_default();
        mangled.push_str(&self.bare_function_type(&params)?);

        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    fn mangle_variable(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let name = source_name(&self.ctx.decl(decl_id).name.node);
        let mangled = format!("_Z{prefix}{name}{suffix}");
        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    fn mangle_call_operator(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let params = self
            .ctx
            .decl(decl_id)
            .function()
            .map(|func| func.params.clone())
            .unwrap_or_default();
        let bare = self.bare_function_type(&params)?;
        let mangled = format!("_Z{prefix}cl{suffix}{bare}");
        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    fn mangle_operator(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let (op, params) = match &self.ctx.decl(decl_id).kind {
            DeclKind::Operator(decl) => (decl.op, decl.func.params.clone()),
            _ => return Ok(()),
        };
        let span = self.ctx.decl(decl_id).span;
        let code = operator_code(op).ok_or_else(|| {
            MangleError::new("operator is not supported by this mangler version", span)
        })?;
        let bare = self.bare_function_type(&params)?;
        let mangled = format!("_Z{prefix}{code}{suffix}{bare}");
        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    fn mangle_cast_operator(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let target = match &self.ctx.decl(decl_id).kind {
            DeclKind::CastOperator(decl) => decl.target_type.clone(),
            _ => return Ok(()),
        };
        let target_name = self.type_name(&target)?;
        let mangled = format!("_Z{prefix}cv{target_name}{suffix}v");
        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    fn mangle_property(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let (getters, setter, property_type) = match &self.ctx.decl(decl_id).kind {
            DeclKind::Property(prop) => {
                (prop.getters.clone(), prop.setter, prop.property_type.clone())
            }
            _ => return Ok(()),
        };
        let name_prefix = format!(
            "{prefix}{}",
            source_name(&self.ctx.decl(decl_id).name.node)
        );

        for getter in getters {
            let accessor = accessor_code(self.ctx.decl(getter), "pg", "pgr", "pgrm");
            let mangled = format!("_Z{name_prefix}{accessor}{suffix}v");
            self.ctx.decl_mut(getter).set_mangled_name(mangled);
        }

        if let Some(setter) = setter {
            let value = self.type_name(&property_type)?;
            let mangled = format!("_Z{name_prefix}ps{suffix}U1_{value}");
            self.ctx.decl_mut(setter).set_mangled_name(mangled);
        }

        Ok(())
    }

    fn mangle_subscript(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let (params, getters, setter, element_type) = match &self.ctx.decl(decl_id).kind {
            DeclKind::Subscript(sub) => (
                sub.params.clone(),
                sub.getters.clone(),
                sub.setter,
                sub.element_type.clone(),
            ),
            _ => return Ok(()),
        };
        let name_prefix = format!(
            "{prefix}{}",
            source_name(&self.ctx.decl(decl_id).name.node)
        );
        let bare = self.bare_function_type(&params)?;

        for getter in getters {
            let accessor = accessor_code(self.ctx.decl(getter), "ixg", "ixgr", "ixgrm");
            let mangled = format!("_Z{name_prefix}{accessor}{suffix}{bare}");
            self.ctx.decl_mut(getter).set_mangled_name(mangled);
        }

        if let Some(setter) = setter {
            let value = self.type_name(&element_type)?;
            let mangled = format!("_Z{name_prefix}ixs{suffix}{bare}U1_{value}");
            self.ctx.decl_mut(setter).set_mangled_name(mangled);
        }

        Ok(())
    }

    fn mangle_constructor(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        let (ctor_kind, params) = match &self.ctx.decl(decl_id).kind {
            DeclKind::Constructor(ctor) => (ctor.kind, ctor.func.params.clone()),
            _ => return Ok(()),
        };

        let bare = match ctor_kind {
            ghoul_ast::ConstructorKind::Normal => self.bare_function_type(&params)?,
            // Copy takes `RKS_` (a const reference to self), move takes
            // `OS_` (an r-value reference to self).
            ghoul_ast::ConstructorKind::Copy => "RKS_".to_string(),
            ghoul_ast::ConstructorKind::Move => "OS_".to_string(),
        };

        // `C2` is the base-object constructor, `C1` the complete-object
        // (vtable-fixed) one.
        let mangled = format!("_Z{prefix}C2{suffix}{bare}");
        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    fn mangle_destructor(
        &mut self,
        decl_id: DeclId,
        prefix: &str,
        suffix: &str,
    ) -> Result<(), MangleError> {
        // Destructors take no parameters but are functions, so the `v`
        // signature is still required.
        let mangled = format!("_Z{prefix}D2{suffix}v");
        self.ctx.decl_mut(decl_id).set_mangled_name(mangled);
        Ok(())
    }

    /// Parameter signature sequence. Each parameter records its argument
    /// label as a vendor qualifier, then its passing mode, then the type.
    fn bare_function_type(&mut self, params: &[DeclId]) -> Result<String, MangleError> {
        if params.is_empty() {
            return Ok("v".to_string());
        }

        let mut result = String::new();
        for &param in params {
            let (label, mode, param_type) = match &self.ctx.decl(param).kind {
                DeclKind::Parameter(p) => {
                    (p.label.node.clone(), p.mode, p.param_type.clone())
                }
                _ => continue,
            };

            result.push('U');
            result.push_str(&source_name(&label));
            match mode {
                ParameterMode::In => result.push_str("U2in"),
                ParameterMode::Out => result.push_str("U3out"),
                ParameterMode::Val => {}
            }
            result.push_str(&self.type_name(&param_type)?);
        }
        Ok(result)
    }
}

fn source_name(name: &str) -> String {
    format!("{}{}", name.len(), name)
}

fn accessor_code(
    decl: &ghoul_ast::Decl,
    normal: &str,
    by_ref: &str,
    by_ref_mut: &str,
) -> String {
    let result = match &decl.kind {
        DeclKind::PropertyGet(accessor) | DeclKind::SubscriptGet(accessor) => accessor.result,
        _ => GetResult::Normal,
    };
    let code = match result {
        GetResult::Normal => normal,
        GetResult::Ref => by_ref,
        GetResult::RefMut => by_ref_mut,
    };
    // `K` marks non-`mut` accessors, matching C++ const member functions.
    if decl.is_mutable() {
        code.to_string()
    } else {
        format!("K{code}")
    }
}

fn literal_mangled_value(value: &str, kind: LiteralKind) -> String {
    match kind {
        LiteralKind::Integer => {
            // Literal values mangle in decimal regardless of source base.
            let decimal = if let Some(hex) = value.strip_prefix("0x") {
                u64::from_str_radix(hex, 16).map(|v| v.to_string()).ok()
            } else if let Some(bin) = value.strip_prefix("0b") {
                u64::from_str_radix(bin, 2).map(|v| v.to_string()).ok()
            } else if let Some(oct) = value.strip_prefix("0o") {
                u64::from_str_radix(oct, 8).map(|v| v.to_string()).ok()
            } else {
                Some(value.to_string())
            };
            decimal.unwrap_or_else(|| value.to_string())
        }
        _ => value.to_string(),
    }
}

fn operator_code(op: OperatorKind) -> Option<&'static str> {
    Some(match op {
        OperatorKind::Prefix(prefix) => match prefix {
            PrefixOperator::Increment => "pp",
            PrefixOperator::Decrement => "mm",
            PrefixOperator::Positive => "ps",
            PrefixOperator::Negative => "ng",
            PrefixOperator::LogicalNot => "nt",
            PrefixOperator::BitwiseNot => "co",
            PrefixOperator::Dereference => "de",
            PrefixOperator::AddressOf => "ad",
            _ => return None,
        },
        OperatorKind::Postfix(postfix) => match postfix {
            PostfixOperator::Increment => "pp",
            PostfixOperator::Decrement => "mm",
        },
        OperatorKind::Infix(infix) => match infix {
            InfixOperator::Add => "pl",
            InfixOperator::Subtract => "mi",
            InfixOperator::Multiply => "ml",
            InfixOperator::Divide => "dv",
            InfixOperator::Remainder => "rm",
            // Exponentiation mangles as the vendor `pow` form.
            InfixOperator::Power => "v23pow",
            InfixOperator::BitwiseAnd => "an",
            InfixOperator::BitwiseOr => "or",
            InfixOperator::BitwiseXor => "eo",
            InfixOperator::ShiftLeft => "ls",
            InfixOperator::ShiftRight => "rs",
            InfixOperator::LogicalAnd => "aa",
            InfixOperator::LogicalOr => "oo",
            InfixOperator::EqualTo => "eq",
            InfixOperator::NotEqualTo => "ne",
            InfixOperator::GreaterThan => "gt",
            InfixOperator::LessThan => "lt",
            InfixOperator::GreaterThanEqualTo => "ge",
            InfixOperator::LessThanEqualTo => "le",
        },
    })
}

/// Every mangled symbol in the context, in deterministic file/document
/// order; the driver prints these for `--emit-symbols`.
pub fn collect_symbols(ctx: &AsgContext) -> Vec<String> {
    let mut result = Vec::new();
    for file in ctx.files() {
        let mut worklist: Vec<DeclId> = file.decls.iter().rev().copied().collect();
        while let Some(decl_id) = worklist.pop() {
            let decl = ctx.decl(decl_id);
            if let Some(mangled) = &decl.mangled_name {
                // Type names are not symbols on their own; only `_Z`-prefixed
                // entries are linkable.
                if mangled.starts_with("_Z") {
                    result.push(mangled.clone());
                }
            }
            if let DeclKind::Struct(def) = &decl.kind {
                if let Some(vtable) = &def.vtable_name {
                    result.push(vtable.clone());
                }
            }

            let mut children = decl.member_ids();
            match &decl.kind {
                DeclKind::TemplateStruct(template) => {
                    children.extend(template.instantiations.iter().copied())
                }
                DeclKind::TemplateTrait(template) => {
                    children.extend(template.instantiations.iter().copied())
                }
                DeclKind::TemplateFunction(template) => {
                    children.extend(template.instantiations.iter().copied())
                }
                _ => {}
            }
            for child in children.into_iter().rev() {
                worklist.push(child);
            }
        }
    }
    result
}
